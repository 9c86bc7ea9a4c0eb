// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Protected regions
//
// The machine clears the operand stack before entering a handler, so a
// protected region must begin with an empty stack. The verifier rejects
// regions entered at any other depth; callers place these constructs at
// statement level only.

use std::rc::Rc;

use crate::bytecode::{CatchType, Native, Op};
use crate::core::{Error, Result};
use crate::ir::{expr, seq, Expr, Local, LocalFrame, Seq};
use crate::types::TypeWidget;

/// Evaluate `value`, capturing any fault into an outcome
///
/// Must be generated with an empty operand stack.
pub fn try_outcome(value: Expr) -> Expr {
    let ty = TypeWidget::result(value.ty().clone()).not_nullable();
    expr(ty, move |code| {
        let start = code.new_label();
        let end = code.new_label();
        let handler = code.new_label();
        let done = code.new_label();
        code.mark(start);
        value.generate(code)?;
        code.box_value(value.ty())?;
        code.emit(Op::CallNative(Native::OutcomeSuccess));
        code.mark(end);
        code.jump(done);
        code.mark(handler);
        code.emit(Op::CallNative(Native::OutcomeFailure));
        code.mark(done);
        code.try_region(start, end, handler, CatchType::Any);
        Ok(())
    })
}

struct Clause {
    catches: Vec<CatchType>,
    fault: Local,
    body: Seq,
}

/// try / catch / finally over sequences
///
/// Clauses are tried in the order they were added. The `always` block runs
/// after the body or a matching clause completes, and also when a fault
/// escapes, in which case the fault is raised again afterwards.
pub struct CatchBuilder {
    frame: Rc<LocalFrame>,
    body: Option<Seq>,
    clauses: Vec<Clause>,
    always: Option<Seq>,
}

impl CatchBuilder {
    pub fn new(parent: &Rc<LocalFrame>) -> Self {
        Self {
            frame: parent.child(),
            body: None,
            clauses: Vec::new(),
            always: None,
        }
    }

    pub fn body(mut self, body: Seq) -> Self {
        self.body = Some(body);
        self
    }

    /// Handle faults matching any of `catches`; the fault is bound to a
    /// local named `name`
    pub fn on<F>(mut self, name: &str, catches: &[CatchType], handler: F) -> Self
    where
        F: FnOnce(&Local) -> Seq,
    {
        let fault = self.frame.allocate(name, TypeWidget::throwable());
        let body = handler(&fault);
        self.clauses.push(Clause {
            catches: catches.to_vec(),
            fault,
            body,
        });
        self
    }

    pub fn always(mut self, always: Seq) -> Self {
        self.always = Some(always);
        self
    }

    pub fn build(self) -> Result<Seq> {
        let body = self
            .body
            .ok_or_else(|| Error::invalid_argument("try block has no body"))?;
        if self.clauses.iter().any(|c| c.catches.is_empty()) {
            return Err(Error::invalid_argument("catch clause without fault types"));
        }
        let rethrow = self
            .always
            .as_ref()
            .map(|_| self.frame.temp("rethrow", TypeWidget::throwable()));
        let (frame, clauses, always) = (self.frame, self.clauses, self.always);
        Ok(seq(move |code| {
            code.enter_frame(&frame);
            let start = code.new_label();
            let end = code.new_label();
            let handlers_end = code.new_label();
            let finish = code.new_label();

            code.mark(start);
            body.generate(code)?;
            code.mark(end);
            code.jump(finish);

            for clause in &clauses {
                let entry = code.new_label();
                code.mark(entry);
                let slot = code.local_slot(&clause.fault)?;
                code.emit(Op::Store(slot));
                clause.body.generate(code)?;
                code.jump(finish);
                for catch in &clause.catches {
                    code.try_region(start, end, entry, *catch);
                }
            }
            code.mark(handlers_end);

            if let (Some(always), Some(rethrow)) = (&always, &rethrow) {
                let entry = code.new_label();
                let slot = code.local_slot(rethrow)?;
                code.mark(entry);
                code.emit(Op::Store(slot));
                always.generate(code)?;
                code.emit(Op::Load(slot));
                code.emit(Op::Throw);
                code.try_region(start, handlers_end, entry, CatchType::Any);
            }

            code.mark(finish);
            if let Some(always) = &always {
                always.generate(code)?;
            }
            code.exit_frame(&frame)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::compare::arithmetic;
    use crate::builder::scope::ScopeBuilder;
    use crate::bytecode::ArithOp;
    use crate::core::Value;
    use crate::ir::{eval, literal, AssignableValue};
    use crate::runtime::{Fault, FaultKind};
    use crate::testing::{run_expr, try_run_expr};

    fn int(v: i32) -> Expr {
        literal(Value::Int(v), TypeWidget::int32())
    }

    fn divide(a: i32, b: i32) -> Expr {
        arithmetic(ArithOp::Div, int(a), int(b)).unwrap()
    }

    #[test]
    fn test_outcome_captures_fault() {
        let ok = run_expr(|_| Ok(try_outcome(divide(6, 3))));
        let outcome = ok.as_outcome().unwrap();
        assert_eq!(outcome.value().and_then(|v| v.as_i64()), Some(2));

        let failed = run_expr(|_| Ok(try_outcome(divide(1, 0))));
        assert_eq!(failed.as_outcome().unwrap().fault(), Some(&Fault::DivideByZero));
    }

    #[test]
    fn test_catch_and_finally() {
        let run = |b: i32| {
            try_run_expr(|frame| {
                let mut scope = ScopeBuilder::new(frame);
                let caught = scope.evaluate_into(Some("caught"), int(0));
                let cleaned = scope.evaluate_into(Some("cleaned"), int(0));
                let region = CatchBuilder::new(scope.frame())
                    .body(eval(divide(10, b)))
                    .on("e", &[CatchType::Fault(FaultKind::DivideByZero)], |_| {
                        caught.write(int(1))
                    })
                    .always(cleaned.write(int(10)))
                    .build()?;
                scope.exec(region);
                scope.complete(arithmetic(ArithOp::Add, caught.read(), cleaned.read())?)
            })
        };
        assert_eq!(run(2).unwrap().as_i64(), Some(10));
        assert_eq!(run(0).unwrap().as_i64(), Some(11));
    }

    #[test]
    fn test_unmatched_fault_runs_finally_and_escapes() {
        let err = try_run_expr(|frame| {
            let mut scope = ScopeBuilder::new(frame);
            let region = CatchBuilder::new(scope.frame())
                .body(eval(divide(1, 0)))
                .on("e", &[CatchType::Fault(FaultKind::Timeout)], |_| crate::ir::nop())
                .always(crate::ir::nop())
                .build()?;
            scope.exec(region);
            scope.complete(int(0))
        })
        .unwrap_err();
        assert_eq!(err, Fault::DivideByZero);
        assert!(CatchBuilder::new(&LocalFrame::root()).build().is_err());
    }
}
