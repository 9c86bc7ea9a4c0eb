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

// Uniform iteration over lists, arrays and dynamic containers
//
// Every iterable is viewed as a list through its iterate adapter and walked
// by index:
//
//   source = iterable            (null skips the loop)
//   list   = adapter.to_list(source)
//   for index in 0..length(list):
//       item = list[index]
//       body (abort -> exit, next -> continue)

use std::rc::Rc;

use crate::bytecode::{ArithOp, Cond, Label, Native, Op};
use crate::core::{Error, Result, Value};
use crate::ir::{expr, seq, AssignableValue, Expr, Local, LocalFrame, Seq};
use crate::types::{IterateAdapter, NumKind, TypeWidget};

use super::scope::ScopeBuilder;

enum Item {
    Exec(Seq),
    /// Leave the loop when the test holds
    Abort(Expr),
    /// Skip to the next element when the test holds
    Next(Expr),
}

pub struct IterateBuilder {
    frame: Rc<LocalFrame>,
    iterable: Expr,
    list: Expr,
    source: Local,
    view: Local,
    index: Local,
    item: Local,
    items: Vec<Item>,
}

impl IterateBuilder {
    pub fn new(parent: &Rc<LocalFrame>, iterable: Expr) -> Result<Self> {
        let adapter = IterateAdapter::of(iterable.ty())
            .ok_or_else(|| Error::not_iterable(iterable.ty().to_string()))?;
        let frame = parent.child();
        let source = frame.temp("source", iterable.ty().not_nullable());
        let list = adapter.to_list(source.read());
        let view = frame.temp("list", list.ty().not_nullable());
        let index = frame.temp("index", TypeWidget::int32());
        let item = frame.temp("item", adapter.item_type());
        Ok(Self {
            frame,
            iterable,
            list,
            source,
            view,
            index,
            item,
            items: Vec::new(),
        })
    }

    /// Frame of the loop body; locals allocated here are fresh per loop
    pub fn frame(&self) -> &Rc<LocalFrame> {
        &self.frame
    }

    /// The current element
    pub fn item(&self) -> &Local {
        &self.item
    }

    /// The current position, starting at zero
    pub fn index(&self) -> &Local {
        &self.index
    }

    pub fn exec(&mut self, item: Seq) {
        self.items.push(Item::Exec(item));
    }

    pub fn abort(&mut self, test: Expr) {
        self.items.push(Item::Abort(test));
    }

    pub fn next(&mut self, test: Expr) {
        self.items.push(Item::Next(test));
    }

    pub fn build(self) -> Seq {
        seq(move |code| {
            code.enter_frame(&self.frame);
            let top = code.new_label();
            let advance = code.new_label();
            let exit = code.new_label();

            self.iterable.generate(code)?;
            code.null_test(self.iterable.ty(), exit);
            let source = code.local_slot(&self.source)?;
            code.store_slot(source, 1);
            self.list.generate(code)?;
            let view = code.local_slot(&self.view)?;
            let index = code.local_slot(&self.index)?;
            let item = code.local_slot(&self.item)?;
            code.emit(Op::Store(view));
            code.emit(Op::Const(Value::Int(0)));
            code.emit(Op::Store(index));

            code.mark(top);
            code.emit(Op::Load(index));
            code.emit(Op::Load(view));
            code.emit(Op::CallNative(Native::Length));
            code.emit(Op::IfCmp(Cond::Ge, exit));
            code.emit(Op::Load(view));
            code.emit(Op::Load(index));
            code.emit(Op::CallNative(Native::ListGet));
            code.downcast(self.item.ty());
            code.emit(Op::Store(item));

            for entry in &self.items {
                match entry {
                    Item::Exec(s) => s.generate(code)?,
                    Item::Abort(test) => branch_to(code, test, exit)?,
                    Item::Next(test) => branch_to(code, test, advance)?,
                }
            }

            code.mark(advance);
            code.emit(Op::Load(index));
            code.emit(Op::Const(Value::Int(1)));
            code.emit(Op::Arith(ArithOp::Add, NumKind::Int));
            code.emit(Op::Store(index));
            code.jump(top);
            code.mark(exit);
            code.exit_frame(&self.frame)
        })
    }

    /// The loop followed by `result`
    pub fn build_with(self, result: Expr) -> Expr {
        let ty = result.ty().clone();
        let body = self.build();
        expr(ty, move |code| {
            body.generate(code)?;
            result.generate(code)
        })
    }
}

/// Jump to `target` when `test` is true
fn branch_to(code: &mut crate::bytecode::CodeEmitter, test: &Expr, target: Label) -> Result<()> {
    let stay = code.new_label();
    super::logic::branch_false(code, test, stay)?;
    code.jump(target);
    code.mark(stay);
    Ok(())
}

/// Map `f` over `iterable`, dropping null results
///
/// A null iterable yields an empty list.
pub fn transform<F>(frame: &Rc<LocalFrame>, iterable: Expr, f: F) -> Result<Expr>
where
    F: FnOnce(Expr) -> Result<Expr>,
{
    let mut scope = ScopeBuilder::new(frame);
    let mut each = IterateBuilder::new(scope.frame(), iterable)?;
    let mapped = f(each.item().read())?;
    let list_ty = TypeWidget::list(mapped.ty().not_nullable()).not_nullable();
    let out = scope.evaluate_into(None, new_list(list_ty));

    let held = each.frame().temp("mapped", mapped.ty().boxed());
    let nullable = mapped.ty().is_nullable();
    each.exec(held.write(mapped));
    let (target, value) = (out.clone(), held.clone());
    each.exec(seq(move |code| {
        let skip = code.new_label();
        let value_slot = code.local_slot(&value)?;
        let target_slot = code.local_slot(&target)?;
        if nullable {
            code.emit(Op::Load(value_slot));
            code.emit(Op::IfNull(skip));
        }
        code.emit(Op::Load(target_slot));
        code.emit(Op::Load(value_slot));
        code.emit(Op::CallNative(Native::ListAdd));
        code.mark(skip);
        Ok(())
    }));
    scope.exec(each.build());
    scope.complete(out.read())
}

/// Fresh empty list typed as `ty`
pub(crate) fn new_list(ty: TypeWidget) -> Expr {
    expr(ty, |code| {
        code.emit(Op::CallNative(Native::NewList));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::compare::{arithmetic, ordered};
    use crate::core::Location;
    use crate::ir::{literal, null};
    use crate::testing::run_expr;

    fn int(v: i32) -> Expr {
        literal(Value::Int(v), TypeWidget::int32())
    }

    fn ints(values: &[Option<i32>]) -> Expr {
        let items = values
            .iter()
            .map(|v| v.map(Value::boxed_int).unwrap_or(Value::Null))
            .collect();
        literal(Value::list(items), TypeWidget::list(TypeWidget::int32()).not_nullable())
    }

    #[test]
    fn test_transform_skips_nulls() {
        let out = run_expr(|frame| {
            transform(frame, ints(&[Some(1), Some(2), None, Some(4)]), |item| Ok(item))
        });
        assert_eq!(
            out,
            Value::list(vec![Value::boxed_int(1), Value::boxed_int(2), Value::boxed_int(4)])
        );
    }

    #[test]
    fn test_transform_maps_items() {
        let out = run_expr(|frame| {
            transform(frame, ints(&[Some(1), None, Some(3)]), |item| {
                arithmetic(ArithOp::Mul, item, int(10))
            })
        });
        assert_eq!(out, Value::list(vec![Value::boxed_int(10), Value::boxed_int(30)]));
        let empty = run_expr(|frame| {
            transform(frame, null(TypeWidget::list(TypeWidget::int32())), |item| Ok(item))
        });
        assert_eq!(empty, Value::list(vec![]));
    }

    #[test]
    fn test_abort_and_next() {
        // sum of items until the first item above 5, skipping even ones
        let out = run_expr(|frame| {
            let mut scope = ScopeBuilder::new(frame);
            let sum = scope.evaluate_into(Some("sum"), int(0));
            let mut each = IterateBuilder::new(
                scope.frame(),
                ints(&[Some(1), Some(2), Some(3), Some(9), Some(5)]),
            )?;
            let item = each.item().clone();
            let loc = Location::default();
            each.abort(ordered(Cond::Gt, item.read(), int(5), loc)?);
            let parity = arithmetic(ArithOp::Rem, item.read(), int(2))?;
            each.next(crate::builder::compare::equality(parity, int(0), false)?);
            each.exec(sum.write(arithmetic(ArithOp::Add, sum.read(), item.read())?));
            scope.exec(each.build());
            scope.complete(sum.read())
        });
        assert_eq!(out.as_i64(), Some(4));
    }

    #[test]
    fn test_not_iterable() {
        let frame = LocalFrame::root();
        let err = IterateBuilder::new(&frame, int(1)).err().unwrap();
        assert!(matches!(err.kind, crate::core::ErrorKind::NotIterable(_)));
    }
}
