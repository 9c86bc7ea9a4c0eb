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

// Nested blocks with their own locals and early exits

use std::rc::Rc;

use crate::bytecode::CodeEmitter;
use crate::core::{Error, Result};
use crate::ir::{block, expr, seq, AssignableValue, Expr, Local, LocalFrame, Seq};
use crate::types::{unify_all, TypeWidget};

use super::logic::branch_false;

enum Item {
    Exec(Seq),
    /// Leave the scope with `result` when `test` holds
    Exit(Expr, Expr),
}

/// A block evaluating to a value
///
/// Locals allocated through the builder live in the scope's own frame and
/// are released when the scope's code ends. Exits are checked in the order
/// they were added.
pub struct ScopeBuilder {
    frame: Rc<LocalFrame>,
    items: Vec<Item>,
}

impl ScopeBuilder {
    pub fn new(parent: &Rc<LocalFrame>) -> Self {
        Self {
            frame: parent.child(),
            items: Vec::new(),
        }
    }

    pub fn frame(&self) -> &Rc<LocalFrame> {
        &self.frame
    }

    pub fn allocate(&self, name: &str, ty: TypeWidget) -> Local {
        self.frame.allocate(name, ty)
    }

    /// Visible local by name, innermost first
    pub fn local(&self, name: &str) -> Result<Local> {
        self.frame
            .get(name)
            .ok_or_else(|| Error::invalid_argument(format!("unknown local '{}'", name)))
    }

    /// Store `value` into a new local (named or temporary) and return it
    pub fn evaluate_into(&mut self, name: Option<&str>, value: Expr) -> Local {
        let ty = value.ty().clone();
        let local = match name {
            Some(name) => self.frame.allocate(name, ty),
            None => self.frame.temp("v", ty),
        };
        self.items.push(Item::Exec(local.write(value)));
        local
    }

    /// Assign to an existing location
    pub fn set(&mut self, target: &dyn AssignableValue, value: Expr) {
        self.items.push(Item::Exec(target.write(value)));
    }

    pub fn exec(&mut self, item: Seq) {
        self.items.push(Item::Exec(item));
    }

    /// Leave the scope with `result` when `test` is true
    pub fn jump(&mut self, test: Expr, result: Expr) {
        self.items.push(Item::Exit(test, result));
    }

    fn exits(&self) -> impl Iterator<Item = &Expr> {
        self.items.iter().filter_map(|item| match item {
            Item::Exit(_, result) => Some(result),
            Item::Exec(_) => None,
        })
    }

    fn generate_items(
        code: &mut CodeEmitter,
        items: &[Item],
        ty: &TypeWidget,
        done: crate::bytecode::Label,
    ) -> Result<()> {
        for item in items {
            match item {
                Item::Exec(s) => s.generate(code)?,
                Item::Exit(test, result) => {
                    let next = code.new_label();
                    branch_false(code, test, next)?;
                    result.generate(code)?;
                    code.cast(ty, result.ty())?;
                    code.jump(done);
                    code.mark(next);
                }
            }
        }
        Ok(())
    }

    /// Finish the scope with `result` as the fall-through value
    pub fn complete(self, result: Expr) -> Result<Expr> {
        let ty = unify_all(self.exits().chain(std::iter::once(&result)).map(|e| e.ty()))?;
        let ScopeBuilder { frame, items } = self;
        let target = ty.clone();
        Ok(expr(ty, move |code| {
            let done = code.new_label();
            code.enter_frame(&frame);
            Self::generate_items(code, &items, &target, done)?;
            result.generate(code)?;
            code.cast(&target, result.ty())?;
            code.mark(done);
            code.exit_frame(&frame)
        }))
    }

    /// Finish as a sequence; exits must not carry values
    pub fn sequence(self) -> Result<Seq> {
        if self.exits().any(|r| !r.ty().is_void()) {
            return Err(Error::invalid_argument("a statement scope cannot exit with a value"));
        }
        let ScopeBuilder { frame, items } = self;
        let void = TypeWidget::void();
        Ok(seq(move |code| {
            let done = code.new_label();
            code.enter_frame(&frame);
            Self::generate_items(code, &items, &void, done)?;
            code.mark(done);
            code.exit_frame(&frame)
        }))
    }

    /// Items so far as a block; exits are not allowed
    pub fn block(self) -> Result<Seq> {
        let mut out = Vec::with_capacity(self.items.len());
        for item in self.items {
            match item {
                Item::Exec(s) => out.push(s),
                Item::Exit(..) => {
                    return Err(Error::invalid_argument("exits require a completed scope"))
                }
            }
        }
        let frame = self.frame;
        let body = block(out);
        Ok(seq(move |code| {
            code.enter_frame(&frame);
            body.generate(code)?;
            code.exit_frame(&frame)
        }))
    }
}
