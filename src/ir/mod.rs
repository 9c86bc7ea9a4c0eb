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

//! Typed expression IR
//!
//! Every node generates code into a [`CodeEmitter`] under a stack contract:
//!
//! - a [`BytecodeExpression`] leaves exactly one value of its declared
//!   [`TypeWidget`] on the stack
//! - a [`BytecodeSequence`] leaves the stack depth unchanged
//!
//! Nodes are immutable and cheap to share; they are built per compiled
//! statement and dropped after emission. A node that breaks its contract is
//! caught by the verifier when the owning unit is built.

pub mod assignable;
pub mod constants;
pub mod frame;
pub mod invocable;

use std::fmt;
use std::rc::Rc;

use crate::bytecode::{CodeEmitter, Op};
use crate::core::{Result, Value};
use crate::types::TypeWidget;

pub use assignable::{AssignableValue, FieldValue, ListElement, MapEntry, RecordField, StaticValue};
pub use constants::{ConstantTable, HoistedConstant, CONSTANTS_UNIT};
pub use frame::{Local, LocalFrame, LocalValue};
pub use invocable::{InlineInvocable, Invocable, MethodInvocable, Prefix};

/// A node leaving one typed value on the stack
pub trait BytecodeExpression {
    fn ty(&self) -> &TypeWidget;

    fn generate(&self, code: &mut CodeEmitter) -> Result<()>;
}

/// A node with side effects only
pub trait BytecodeSequence {
    fn generate(&self, code: &mut CodeEmitter) -> Result<()>;
}

pub type Expr = Rc<dyn BytecodeExpression>;
pub type Seq = Rc<dyn BytecodeSequence>;

type Emit = dyn Fn(&mut CodeEmitter) -> Result<()>;

struct FnExpr {
    ty: TypeWidget,
    emit: Box<Emit>,
}

impl BytecodeExpression for FnExpr {
    fn ty(&self) -> &TypeWidget {
        &self.ty
    }

    fn generate(&self, code: &mut CodeEmitter) -> Result<()> {
        (self.emit)(code)
    }
}

struct FnSeq {
    emit: Box<Emit>,
}

impl BytecodeSequence for FnSeq {
    fn generate(&self, code: &mut CodeEmitter) -> Result<()> {
        (self.emit)(code)
    }
}

/// Expression of type `ty` generated by `emit`
pub fn expr<F>(ty: TypeWidget, emit: F) -> Expr
where
    F: Fn(&mut CodeEmitter) -> Result<()> + 'static,
{
    Rc::new(FnExpr {
        ty,
        emit: Box::new(emit),
    })
}

/// Sequence generated by `emit`
pub fn seq<F>(emit: F) -> Seq
where
    F: Fn(&mut CodeEmitter) -> Result<()> + 'static,
{
    Rc::new(FnSeq {
        emit: Box::new(emit),
    })
}

impl fmt::Debug for dyn BytecodeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self.ty())
    }
}

// =============================================================================
// Leaf nodes
// =============================================================================

/// Inline literal; `value` must already match the representation of `ty`
pub fn literal(value: Value, ty: TypeWidget) -> Expr {
    expr(ty, move |code| {
        code.emit(Op::Const(value.clone()));
        Ok(())
    })
}

/// Typed null
pub fn null(ty: TypeWidget) -> Expr {
    let ty = ty.boxed().nullable();
    expr(ty, |code| {
        code.emit(Op::ConstNull);
        Ok(())
    })
}

/// Does nothing
pub fn nop() -> Seq {
    seq(|_| Ok(()))
}

/// Run sequences in order
pub fn block(items: Vec<Seq>) -> Seq {
    seq(move |code| {
        for item in &items {
            item.generate(code)?;
        }
        Ok(())
    })
}

/// Evaluate an expression for its side effects
pub fn eval(value: Expr) -> Seq {
    seq(move |code| {
        value.generate(code)?;
        code.pop(value.ty());
        Ok(())
    })
}

/// Run `before`, then produce `value`
pub fn then(before: Seq, value: Expr) -> Expr {
    let ty = value.ty().clone();
    expr(ty, move |code| {
        before.generate(code)?;
        value.generate(code)
    })
}

/// Convert `value` to `ty`
pub fn cast(value: Expr, ty: TypeWidget) -> Expr {
    if value.ty() == &ty {
        return value;
    }
    let target = ty.clone();
    expr(ty, move |code| {
        value.generate(code)?;
        code.cast(&target, value.ty())
    })
}

/// Return the value of `value` from the current method
pub fn ret(value: Expr, returns: TypeWidget) -> Seq {
    seq(move |code| {
        value.generate(code)?;
        code.cast(&returns, value.ty())?;
        code.emit(Op::Return(returns.width()));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::verify;

    #[test]
    fn test_expression_contract() {
        let one = literal(Value::Int(1), TypeWidget::int32());
        let widened = cast(one.clone(), TypeWidget::int64());
        let body = ret(widened, TypeWidget::int64());

        let mut code = CodeEmitter::new();
        body.generate(&mut code).unwrap();
        let out = code.finish();
        assert_eq!(out.ops.len(), 3);
        assert_eq!(verify(&out.ops, &out.labels, &[], 0, 2).unwrap(), 2);
    }

    #[test]
    fn test_sequence_leaves_depth() {
        let body = block(vec![
            eval(literal(Value::Long(5), TypeWidget::int64())),
            eval(null(TypeWidget::string())),
            nop(),
        ]);
        let mut code = CodeEmitter::new();
        body.generate(&mut code).unwrap();
        code.emit(Op::Return(0));
        let out = code.finish();
        assert_eq!(verify(&out.ops, &out.labels, &[], 0, 0).unwrap(), 2);
    }

    #[test]
    fn test_cast_to_same_type_is_shared() {
        let s = null(TypeWidget::string());
        let c = cast(s.clone(), TypeWidget::string());
        assert!(Rc::ptr_eq(&s, &c));
    }
}
