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

// Boolean logic and null propagation
//
// Three-valued inputs collapse to two values: a null operand counts as
// false wherever a truth value is needed.

use std::rc::Rc;

use crate::bytecode::{CodeEmitter, Label, Op};
use crate::core::{Error, Result, Value};
use crate::ir::{expr, AssignableValue, Expr, LocalFrame};
use crate::types::{unify, unify_all, Prim, TypeWidget};

/// Generate `test` and jump to `is_false` when it is false, zero or null
pub(crate) fn branch_false(code: &mut CodeEmitter, test: &Expr, is_false: Label) -> Result<()> {
    test.generate(code)?;
    if test.ty().is_any() {
        let boolean = TypeWidget::boolean();
        code.cast_or_null(&boolean, test.ty(), is_false)?;
        code.emit(Op::If(crate::bytecode::Cond::Eq, is_false));
        return Ok(());
    }
    code.test_false(test.ty(), is_false)
}

fn check_truthy(ty: &TypeWidget) -> Result<()> {
    if ty.is_any() || ty.prim().is_some() {
        Ok(())
    } else {
        Err(Error::incompatible_cast("boolean", ty))
    }
}

/// Boolean from the branch structure: true unless control reaches `f`
fn materialize<F>(code: &mut CodeEmitter, body: F) -> Result<()>
where
    F: FnOnce(&mut CodeEmitter, Label) -> Result<()>,
{
    let (f, done) = (code.new_label(), code.new_label());
    body(code, f)?;
    code.emit(Op::Const(Value::Int(1)));
    code.jump(done);
    code.mark(f);
    code.emit(Op::Const(Value::Int(0)));
    code.mark(done);
    Ok(())
}

/// Coerce a numeric, boolean or `any` value to boolean
pub fn bool_value(input: Expr) -> Result<Expr> {
    check_truthy(input.ty())?;
    if input.ty().is_primitive() && input.ty().prim() == Some(Prim::Boolean) {
        return Ok(input);
    }
    Ok(expr(TypeWidget::boolean(), move |code| {
        materialize(code, |code, f| branch_false(code, &input, f))
    }))
}

/// Logical negation; `not(null)` is true
pub fn not(input: Expr) -> Result<Expr> {
    check_truthy(input.ty())?;
    Ok(expr(TypeWidget::boolean(), move |code| {
        let (f, done) = (code.new_label(), code.new_label());
        branch_false(code, &input, f)?;
        code.emit(Op::Const(Value::Int(0)));
        code.jump(done);
        code.mark(f);
        code.emit(Op::Const(Value::Int(1)));
        code.mark(done);
        Ok(())
    }))
}

/// Short-circuit conjunction
pub fn and(inputs: Vec<Expr>) -> Result<Expr> {
    if inputs.is_empty() {
        return Err(Error::invalid_argument("and requires at least one operand"));
    }
    for input in &inputs {
        check_truthy(input.ty())?;
    }
    Ok(expr(TypeWidget::boolean(), move |code| {
        materialize(code, |code, f| {
            for input in &inputs {
                branch_false(code, input, f)?;
            }
            Ok(())
        })
    }))
}

/// Short-circuit disjunction
pub fn or(inputs: Vec<Expr>) -> Result<Expr> {
    if inputs.is_empty() {
        return Err(Error::invalid_argument("or requires at least one operand"));
    }
    for input in &inputs {
        check_truthy(input.ty())?;
    }
    Ok(expr(TypeWidget::boolean(), move |code| {
        let (t, done) = (code.new_label(), code.new_label());
        for input in &inputs {
            let next = code.new_label();
            branch_false(code, input, next)?;
            code.jump(t);
            code.mark(next);
        }
        code.emit(Op::Const(Value::Int(0)));
        code.jump(done);
        code.mark(t);
        code.emit(Op::Const(Value::Int(1)));
        code.mark(done);
        Ok(())
    }))
}

/// Whether `input` is null; primitives never are
pub fn is_null(input: Expr) -> Expr {
    expr(TypeWidget::boolean(), move |code| {
        input.generate(code)?;
        if !input.ty().is_nullable() {
            code.pop(input.ty());
            code.emit(Op::Const(Value::Int(0)));
            return Ok(());
        }
        let (t, done) = (code.new_label(), code.new_label());
        code.emit(Op::IfNull(t));
        code.emit(Op::Const(Value::Int(0)));
        code.jump(done);
        code.mark(t);
        code.emit(Op::Const(Value::Int(1)));
        code.mark(done);
        Ok(())
    })
}

/// First non-null input
///
/// Inputs after the first non-nullable one are never evaluated; the result
/// is non-nullable when such an input exists.
pub fn coalesce(inputs: Vec<Expr>) -> Result<Expr> {
    let stop = inputs
        .iter()
        .position(|e| !e.ty().is_nullable())
        .map(|i| i + 1)
        .unwrap_or(inputs.len());
    let inputs: Vec<Expr> = inputs.into_iter().take(stop).collect();
    let first = inputs
        .first()
        .cloned()
        .ok_or_else(|| Error::invalid_argument("coalesce requires at least one operand"))?;
    if inputs.len() == 1 {
        return Ok(first);
    }
    let terminal = !inputs[inputs.len() - 1].ty().is_nullable();
    let unified = unify_all(inputs.iter().map(|e| e.ty()))?;
    let ty = if terminal {
        unified.not_nullable()
    } else {
        unified.nullable()
    };
    let target = ty.clone();
    Ok(expr(ty, move |code| {
        let done = code.new_label();
        for input in &inputs {
            let next = code.new_label();
            input.generate(code)?;
            code.cast_or_null(&target, input.ty(), next)?;
            code.jump(done);
            code.mark(next);
        }
        if !terminal {
            code.emit(Op::ConstNull);
        }
        code.mark(done);
        Ok(())
    }))
}

/// Evaluate `body` against a non-null view of `target`, or `otherwise`
/// (null when absent) when the target is null
///
/// The target is held in a temporary of `frame`, which must be active
/// wherever the result is generated.
pub fn guarded<F>(
    frame: &Rc<LocalFrame>,
    target: Expr,
    body: F,
    otherwise: Option<Expr>,
) -> Result<Expr>
where
    F: FnOnce(Expr) -> Result<Expr>,
{
    if !target.ty().is_nullable() {
        return body(target);
    }
    let held = frame.temp("guard", target.ty().not_nullable());
    let present = body(held.read())?;
    let ty = match &otherwise {
        Some(other) => unify(present.ty(), other.ty()),
        None => present.ty().boxed().nullable(),
    };
    let target_ty = ty.clone();
    Ok(expr(ty, move |code| {
        let (is_null, done) = (code.new_label(), code.new_label());
        target.generate(code)?;
        code.null_test(target.ty(), is_null);
        let slot = code.local_slot(&held)?;
        code.store_slot(slot, held.ty().width());
        present.generate(code)?;
        code.cast(&target_ty, present.ty())?;
        code.jump(done);
        code.mark(is_null);
        match &otherwise {
            Some(other) => {
                other.generate(code)?;
                code.cast(&target_ty, other.ty())?;
            }
            None => code.emit(Op::ConstNull),
        }
        code.mark(done);
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{literal, null};
    use crate::testing::run_expr;

    fn int(v: i32) -> Expr {
        literal(Value::Int(v), TypeWidget::int32())
    }

    fn truth(v: bool) -> Expr {
        literal(Value::Int(i32::from(v)), TypeWidget::boolean())
    }

    #[test]
    fn test_null_counts_as_false() {
        let nb = null(TypeWidget::boolean());
        assert_eq!(run_expr(|_| not(nb.clone())).as_bool(), Some(true));
        assert_eq!(run_expr(|_| and(vec![truth(true), nb.clone()])).as_bool(), Some(false));
        assert_eq!(run_expr(|_| or(vec![nb.clone(), truth(true)])).as_bool(), Some(true));
        assert_eq!(run_expr(|_| or(vec![nb.clone(), truth(false)])).as_bool(), Some(false));
        assert!(and(vec![]).is_err());
        assert!(not(null(TypeWidget::string())).is_err());
    }

    #[test]
    fn test_is_null() {
        assert_eq!(run_expr(|_| Ok(is_null(int(3)))).as_bool(), Some(false));
        let n = null(TypeWidget::string());
        assert_eq!(run_expr(|_| Ok(is_null(n.clone()))).as_bool(), Some(true));
    }

    #[test]
    fn test_coalesce_stops_at_non_nullable() {
        let n = null(TypeWidget::int32());
        let c = coalesce(vec![n.clone(), int(4), null(TypeWidget::int64())]).unwrap();
        assert!(!c.ty().is_nullable());
        assert_eq!(run_expr(|_| Ok(c.clone())).as_i64(), Some(4));

        let all_null = coalesce(vec![n.clone(), null(TypeWidget::string())]).unwrap();
        assert!(all_null.ty().is_any());
        assert!(run_expr(|_| Ok(all_null.clone())).is_null());
        assert!(coalesce(vec![]).is_err());
    }

    #[test]
    fn test_guarded_skips_body_on_null() {
        let out = run_expr(|frame| {
            guarded(frame, null(TypeWidget::string()), |_| Ok(int(1)), None)
        });
        assert!(out.is_null());
        let out = run_expr(|frame| {
            guarded(frame, null(TypeWidget::string()), |_| Ok(int(1)), Some(int(9)))
        });
        assert_eq!(out.as_i64(), Some(9));
        let s = literal(Value::string("x"), TypeWidget::string().not_nullable());
        let out = run_expr(|frame| guarded(frame, s.clone(), |v| Ok(is_null(v)), None));
        assert_eq!(out.as_bool(), Some(false));
    }
}
