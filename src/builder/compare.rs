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

// Arithmetic and comparison over unified operands
//
// Both operands are emitted at their unified type. Primitive kinds use the
// machine's numeric ops; everything else goes through the runtime's
// generic equality and ordering, which fault on values without one.

use crate::bytecode::{ArithOp, CodeEmitter, Cond, Native, Op};
use crate::core::{Error, Location, Result, Value};
use crate::ir::{expr, Expr};
use crate::types::{unify, Prim, TypeWidget};

/// Primitive type both operands are computed in, if any
fn numeric_type(left: &TypeWidget, right: &TypeWidget) -> Option<Prim> {
    let unified = unify(left, right);
    match unified.prim() {
        Some(p) if p != Prim::Boolean => Some(p),
        Some(_) => None,
        // one dynamic operand takes the other's kind
        None if left.is_any() || right.is_any() => [left, right]
            .iter()
            .filter_map(|t| t.prim())
            .find(|p| *p != Prim::Boolean),
        None => None,
    }
}

/// Sub-int results are computed as int and truncated
fn narrow_after(code: &mut CodeEmitter, prim: Prim) {
    if matches!(prim, Prim::Int8 | Prim::Int16) {
        code.emit(Op::Narrow(prim));
    }
}

/// Binary arithmetic; null when either operand is null
pub fn arithmetic(op: ArithOp, left: Expr, right: Expr) -> Result<Expr> {
    let prim = numeric_type(left.ty(), right.ty()).ok_or_else(|| {
        Error::invalid_argument(format!(
            "cannot apply {:?} to {} and {}",
            op,
            left.ty(),
            right.ty()
        ))
    })?;
    let operand = TypeWidget::primitive(prim);
    let nullable = left.ty().is_nullable() || right.ty().is_nullable();
    let ty = if nullable {
        operand.boxed().nullable()
    } else {
        operand.clone()
    };
    Ok(expr(ty, move |code| {
        let (null, done) = (code.new_label(), code.new_label());
        code.unify_as(&operand, &left, &right, null, null, null)?;
        code.emit(Op::Arith(op, prim.num_kind()));
        narrow_after(code, prim);
        if nullable {
            code.box_value(&operand)?;
            code.jump(done);
            code.mark(null);
            code.emit(Op::ConstNull);
        } else {
            code.mark(null);
        }
        code.mark(done);
        Ok(())
    }))
}

/// Arithmetic negation
pub fn negate(input: Expr) -> Result<Expr> {
    let prim = input
        .ty()
        .prim()
        .filter(|p| *p != Prim::Boolean)
        .ok_or_else(|| Error::invalid_argument(format!("cannot negate {}", input.ty())))?;
    let operand = TypeWidget::primitive(prim);
    let nullable = input.ty().is_nullable();
    let ty = if nullable {
        operand.boxed().nullable()
    } else {
        operand.clone()
    };
    Ok(expr(ty, move |code| {
        let (null, done) = (code.new_label(), code.new_label());
        input.generate(code)?;
        code.cast_or_null(&operand, input.ty(), null)?;
        code.emit(Op::Neg(prim.num_kind()));
        narrow_after(code, prim);
        if nullable {
            code.box_value(&operand)?;
            code.jump(done);
            code.mark(null);
            code.emit(Op::ConstNull);
        } else {
            code.mark(null);
        }
        code.mark(done);
        Ok(())
    }))
}

/// Type both operands are emitted at for a comparison
fn comparison_type(left: &TypeWidget, right: &TypeWidget) -> TypeWidget {
    let unified = unify(left, right);
    if let Some(prim) = unified.prim() {
        return TypeWidget::primitive(prim);
    }
    if let Some(prim) = numeric_type(left, right) {
        return TypeWidget::primitive(prim);
    }
    unified.not_nullable()
}

/// Leave the three-way ordering of the two unified operands as an int
fn emit_ordering(code: &mut CodeEmitter, ty: &TypeWidget, location: Location) {
    match ty.repr().num_kind() {
        Some(kind) if ty.is_primitive() => code.emit(Op::Cmp(kind)),
        _ => code.emit(Op::CallNative(Native::ObjectCompare {
            line: location.line,
            offset: location.offset,
        })),
    }
}

/// Three-way comparison as int32
///
/// Nulls rank as observed by existing programs: a null left operand is -1,
/// a null right operand is 1 and two nulls are 0. This is not a total order
/// and does not agree with equality.
pub fn compare(left: Expr, right: Expr, location: Location) -> Result<Expr> {
    let ty = comparison_type(left.ty(), right.ty());
    Ok(expr(TypeWidget::int32(), move |code| {
        let left_null = code.new_label();
        let right_null = code.new_label();
        let both_null = code.new_label();
        let done = code.new_label();
        code.unify_as(&ty, &left, &right, left_null, right_null, both_null)?;
        emit_ordering(code, &ty, location);
        code.jump(done);
        for (label, rank) in [(left_null, -1), (right_null, 1), (both_null, 0)] {
            code.mark(label);
            code.emit(Op::Const(Value::Int(rank)));
            code.jump(done);
        }
        code.mark(done);
        Ok(())
    }))
}

/// Ordering predicate; false when either operand is null
pub fn ordered(cond: Cond, left: Expr, right: Expr, location: Location) -> Result<Expr> {
    let ty = comparison_type(left.ty(), right.ty());
    Ok(expr(TypeWidget::boolean(), move |code| {
        let (f, done) = (code.new_label(), code.new_label());
        code.unify_as(&ty, &left, &right, f, f, f)?;
        emit_ordering(code, &ty, location);
        code.emit(Op::If(cond.negate(), f));
        code.emit(Op::Const(Value::Int(1)));
        code.jump(done);
        code.mark(f);
        code.emit(Op::Const(Value::Int(0)));
        code.mark(done);
        Ok(())
    }))
}

/// Equality (`negated` for inequality); false when either operand is null
pub fn equality(left: Expr, right: Expr, negated: bool) -> Result<Expr> {
    let ty = comparison_type(left.ty(), right.ty());
    Ok(expr(TypeWidget::boolean(), move |code| {
        let (f, done) = (code.new_label(), code.new_label());
        code.unify_as(&ty, &left, &right, f, f, f)?;
        match ty.repr().num_kind() {
            Some(kind) if ty.is_primitive() => {
                code.emit(Op::Cmp(kind));
                code.emit(Op::If(if negated { Cond::Eq } else { Cond::Ne }, f));
            }
            _ => {
                code.emit(Op::CallNative(Native::ObjectEquals));
                code.emit(Op::If(if negated { Cond::Ne } else { Cond::Eq }, f));
            }
        }
        code.emit(Op::Const(Value::Int(1)));
        code.jump(done);
        code.mark(f);
        code.emit(Op::Const(Value::Int(0)));
        code.mark(done);
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{literal, null};
    use crate::runtime::Fault;
    use crate::testing::{run_expr, try_run_expr};

    fn int(v: i32) -> Expr {
        literal(Value::Int(v), TypeWidget::int32())
    }

    fn long(v: i64) -> Expr {
        literal(Value::Long(v), TypeWidget::int64())
    }

    fn string(s: &str) -> Expr {
        literal(Value::string(s), TypeWidget::string().not_nullable())
    }

    #[test]
    fn test_int32_addition_wraps() {
        let sum = arithmetic(ArithOp::Add, int(2_000_000_000), int(2_000_000_000)).unwrap();
        assert!(sum.ty().is_primitive());
        assert_eq!(run_expr(|_| Ok(sum.clone())).as_i64(), Some(-294_967_296));
    }

    #[test]
    fn test_mixed_widths_widen() {
        let sum = arithmetic(ArithOp::Mul, int(3), long(1 << 40)).unwrap();
        assert_eq!(sum.ty(), &TypeWidget::int64());
        assert_eq!(run_expr(|_| Ok(sum.clone())).as_i64(), Some(3 << 40));
    }

    #[test]
    fn test_null_operand_yields_null() {
        let sum = arithmetic(ArithOp::Add, int(1), null(TypeWidget::int32())).unwrap();
        assert!(sum.ty().is_nullable());
        assert!(run_expr(|_| Ok(sum.clone())).is_null());
        let neg = negate(null(TypeWidget::int64())).unwrap();
        assert!(run_expr(|_| Ok(neg.clone())).is_null());
        assert_eq!(run_expr(|_| negate(int(5))).as_i64(), Some(-5));
    }

    #[test]
    fn test_division_by_zero_faults() {
        let div = arithmetic(ArithOp::Div, int(1), int(0)).unwrap();
        let err = try_run_expr(|_| Ok(div.clone())).unwrap_err();
        assert_eq!(err, Fault::DivideByZero);
        assert!(arithmetic(ArithOp::Add, string("a"), int(1)).is_err());
    }

    #[test]
    fn test_null_ranking_is_intentionally_asymmetric() {
        let loc = Location::default();
        let c = |l: Expr, r: Expr| run_expr(|_| compare(l, r, loc)).as_i64();
        assert_eq!(c(null(TypeWidget::int32()), long(5)), Some(-1));
        assert_eq!(c(long(5), null(TypeWidget::int32())), Some(1));
        assert_eq!(c(null(TypeWidget::int32()), null(TypeWidget::int32())), Some(0));
        assert_eq!(c(int(2), long(9)), Some(-1));
        assert_eq!(c(string("b"), string("a")), Some(1));
    }

    #[test]
    fn test_predicates() {
        let loc = Location::default();
        let lt = ordered(Cond::Lt, int(1), long(2), loc).unwrap();
        assert_eq!(run_expr(|_| Ok(lt.clone())).as_bool(), Some(true));
        let ge = ordered(Cond::Ge, null(TypeWidget::int32()), int(2), loc).unwrap();
        assert_eq!(run_expr(|_| Ok(ge.clone())).as_bool(), Some(false));

        let eq = equality(string("a"), string("a"), false).unwrap();
        assert_eq!(run_expr(|_| Ok(eq.clone())).as_bool(), Some(true));
        let ne = equality(int(1), long(1), true).unwrap();
        assert_eq!(run_expr(|_| Ok(ne.clone())).as_bool(), Some(false));
        let eq_null = equality(null(TypeWidget::string()), null(TypeWidget::string()), false).unwrap();
        assert_eq!(run_expr(|_| Ok(eq_null.clone())).as_bool(), Some(false));
    }
}
