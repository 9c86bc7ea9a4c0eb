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

// Property and index reads, promise resolution and checked casts
//
// Reads through a nullable target are guarded: a null target yields null
// and the result type becomes nullable.

use std::rc::Rc;
use std::sync::Arc;

use crate::bytecode::{CodeEmitter, MethodRef, Op};
use crate::core::{Error, Result};
use crate::ir::{self, expr, Expr, LocalFrame};
use crate::types::{IndexAdapter, PropertyAdapter, TypeWidget};

use super::logic::guarded;

/// `target.name`
pub fn property_value(frame: &Rc<LocalFrame>, target: Expr, name: &str) -> Result<Expr> {
    let adapter = PropertyAdapter::of(target.ty())
        .ok_or_else(|| Error::property_not_found(target.ty().to_string(), name))?;
    // closed types reject unknown names before any code is built
    adapter.property_type(name)?;
    let name = name.to_string();
    guarded(frame, target, move |value| adapter.property(value, &name), None)
}

/// `target[key]`
pub fn index_value(frame: &Rc<LocalFrame>, target: Expr, key: Expr) -> Result<Expr> {
    let adapter = IndexAdapter::of(target.ty())
        .ok_or_else(|| Error::not_indexable(target.ty().to_string()))?;
    guarded(frame, target, move |value| adapter.index(value, key), None)
}

/// Settled value of a promise, waiting at most until `timeout` expires
///
/// Values that are not promises are passed through unchanged.
pub fn resolve(frame: &Rc<LocalFrame>, timeout: Expr, target: Expr) -> Result<Expr> {
    let Some(adapter) = target.ty().promise_adapter() else {
        return Ok(target);
    };
    guarded(frame, target, move |value| Ok(adapter.resolve(timeout, value)), None)
}

/// Promise of the static method `function` applied to the settled value
pub fn resolve_later(
    frame: &Rc<LocalFrame>,
    target: Expr,
    function: Arc<MethodRef>,
    returns: TypeWidget,
) -> Result<Expr> {
    let adapter = target
        .ty()
        .promise_adapter()
        .ok_or_else(|| Error::invalid_argument(format!("{} is not a promise", target.ty())))?;
    let handle = expr(TypeWidget::any().not_nullable(), move |code| {
        code.emit(Op::Function(function.clone()));
        Ok(())
    });
    guarded(
        frame,
        target,
        move |value| Ok(adapter.resolve_later(value, handle, returns)),
        None,
    )
}

/// Convert `value` to `ty`, failing early when no conversion exists
///
/// A nullable source cast to a primitive keeps its nulls: the result is the
/// boxed, nullable form of `ty`.
pub fn cast_value(value: Expr, ty: TypeWidget) -> Result<Expr> {
    let source = value.ty().clone();
    if source.is_nullable() && ty.is_primitive() {
        CodeEmitter::new().cast(&ty, &source.not_nullable())?;
        let prim = ty.clone();
        return Ok(expr(ty.boxed().nullable(), move |code| {
            let (is_null, done) = (code.new_label(), code.new_label());
            value.generate(code)?;
            code.cast_or_null(&prim, value.ty(), is_null)?;
            code.box_value(&prim)?;
            code.jump(done);
            code.mark(is_null);
            code.emit(Op::ConstNull);
            code.mark(done);
            Ok(())
        }));
    }
    CodeEmitter::new().cast(&ty, &source)?;
    Ok(ir::cast(value, ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::collections::{list, map};
    use crate::core::{ErrorKind, Object, Value};
    use crate::ir::{literal, null};
    use crate::runtime::{Fault, Promise, Timeout};
    use crate::testing::{run_expr, try_run_expr};

    fn int(v: i32) -> Expr {
        literal(Value::Int(v), TypeWidget::int32())
    }

    fn text(s: &str) -> Expr {
        literal(Value::string(s), TypeWidget::string().not_nullable())
    }

    fn unbounded() -> Expr {
        literal(Value::Object(Object::Timeout(Timeout::unbounded())), TypeWidget::timeout())
    }

    #[test]
    fn test_map_property_and_index() {
        let m = map(vec![(text("name"), text("ada")), (text("lang"), text("rust"))]).unwrap();
        let out = run_expr(|frame| property_value(frame, m.clone(), "lang"));
        assert_eq!(out.as_str(), Some("rust"));
        let out = run_expr(|frame| index_value(frame, m.clone(), text("name")));
        assert_eq!(out.as_str(), Some("ada"));
        let out = run_expr(|frame| index_value(frame, m.clone(), text("missing")));
        assert!(out.is_null());
    }

    #[test]
    fn test_nullable_target_is_guarded() {
        let none = null(TypeWidget::map(TypeWidget::string(), TypeWidget::int32()));
        let read = property_value(&LocalFrame::root(), none.clone(), "x").unwrap();
        assert!(read.ty().is_nullable());
        assert!(run_expr(|frame| property_value(frame, none.clone(), "x")).is_null());
        let items = null(TypeWidget::list(TypeWidget::int32()));
        assert!(run_expr(|frame| index_value(frame, items.clone(), int(0))).is_null());
    }

    #[test]
    fn test_unsupported_access() {
        let frame = LocalFrame::root();
        let err = property_value(&frame, int(1), "x").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::PropertyNotFound { .. }));
        let err = index_value(&frame, int(1), int(0)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NotIndexable(_)));
    }

    #[test]
    fn test_list_index_out_of_bounds_faults() {
        let l = list(vec![int(1)]).unwrap();
        let fault = try_run_expr(|frame| index_value(frame, l.clone(), int(3))).unwrap_err();
        assert!(matches!(fault, Fault::IndexOutOfBounds { .. }));
    }

    #[test]
    fn test_resolve_completed_promise() {
        let promise = Value::Object(Object::Promise(Promise::completed(Value::boxed_int(9))));
        let target = literal(promise, TypeWidget::promise(TypeWidget::int32()).not_nullable());
        let out = run_expr(|frame| resolve(frame, unbounded(), target.clone()));
        assert_eq!(out.as_i64(), Some(9));

        let plain = run_expr(|frame| resolve(frame, unbounded(), int(4)));
        assert_eq!(plain.as_i64(), Some(4));

        let failed = Value::Object(Object::Promise(Promise::failed(Fault::failed("down"))));
        let target = literal(failed, TypeWidget::promise(TypeWidget::int32()).not_nullable());
        assert!(try_run_expr(|frame| resolve(frame, unbounded(), target.clone())).is_err());
    }

    #[test]
    fn test_cast_value() {
        let wide = cast_value(int(5), TypeWidget::int64()).unwrap();
        assert_eq!(run_expr(|_| Ok(wide.clone())).as_i64(), Some(5));

        let kept = cast_value(null(TypeWidget::int64()), TypeWidget::int32()).unwrap();
        assert_eq!(kept.ty(), &TypeWidget::int32().boxed().nullable());
        assert!(run_expr(|_| Ok(kept.clone())).is_null());

        let err = cast_value(int(5), TypeWidget::void()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::IncompatibleCast { .. }));
    }
}
