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

//! Type unification
//!
//! `unify` computes the least upper bound of two widgets for a shared
//! operation: both branches of a conditional, both operands of a binary
//! operator, all elements of a literal list.

use crate::core::{Boxed, Error, ErrorKind, Object, Result, Value};

use super::kind::{CoreKind, Prim};
use super::widget::{Shape, TypeWidget};

/// Unify two types
pub fn unify(left: &TypeWidget, right: &TypeWidget) -> TypeWidget {
    if left.same(right) {
        return left.clone();
    }
    let nullable = left.is_nullable() || right.is_nullable();
    let out = if left.is_primitive() && right.is_primitive() {
        unify_shapes(left, right)
    } else {
        unify_shapes(&left.boxed(), &right.boxed())
    };
    if nullable {
        out.nullable()
    } else {
        out.not_nullable()
    }
}

/// Left fold of [`unify`] over a non-empty list
pub fn unify_all<'a, I>(types: I) -> Result<TypeWidget>
where
    I: IntoIterator<Item = &'a TypeWidget>,
{
    let mut iter = types.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::new(ErrorKind::EmptyTypeList))?;
    Ok(iter.fold(first.clone(), |acc, t| unify(&acc, t)))
}

fn unify_shapes(left: &TypeWidget, right: &TypeWidget) -> TypeWidget {
    let (lk, rk) = (left.kind(), right.kind());
    if lk == CoreKind::Any || rk == CoreKind::Any {
        return TypeWidget::any();
    }
    if lk.is_integer() && rk.is_integer() || lk.is_float() && rk.is_float() {
        return if rk.rank() > lk.rank() {
            right.clone()
        } else {
            left.clone()
        };
    }
    if lk.is_numeric() && rk.is_numeric() {
        return if left.is_primitive() {
            TypeWidget::float64()
        } else {
            TypeWidget::boxed_of(Prim::Float64)
        };
    }
    if lk == CoreKind::Boolean && rk == CoreKind::Boolean {
        return left.clone();
    }
    if left.repr() == right.repr() {
        if lk.is_composite() {
            return left
                .unification_adapter()
                .or_else(|| right.unification_adapter())
                .map(|adapter| adapter.unify(left, right))
                .unwrap_or_else(TypeWidget::any);
        }
        return left.clone();
    }
    TypeWidget::any()
}

/// Type of a literal value
///
/// Collections unify their element types; empty collections use `any`.
pub fn infer_constant_type(value: &Value) -> TypeWidget {
    let ty = match value {
        Value::Null | Value::Top => return TypeWidget::any(),
        Value::Int(_) => TypeWidget::int32(),
        Value::Long(_) => TypeWidget::int64(),
        Value::Float(_) => TypeWidget::primitive(Prim::Float32),
        Value::Double(_) => TypeWidget::float64(),
        Value::Object(o) => match o {
            Object::Boxed(b) => match b {
                Boxed::Boolean(_) => TypeWidget::boolean(),
                Boxed::Byte(_) => TypeWidget::primitive(Prim::Int8),
                Boxed::Short(_) => TypeWidget::primitive(Prim::Int16),
                Boxed::Int(_) => TypeWidget::int32(),
                Boxed::Long(_) => TypeWidget::int64(),
                Boxed::Float(_) => TypeWidget::primitive(Prim::Float32),
                Boxed::Double(_) => TypeWidget::float64(),
            },
            Object::String(_) => TypeWidget::string(),
            Object::Bytes(_) => TypeWidget::bytes(),
            Object::Timestamp(_) => TypeWidget::timestamp(),
            Object::List(items) => {
                let types: Vec<TypeWidget> = items.read().iter().map(infer_constant_type).collect();
                TypeWidget::list(unify_all(&types).unwrap_or_else(|_| TypeWidget::any()))
            }
            Object::Map(map) => {
                let map = map.read();
                let keys: Vec<TypeWidget> =
                    map.keys().map(|k| infer_constant_type(&k.0)).collect();
                let values: Vec<TypeWidget> = map.values().map(infer_constant_type).collect();
                TypeWidget::map(
                    unify_all(&keys).unwrap_or_else(|_| TypeWidget::any()),
                    unify_all(&values).unwrap_or_else(|_| TypeWidget::any()),
                )
            }
            Object::Record(_) => TypeWidget::record(),
            Object::Timeout(_) => TypeWidget::timeout(),
            Object::Throwable(_) => TypeWidget::throwable(),
            _ => TypeWidget::any(),
        },
    };
    ty.not_nullable()
}

/// Element shapes of composite kinds with matching representations
pub(crate) fn unify_composite(left: &TypeWidget, right: &TypeWidget) -> TypeWidget {
    match (left.shape(), right.shape()) {
        (Shape::Array(a), Shape::Array(b)) => TypeWidget::array(unify(a, b)),
        (Shape::List(a), Shape::List(b)) => TypeWidget::list(unify(a, b)),
        (Shape::Map(ka, va), Shape::Map(kb, vb)) => TypeWidget::map(unify(ka, kb), unify(va, vb)),
        (Shape::Promise(a), Shape::Promise(b)) => TypeWidget::promise(unify(a, b)),
        (Shape::Result(a), Shape::Result(b)) => TypeWidget::result(unify(a, b)),
        (Shape::Struct(a), Shape::Struct(b)) if a == b => left.clone(),
        (Shape::Record, Shape::Record) => left.clone(),
        _ => TypeWidget::any(),
    }
}
