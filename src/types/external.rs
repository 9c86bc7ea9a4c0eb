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

//! External value-type vocabulary
//!
//! The planner describes values with [`ValueType`]. Resolution into widgets
//! goes through [`crate::types::TypeRegistry::resolve_value`]; widgets project
//! back out with [`TypeWidget::value_type`].

use std::fmt;
use std::sync::Arc;

use super::kind::{CoreKind, Prim};
use super::widget::{Shape, TypeWidget};

/// Nominal value types understood by the planner
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Void,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    String,
    Bytes,
    Timestamp,
    Any,
    Array(Box<ValueType>),
    Map(Box<ValueType>, Box<ValueType>),
    Struct {
        closed: bool,
        fields: Vec<(Arc<str>, ValueType)>,
    },
    Optional(Box<ValueType>),
    Union(Vec<ValueType>),
}

impl ValueType {
    pub fn array(elem: ValueType) -> Self {
        ValueType::Array(Box::new(elem))
    }

    pub fn map(key: ValueType, value: ValueType) -> Self {
        ValueType::Map(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: ValueType) -> Self {
        match inner {
            ValueType::Optional(_) | ValueType::Any => inner,
            other => ValueType::Optional(Box::new(other)),
        }
    }

    pub fn closed_struct(fields: Vec<(&str, ValueType)>) -> Self {
        ValueType::Struct {
            closed: true,
            fields: fields.into_iter().map(|(n, t)| (Arc::from(n), t)).collect(),
        }
    }

    pub fn open_struct() -> Self {
        ValueType::Struct {
            closed: false,
            fields: Vec::new(),
        }
    }

    /// Primitive kind for scalar value types
    pub fn prim(&self) -> Option<Prim> {
        match self {
            ValueType::Int8 => Some(Prim::Int8),
            ValueType::Int16 => Some(Prim::Int16),
            ValueType::Int32 => Some(Prim::Int32),
            ValueType::Int64 => Some(Prim::Int64),
            ValueType::Float32 => Some(Prim::Float32),
            ValueType::Float64 => Some(Prim::Float64),
            ValueType::Boolean => Some(Prim::Boolean),
            _ => None,
        }
    }

    fn from_prim(prim: Prim) -> Self {
        match prim {
            Prim::Boolean => ValueType::Boolean,
            Prim::Int8 => ValueType::Int8,
            Prim::Int16 => ValueType::Int16,
            Prim::Int32 => ValueType::Int32,
            Prim::Int64 => ValueType::Int64,
            Prim::Float32 => ValueType::Float32,
            Prim::Float64 => ValueType::Float64,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Array(e) => write!(f, "array<{}>", e),
            ValueType::Map(k, v) => write!(f, "map<{}, {}>", k, v),
            ValueType::Struct { closed, fields } => {
                write!(f, "{}struct{{", if *closed { "" } else { "open " })?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, "}}")
            }
            ValueType::Optional(t) => write!(f, "optional<{}>", t),
            ValueType::Union(ts) => {
                write!(f, "union<")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ">")
            }
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}

impl TypeWidget {
    /// Project this widget back into the planner's vocabulary
    pub fn value_type(&self) -> ValueType {
        let base = match self.shape() {
            Shape::Void => ValueType::Void,
            Shape::Any => return ValueType::Any,
            Shape::Primitive(p) | Shape::Boxed(p) => ValueType::from_prim(*p),
            Shape::String => ValueType::String,
            Shape::Bytes => ValueType::Bytes,
            Shape::Timestamp => ValueType::Timestamp,
            Shape::Array(e) | Shape::List(e) => ValueType::array(e.not_nullable().value_type()),
            Shape::Map(k, v) => {
                ValueType::map(k.not_nullable().value_type(), v.not_nullable().value_type())
            }
            Shape::Struct(s) => ValueType::Struct {
                closed: true,
                fields: s
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), f.ty.value_type()))
                    .collect(),
            },
            Shape::Record => ValueType::open_struct(),
            Shape::Enum(_) => ValueType::String,
            Shape::Promise(r) | Shape::Result(r) => return r.value_type(),
            Shape::Host(_) | Shape::Timeout | Shape::Throwable => return ValueType::Any,
        };
        if self.is_nullable() {
            ValueType::optional(base)
        } else {
            base
        }
    }

    /// Core kind of the projected value type
    pub fn value_kind(&self) -> CoreKind {
        match self.shape() {
            Shape::Promise(r) | Shape::Result(r) => r.value_kind(),
            _ => self.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection() {
        assert_eq!(TypeWidget::int32().value_type(), ValueType::Int32);
        assert_eq!(
            TypeWidget::string().value_type(),
            ValueType::optional(ValueType::String)
        );
        assert_eq!(
            TypeWidget::list(TypeWidget::int64()).not_nullable().value_type(),
            ValueType::array(ValueType::Int64)
        );
        assert_eq!(TypeWidget::any().value_type(), ValueType::Any);
        assert_eq!(
            TypeWidget::promise(TypeWidget::int32()).value_kind(),
            CoreKind::Int32
        );
    }

    #[test]
    fn test_optional_is_idempotent() {
        let t = ValueType::optional(ValueType::optional(ValueType::Int32));
        assert_eq!(t, ValueType::Optional(Box::new(ValueType::Int32)));
        assert_eq!(ValueType::optional(ValueType::Any), ValueType::Any);
    }

    #[test]
    fn test_display() {
        let t = ValueType::closed_struct(vec![("a", ValueType::Int32)]);
        assert_eq!(t.to_string(), "struct{a: int32}");
    }
}
