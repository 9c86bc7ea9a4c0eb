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

//! Per-compilation type registry
//!
//! Resolution results are memoized per registry. A child registry reads
//! through to its parent's already-resolved types but writes every new
//! resolution into its own cache, so compiling an inner scope never
//! mutates the outer context.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::Result;

use super::external::ValueType;
use super::native::{adapt_native, resolve_scalar, NativeType};
use super::unify::unify_all;
use super::widget::TypeWidget;

/// Creates closed struct types for external struct descriptors
pub trait StructFactory {
    fn struct_type(&self, fields: &[(Arc<str>, TypeWidget)]) -> Result<TypeWidget>;
}

/// Memoizing resolver for external and native type descriptors
#[derive(Default)]
pub struct TypeRegistry {
    parent: Option<Rc<TypeRegistry>>,
    values: RefCell<FxHashMap<ValueType, TypeWidget>>,
    natives: RefCell<FxHashMap<NativeType, TypeWidget>>,
}

impl TypeRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(TypeRegistry::default())
    }

    /// Child context layered over this one
    pub fn child(self: &Rc<Self>) -> Rc<TypeRegistry> {
        Rc::new(TypeRegistry {
            parent: Some(self.clone()),
            ..Default::default()
        })
    }

    fn cached_native(&self, native: &NativeType) -> Option<TypeWidget> {
        if let Some(t) = self.natives.borrow().get(native) {
            return Some(t.clone());
        }
        self.parent.as_ref().and_then(|p| p.cached_native(native))
    }

    fn cached_value(&self, value: &ValueType) -> Option<TypeWidget> {
        if let Some(t) = self.values.borrow().get(value) {
            return Some(t.clone());
        }
        self.parent.as_ref().and_then(|p| p.cached_value(value))
    }

    /// Number of resolutions held by this context, excluding parents
    pub fn local_len(&self) -> usize {
        self.values.borrow().len() + self.natives.borrow().len()
    }

    /// Resolve a host type descriptor
    pub fn resolve_native(&self, native: &NativeType) -> Result<TypeWidget> {
        if let Some(t) = resolve_scalar(native) {
            return Ok(t);
        }
        if let Some(t) = self.cached_native(native) {
            return Ok(t);
        }
        let t = adapt_native(self, native)?;
        self.natives.borrow_mut().insert(native.clone(), t.clone());
        Ok(t)
    }

    /// Resolve a planner value type
    ///
    /// Non-optional value types resolve to non-nullable widgets; `optional`
    /// is the only source of nullability.
    pub fn resolve_value(&self, value: &ValueType, structs: &dyn StructFactory) -> Result<TypeWidget> {
        if let Some(prim) = value.prim() {
            return Ok(TypeWidget::primitive(prim));
        }
        if let Some(t) = self.cached_value(value) {
            return Ok(t);
        }
        let t = match value {
            ValueType::Void => TypeWidget::void(),
            ValueType::String => TypeWidget::string().not_nullable(),
            ValueType::Bytes => TypeWidget::bytes().not_nullable(),
            ValueType::Timestamp => TypeWidget::timestamp().not_nullable(),
            ValueType::Any => TypeWidget::any(),
            ValueType::Array(elem) => {
                TypeWidget::list(self.resolve_value(elem, structs)?).not_nullable()
            }
            ValueType::Map(key, val) => TypeWidget::map(
                self.resolve_value(key, structs)?,
                self.resolve_value(val, structs)?,
            )
            .not_nullable(),
            ValueType::Struct { closed: false, .. } => TypeWidget::record().not_nullable(),
            ValueType::Struct { closed: true, fields } => {
                let fields = fields
                    .iter()
                    .map(|(n, t)| Ok((n.clone(), self.resolve_value(t, structs)?)))
                    .collect::<Result<Vec<_>>>()?;
                structs.struct_type(&fields)?.not_nullable()
            }
            ValueType::Optional(inner) => self.resolve_value(inner, structs)?.boxed().nullable(),
            ValueType::Union(members) => {
                let members = members
                    .iter()
                    .map(|m| self.resolve_value(m, structs))
                    .collect::<Result<Vec<_>>>()?;
                unify_all(&members)?
            }
            ValueType::Int8
            | ValueType::Int16
            | ValueType::Int32
            | ValueType::Int64
            | ValueType::Float32
            | ValueType::Float64
            | ValueType::Boolean => unreachable!("scalars resolved above"),
        };
        self.values.borrow_mut().insert(value.clone(), t.clone());
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::types::{CoreKind, Prim};

    struct NoStructs;

    impl StructFactory for NoStructs {
        fn struct_type(&self, _: &[(Arc<str>, TypeWidget)]) -> Result<TypeWidget> {
            Err(crate::core::Error::unsupported_type("struct"))
        }
    }

    #[test]
    fn test_native_chain_order() {
        let reg = TypeRegistry::new();
        let t = reg
            .resolve_native(&NativeType::list(NativeType::Primitive(Prim::Int32)))
            .unwrap();
        assert_eq!(t, TypeWidget::list(TypeWidget::int32()));
        let t = reg
            .resolve_native(&NativeType::future(NativeType::String))
            .unwrap();
        assert_eq!(t.kind(), CoreKind::Promise);
        let t = reg
            .resolve_native(&NativeType::Provider(Box::new(NativeType::Primitive(
                Prim::Int64,
            ))))
            .unwrap();
        assert_eq!(t, TypeWidget::boxed_of(Prim::Int64));
    }

    #[test]
    fn test_opaque_is_unsupported() {
        let reg = TypeRegistry::new();
        let err = reg
            .resolve_native(&NativeType::Opaque(Arc::from("Socket")))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedType("Socket".into()));
    }

    #[test]
    fn test_reflective_class() {
        let reg = TypeRegistry::new();
        let t = reg
            .resolve_native(&NativeType::class(
                "Person",
                vec![("name", NativeType::String)],
            ))
            .unwrap();
        assert!(t.has_properties());
        assert_eq!(t.to_string(), "Person?");
    }

    #[test]
    fn test_child_does_not_write_parent() {
        let parent = TypeRegistry::new();
        let list = NativeType::list(NativeType::String);
        let a = parent.resolve_native(&list).unwrap();
        let child = parent.child();
        assert_eq!(child.resolve_native(&list).unwrap(), a);
        assert_eq!(child.local_len(), 0);

        let map = NativeType::map(NativeType::String, NativeType::Object);
        child.resolve_native(&map).unwrap();
        assert_eq!(child.local_len(), 1);
        assert_eq!(parent.local_len(), 1);
    }

    #[test]
    fn test_value_types() {
        let reg = TypeRegistry::new();
        let t = reg
            .resolve_value(&ValueType::optional(ValueType::Int32), &NoStructs)
            .unwrap();
        assert_eq!(t, TypeWidget::boxed_of(Prim::Int32));
        let t = reg
            .resolve_value(
                &ValueType::Union(vec![ValueType::Int32, ValueType::Int64]),
                &NoStructs,
            )
            .unwrap();
        assert_eq!(t, TypeWidget::int64());
        let t = reg.resolve_value(&ValueType::open_struct(), &NoStructs).unwrap();
        assert_eq!(t.value_type(), ValueType::open_struct());
        assert!(reg
            .resolve_value(
                &ValueType::closed_struct(vec![("a", ValueType::Int32)]),
                &NoStructs
            )
            .is_err());
    }
}
