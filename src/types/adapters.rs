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

//! Capability adapters
//!
//! Each adapter covers one operation family for the types that support it.
//! They are obtained through `TypeWidget::*_adapter()` and produce IR; a
//! type without the capability simply has no adapter.
//!
//! Targets handed to an adapter must be non-null at runtime. Builders wrap
//! nullable targets in a null guard before calling in.

use std::sync::Arc;

use crate::bytecode::{FieldRef, Native, Op};
use crate::core::{Error, Result, Value};
use crate::ir::{expr, seq, Expr, Seq};
use crate::runtime::{CallSite, DynOp};

use super::unify::unify_composite;
use super::widget::{ClassShape, Shape, StructShape, TypeWidget};

fn dynamic(op: DynOp) -> Op {
    Op::InvokeDynamic(Arc::new(CallSite::new(op)))
}

// =============================================================================
// Property access
// =============================================================================

/// Named property reads and field merging
#[derive(Debug, Clone)]
pub enum PropertyAdapter {
    Struct(Arc<StructShape>),
    Record,
    /// String-keyed map; properties are entries
    Map(TypeWidget),
    Host(Arc<ClassShape>),
    /// `any`; resolved per concrete type at runtime
    Dynamic,
}

impl PropertyAdapter {
    pub fn of(ty: &TypeWidget) -> Option<Self> {
        match ty.shape() {
            Shape::Struct(s) => Some(PropertyAdapter::Struct(s.clone())),
            Shape::Record => Some(PropertyAdapter::Record),
            Shape::Map(key, value) if matches!(key.shape(), Shape::String | Shape::Any) => {
                Some(PropertyAdapter::Map(value.clone()))
            }
            Shape::Host(class) => Some(PropertyAdapter::Host(class.clone())),
            Shape::Any => Some(PropertyAdapter::Dynamic),
            _ => None,
        }
    }

    /// Whether the set of properties is known statically
    pub fn is_closed(&self) -> bool {
        matches!(self, PropertyAdapter::Struct(_) | PropertyAdapter::Host(_))
    }

    /// Static type of a property; closed types reject unknown names
    pub fn property_type(&self, name: &str) -> Result<TypeWidget> {
        match self {
            PropertyAdapter::Struct(s) => s
                .field(name)
                .map(|(_, f)| f.ty.clone())
                .ok_or_else(|| Error::property_not_found(s.name.as_ref(), name)),
            PropertyAdapter::Host(class) => class
                .property(name)
                .map(|t| t.boxed().nullable())
                .ok_or_else(|| Error::property_not_found(class.name.as_ref(), name)),
            PropertyAdapter::Map(value) => Ok(value.nullable()),
            PropertyAdapter::Record | PropertyAdapter::Dynamic => Ok(TypeWidget::any()),
        }
    }

    /// Read a property of a non-null `target`
    pub fn property(&self, target: Expr, name: &str) -> Result<Expr> {
        let ty = self.property_type(name)?;
        let out = match self {
            PropertyAdapter::Struct(s) => {
                let (_, field) = s
                    .field(name)
                    .ok_or_else(|| Error::property_not_found(s.name.as_ref(), name))?;
                let field = Arc::new(FieldRef {
                    class: s.name.clone(),
                    name: field.name.clone(),
                    repr: field.ty.repr().clone(),
                });
                expr(ty, move |code| {
                    target.generate(code)?;
                    code.emit(Op::GetField(field.clone()));
                    Ok(())
                })
            }
            PropertyAdapter::Record => {
                let name = Value::string(name);
                expr(ty, move |code| {
                    target.generate(code)?;
                    code.emit(Op::Const(name.clone()));
                    code.emit(Op::CallNative(Native::RecordGet));
                    Ok(())
                })
            }
            PropertyAdapter::Map(_) => {
                let name = Value::string(name);
                expr(ty.clone(), move |code| {
                    target.generate(code)?;
                    code.emit(Op::Const(name.clone()));
                    code.emit(Op::CallNative(Native::MapGet));
                    code.downcast(&ty);
                    Ok(())
                })
            }
            PropertyAdapter::Host(_) | PropertyAdapter::Dynamic => {
                let op = dynamic(DynOp::GetProperty(Arc::from(name)));
                expr(ty.clone(), move |code| {
                    target.generate(code)?;
                    code.emit(op.clone());
                    code.downcast(&ty);
                    Ok(())
                })
            }
        };
        Ok(out)
    }

    /// Copy the non-null properties of `source` into an open `record`
    pub fn merge_into(&self, record: Expr, source: Expr) -> Result<Seq> {
        match self {
            PropertyAdapter::Struct(s) => {
                let shape = s.clone();
                Ok(seq(move |code| {
                    let record_slot = code.allocate_temp(1);
                    let source_slot = code.allocate_temp(1);
                    let value_slot = code.allocate_temp(1);
                    record.generate(code)?;
                    code.emit(Op::Store(record_slot));
                    source.generate(code)?;
                    code.emit(Op::Store(source_slot));
                    for field in &shape.fields {
                        let skip = code.new_label();
                        code.emit(Op::Load(source_slot));
                        code.emit(Op::GetField(Arc::new(FieldRef {
                            class: shape.name.clone(),
                            name: field.name.clone(),
                            repr: field.ty.repr().clone(),
                        })));
                        code.box_value(&field.ty)?;
                        code.emit(Op::Store(value_slot));
                        if field.ty.is_nullable() {
                            code.emit(Op::Load(value_slot));
                            code.emit(Op::IfNull(skip));
                        }
                        code.emit(Op::Load(record_slot));
                        code.emit(Op::Const(Value::string(&field.name)));
                        code.emit(Op::Load(value_slot));
                        code.emit(Op::CallNative(Native::RecordPut));
                        code.mark(skip);
                    }
                    Ok(())
                }))
            }
            _ => {
                let op = dynamic(DynOp::MergeFields);
                Ok(seq(move |code| {
                    record.generate(code)?;
                    source.generate(code)?;
                    code.emit(op.clone());
                    Ok(())
                }))
            }
        }
    }
}

// =============================================================================
// Indexing
// =============================================================================

/// Keyed element reads and lengths
#[derive(Debug, Clone)]
pub enum IndexAdapter {
    List(TypeWidget),
    Map(TypeWidget, TypeWidget),
    Record,
    Dynamic,
}

impl IndexAdapter {
    pub fn of(ty: &TypeWidget) -> Option<Self> {
        match ty.shape() {
            Shape::Array(elem) | Shape::List(elem) => Some(IndexAdapter::List(elem.clone())),
            Shape::Map(key, value) => Some(IndexAdapter::Map(key.clone(), value.clone())),
            Shape::Record => Some(IndexAdapter::Record),
            Shape::Any => Some(IndexAdapter::Dynamic),
            _ => None,
        }
    }

    pub fn key_type(&self) -> TypeWidget {
        match self {
            IndexAdapter::List(_) => TypeWidget::int32(),
            IndexAdapter::Map(key, _) => key.clone(),
            IndexAdapter::Record => TypeWidget::string(),
            IndexAdapter::Dynamic => TypeWidget::any(),
        }
    }

    /// Element type; missing entries read as null
    pub fn item_type(&self) -> TypeWidget {
        match self {
            IndexAdapter::List(elem) => elem.nullable(),
            IndexAdapter::Map(_, value) => value.nullable(),
            IndexAdapter::Record | IndexAdapter::Dynamic => TypeWidget::any(),
        }
    }

    /// Read the element at `key` of a non-null `target`
    pub fn index(&self, target: Expr, key: Expr) -> Result<Expr> {
        let ty = self.item_type();
        let key_ty = self.key_type();
        let op = match self {
            IndexAdapter::List(_) => Op::CallNative(Native::ListGet),
            IndexAdapter::Map(_, _) => Op::CallNative(Native::MapGet),
            IndexAdapter::Record => Op::CallNative(Native::RecordGet),
            IndexAdapter::Dynamic => dynamic(DynOp::Index),
        };
        Ok(expr(ty.clone(), move |code| {
            target.generate(code)?;
            key.generate(code)?;
            code.cast(&key_ty, key.ty())?;
            code.emit(op.clone());
            code.downcast(&ty);
            Ok(())
        }))
    }

    /// Number of elements of a non-null `target`
    pub fn length(&self, target: Expr) -> Expr {
        expr(TypeWidget::int32(), move |code| {
            target.generate(code)?;
            code.emit(Op::CallNative(Native::Length));
            Ok(())
        })
    }
}

// =============================================================================
// Iteration
// =============================================================================

/// Uniform iteration: every iterable is viewed as a list
#[derive(Debug, Clone)]
pub enum IterateAdapter {
    List(TypeWidget),
    Dynamic,
}

impl IterateAdapter {
    pub fn of(ty: &TypeWidget) -> Option<Self> {
        match ty.shape() {
            Shape::Array(elem) | Shape::List(elem) => Some(IterateAdapter::List(elem.clone())),
            Shape::Any => Some(IterateAdapter::Dynamic),
            _ => None,
        }
    }

    pub fn item_type(&self) -> TypeWidget {
        match self {
            IterateAdapter::List(elem) => elem.nullable(),
            IterateAdapter::Dynamic => TypeWidget::any(),
        }
    }

    /// List view of a non-null `target`
    pub fn to_list(&self, target: Expr) -> Expr {
        match self {
            IterateAdapter::List(_) => target,
            IterateAdapter::Dynamic => {
                let op = dynamic(DynOp::Iterate);
                expr(TypeWidget::list(TypeWidget::any()).not_nullable(), move |code| {
                    target.generate(code)?;
                    code.emit(op.clone());
                    Ok(())
                })
            }
        }
    }
}

// =============================================================================
// Promises and results
// =============================================================================

/// Resolution of promise-typed values
#[derive(Debug, Clone)]
pub struct PromiseAdapter {
    result: TypeWidget,
}

impl PromiseAdapter {
    pub fn new(result: TypeWidget) -> Self {
        Self { result }
    }

    pub fn result_type(&self) -> &TypeWidget {
        &self.result
    }

    /// Block on a non-null promise until it settles or `timeout` expires
    pub fn resolve(&self, timeout: Expr, target: Expr) -> Expr {
        let ty = self.result.nullable();
        expr(ty.clone(), move |code| {
            target.generate(code)?;
            timeout.generate(code)?;
            code.emit(Op::CallNative(Native::PromiseGet));
            code.downcast(&ty);
            Ok(())
        })
    }

    /// Promise of `function` applied to the settled value
    pub fn resolve_later(&self, target: Expr, function: Expr, returns: TypeWidget) -> Expr {
        expr(TypeWidget::promise(returns).not_nullable(), move |code| {
            target.generate(code)?;
            function.generate(code)?;
            code.emit(Op::CallNative(Native::PromiseThen));
            Ok(())
        })
    }
}

/// Unwrapping of captured outcomes
#[derive(Debug, Clone)]
pub struct ResultAdapter {
    value: TypeWidget,
}

impl ResultAdapter {
    pub fn new(value: TypeWidget) -> Self {
        Self { value }
    }

    pub fn value_type(&self) -> &TypeWidget {
        &self.value
    }

    /// Success value of a non-null outcome; a captured fault is rethrown
    pub fn value(&self, target: Expr) -> Expr {
        let ty = self.value.nullable();
        expr(ty.clone(), move |code| {
            target.generate(code)?;
            code.emit(Op::CallNative(Native::OutcomeValue));
            code.downcast(&ty);
            Ok(())
        })
    }
}

// =============================================================================
// Unification
// =============================================================================

/// Element-wise unification of composite types
#[derive(Debug, Clone, Copy)]
pub struct UnificationAdapter;

impl UnificationAdapter {
    pub fn of(ty: &TypeWidget) -> Option<Self> {
        ty.kind().is_composite().then_some(UnificationAdapter)
    }

    pub fn unify(&self, left: &TypeWidget, right: &TypeWidget) -> TypeWidget {
        unify_composite(left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::CodeEmitter;
    use crate::ir::null;
    use crate::types::FieldShape;

    fn point() -> TypeWidget {
        TypeWidget::structure(Arc::new(StructShape {
            name: Arc::from("struct_1"),
            fields: vec![
                FieldShape {
                    name: Arc::from("x"),
                    ty: TypeWidget::int32(),
                },
                FieldShape {
                    name: Arc::from("label"),
                    ty: TypeWidget::string(),
                },
            ],
        }))
    }

    #[test]
    fn test_capabilities_by_shape() {
        assert!(PropertyAdapter::of(&point()).is_some());
        assert!(PropertyAdapter::of(&TypeWidget::string()).is_none());
        assert!(IndexAdapter::of(&TypeWidget::list(TypeWidget::int32())).is_some());
        assert!(IterateAdapter::of(&TypeWidget::map(TypeWidget::string(), TypeWidget::any()))
            .is_none());
        assert!(UnificationAdapter::of(&TypeWidget::record()).is_some());
        assert!(UnificationAdapter::of(&TypeWidget::int32()).is_none());
    }

    #[test]
    fn test_closed_struct_rejects_unknown_property() {
        let adapter = PropertyAdapter::of(&point()).unwrap();
        assert_eq!(adapter.property_type("X").unwrap(), TypeWidget::int32());
        let err = adapter.property_type("c").unwrap_err();
        assert_eq!(err.to_string(), "property 'c' not found on struct_1");
        // open records accept any name
        let record = PropertyAdapter::of(&TypeWidget::record()).unwrap();
        assert!(record.property_type("anything").unwrap().is_any());
    }

    #[test]
    fn test_struct_property_is_a_field_read() {
        let adapter = PropertyAdapter::of(&point()).unwrap();
        let read = adapter.property(null(point()), "label").unwrap();
        let mut code = CodeEmitter::new();
        read.generate(&mut code).unwrap();
        assert!(matches!(&code.ops()[1], Op::GetField(f) if &*f.name == "label"));
    }

    #[test]
    fn test_dynamic_property_uses_call_site() {
        let adapter = PropertyAdapter::of(&TypeWidget::any()).unwrap();
        let read = adapter.property(null(TypeWidget::any()), "x").unwrap();
        let mut code = CodeEmitter::new();
        read.generate(&mut code).unwrap();
        assert!(matches!(code.ops()[1], Op::InvokeDynamic(_)));
        assert_eq!(code.position(), 2);
    }
}
