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

// Literal values, inlined or hoisted into shared static storage
//
// Scalars and strings become `Op::Const`. Everything else (lists, maps,
// bytes, timestamps, ...) is stored once in a static field of the
// constants unit; equal `(type, value)` pairs share one field. The build
// pipeline declares those fields and its prepare hook injects the values.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::bytecode::{FieldRef, Op};
use crate::core::{Boxed, Object, Value, ValueKey};
use crate::types::{infer_constant_type, Prim, TypeWidget};

use super::{expr, literal, null, Expr};

/// Name of the unit holding hoisted constants
pub const CONSTANTS_UNIT: &str = "$constants";

/// A hoisted constant slot
#[derive(Debug, Clone)]
pub struct HoistedConstant {
    pub field: Arc<FieldRef>,
    pub ty: TypeWidget,
    pub value: Value,
}

#[derive(Default)]
pub struct ConstantTable {
    hoisted: RefCell<Vec<HoistedConstant>>,
    index: RefCell<FxHashMap<(TypeWidget, ValueKey), usize>>,
}

/// Primitive stack form of a boxed scalar
fn unboxed_literal(b: Boxed) -> Value {
    match b {
        Boxed::Boolean(v) => Value::Int(i32::from(v)),
        Boxed::Byte(v) => Value::Int(v as i32),
        Boxed::Short(v) => Value::Int(v as i32),
        Boxed::Int(v) => Value::Int(v),
        Boxed::Long(v) => Value::Long(v),
        Boxed::Float(v) => Value::Float(v),
        Boxed::Double(v) => Value::Double(v),
    }
}

impl ConstantTable {
    pub fn new() -> Rc<Self> {
        Rc::new(ConstantTable::default())
    }

    /// Expression producing `value` at its inferred type
    pub fn constant(&self, value: Value) -> Expr {
        if value.is_null() {
            return null(TypeWidget::any());
        }
        let ty = infer_constant_type(&value);
        match value {
            Value::Object(Object::Boxed(b)) => literal(unboxed_literal(b), ty),
            Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_) => {
                literal(value, ty)
            }
            Value::Object(Object::String(_)) => literal(value, ty),
            other => self.hoist(other, ty),
        }
    }

    /// Boolean literal
    pub fn boolean(&self, value: bool) -> Expr {
        literal(Value::Int(i32::from(value)), TypeWidget::primitive(Prim::Boolean))
    }

    /// Store `value` in the constants unit and read it back
    pub fn hoist(&self, value: Value, ty: TypeWidget) -> Expr {
        let key = (ty.clone(), ValueKey(value.clone()));
        let existing = self.index.borrow().get(&key).copied();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut hoisted = self.hoisted.borrow_mut();
                let slot = hoisted.len();
                hoisted.push(HoistedConstant {
                    field: Arc::new(FieldRef {
                        class: Arc::from(CONSTANTS_UNIT),
                        name: Arc::from(format!("c{}", slot)),
                        repr: ty.repr().clone(),
                    }),
                    ty: ty.clone(),
                    value,
                });
                self.index.borrow_mut().insert(key, slot);
                slot
            }
        };
        let field = self.hoisted.borrow()[slot].field.clone();
        expr(ty, move |code| {
            code.emit(Op::GetStatic(field.clone()));
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        self.hoisted.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hoisted(&self) -> Vec<HoistedConstant> {
        self.hoisted.borrow().clone()
    }
}
