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

// Closed struct generation
//
// Each distinct field list gets one generated unit holding a typed field per
// property, a static `new` constructor and the reflective accessors the
// dynamic runtime drives:
//
//   get(name) -> any            case-insensitive switch over field names
//   put(name, value: any)       same dispatch, value narrowed to the field
//   field_names() -> list       declaration order

use std::cell::{Cell, RefCell};
use std::collections::hash_map::Entry;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::bytecode::{FieldRef, Native, Op};
use crate::core::{Error, Result, Value};
use crate::ir::{seq, Local};
use crate::types::{FieldShape, StructShape, TypeWidget};

use super::unit::{MethodGenerator, UnitGenerator};

/// Prefix of generated struct unit names
pub const STRUCT_PREFIX: &str = "struct_";

type FieldList = Vec<(Arc<str>, TypeWidget)>;

/// Memoizes one struct type per field list
#[derive(Default)]
pub struct StructGenerator {
    types: RefCell<FxHashMap<FieldList, TypeWidget>>,
    counter: Cell<u32>,
}

impl StructGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct struct types generated
    pub fn len(&self) -> usize {
        self.types.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Struct type for `fields`; the unit is returned only on first request
    pub fn generate(
        &self,
        fields: &[(Arc<str>, TypeWidget)],
    ) -> Result<(TypeWidget, Option<UnitGenerator>)> {
        let mut seen = FxHashSet::default();
        for (name, _) in fields {
            if !seen.insert(name.to_uppercase()) {
                return Err(Error::invalid_argument(format!(
                    "duplicate struct field '{}'",
                    name
                )));
            }
        }

        let mut types = self.types.borrow_mut();
        let vacant = match types.entry(fields.to_vec()) {
            Entry::Occupied(e) => return Ok((e.get().clone(), None)),
            Entry::Vacant(e) => e,
        };
        let n = self.counter.get();
        self.counter.set(n + 1);
        let shape = Arc::new(StructShape {
            name: Arc::from(format!("{}{}", STRUCT_PREFIX, n)),
            fields: fields
                .iter()
                .map(|(name, ty)| FieldShape {
                    name: name.clone(),
                    ty: ty.clone(),
                })
                .collect(),
        });
        let ty = TypeWidget::structure(shape.clone()).not_nullable();
        let unit = struct_unit(&shape, &ty)?;
        tracing::debug!(unit = %shape.name, fields = fields.len(), "generated struct type");
        vacant.insert(ty.clone());
        Ok((ty, Some(unit)))
    }
}

fn struct_unit(shape: &Arc<StructShape>, ty: &TypeWidget) -> Result<UnitGenerator> {
    let mut unit = UnitGenerator::new(&shape.name);
    let mut fields: Vec<(Arc<FieldRef>, TypeWidget)> = Vec::with_capacity(shape.fields.len());
    for f in &shape.fields {
        fields.push((unit.add_field(&f.name, f.ty.clone())?, f.ty.clone()));
    }
    let fields = Arc::new(fields);

    unit.add_method(constructor(shape, ty, &fields))?;
    unit.add_method(getter(ty, &fields)?)?;
    unit.add_method(setter(ty, &fields)?)?;
    unit.add_method(field_names(ty, &fields)?)?;
    Ok(unit)
}

fn constructor(
    shape: &Arc<StructShape>,
    ty: &TypeWidget,
    fields: &Arc<Vec<(Arc<FieldRef>, TypeWidget)>>,
) -> MethodGenerator {
    let params: Vec<(&str, TypeWidget)> = shape
        .fields
        .iter()
        .map(|f| (&*f.name, f.ty.clone()))
        .collect();
    let mut m = MethodGenerator::new_static(&shape.name, "new", &params, ty.clone());
    let args: Vec<Local> = m.params().to_vec();
    let class = shape.name.clone();
    let fields = fields.clone();
    m.set_body(seq(move |code| {
        code.emit(Op::New(class.clone()));
        for ((field, fty), arg) in fields.iter().zip(&args) {
            code.emit(Op::Dup(1));
            let slot = code.local_slot(arg)?;
            code.load_slot(slot, fty.width());
            code.emit(Op::PutField(field.clone()));
        }
        code.emit(Op::Return(1));
        Ok(())
    }));
    m
}

fn getter(
    ty: &TypeWidget,
    fields: &Arc<Vec<(Arc<FieldRef>, TypeWidget)>>,
) -> Result<MethodGenerator> {
    let mut m = MethodGenerator::new_instance(
        ty,
        "get",
        &[("name", TypeWidget::string())],
        TypeWidget::any(),
    )?;
    let this = m.this().cloned().ok_or_else(|| Error::internal("accessor without receiver"))?;
    let name = m.param(0)?;
    let fields = fields.clone();
    m.set_body(seq(move |code| {
        let this_slot = code.local_slot(&this)?;
        let name_slot = code.local_slot(&name)?;
        let missing = code.new_label();
        let cases: Vec<(String, _)> = fields
            .iter()
            .map(|(f, _)| (f.name.to_string(), code.new_label()))
            .collect();
        code.emit(Op::Load(name_slot));
        code.emit_string_switch(&cases, missing);
        for ((field, fty), (_, label)) in fields.iter().zip(&cases) {
            code.mark(*label);
            code.emit(Op::Load(this_slot));
            code.emit(Op::GetField(field.clone()));
            code.box_value(fty)?;
            code.emit(Op::Return(1));
        }
        code.mark(missing);
        code.emit(Op::Load(name_slot));
        code.emit(Op::CallNative(Native::PropertyNotFound));
        code.emit(Op::Throw);
        Ok(())
    }));
    Ok(m)
}

fn setter(
    ty: &TypeWidget,
    fields: &Arc<Vec<(Arc<FieldRef>, TypeWidget)>>,
) -> Result<MethodGenerator> {
    let mut m = MethodGenerator::new_instance(
        ty,
        "put",
        &[("name", TypeWidget::string()), ("value", TypeWidget::any())],
        TypeWidget::void(),
    )?;
    let this = m.this().cloned().ok_or_else(|| Error::internal("accessor without receiver"))?;
    let name = m.param(0)?;
    let value = m.param(1)?;
    let fields = fields.clone();
    m.set_body(seq(move |code| {
        let this_slot = code.local_slot(&this)?;
        let name_slot = code.local_slot(&name)?;
        let value_slot = code.local_slot(&value)?;
        let missing = code.new_label();
        let cases: Vec<(String, _)> = fields
            .iter()
            .map(|(f, _)| (f.name.to_string(), code.new_label()))
            .collect();
        code.emit(Op::Load(name_slot));
        code.emit_string_switch(&cases, missing);
        for ((field, fty), (_, label)) in fields.iter().zip(&cases) {
            code.mark(*label);
            code.emit(Op::Load(this_slot));
            code.emit(Op::Load(value_slot));
            if fty.is_primitive() {
                code.unbox(&fty.boxed().not_nullable())?;
            } else {
                code.downcast(fty);
            }
            code.emit(Op::PutField(field.clone()));
            code.emit(Op::Return(0));
        }
        code.mark(missing);
        code.emit(Op::Load(name_slot));
        code.emit(Op::CallNative(Native::PropertyNotFound));
        code.emit(Op::Throw);
        Ok(())
    }));
    Ok(m)
}

fn field_names(
    ty: &TypeWidget,
    fields: &Arc<Vec<(Arc<FieldRef>, TypeWidget)>>,
) -> Result<MethodGenerator> {
    let mut m = MethodGenerator::new_instance(
        ty,
        "field_names",
        &[],
        TypeWidget::list(TypeWidget::string()),
    )?;
    let names: Vec<Arc<str>> = fields.iter().map(|(f, _)| f.name.clone()).collect();
    m.set_body(seq(move |code| {
        code.emit(Op::CallNative(Native::NewList));
        for name in &names {
            code.emit(Op::Dup(1));
            code.emit(Op::Const(Value::string(name)));
            code.emit(Op::CallNative(Native::ListAdd));
        }
        code.emit(Op::Return(1));
        Ok(())
    }));
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ClassLoader, Fault, Machine};

    fn load(fields: &[(Arc<str>, TypeWidget)]) -> (Arc<ClassLoader>, Arc<str>) {
        let structs = StructGenerator::new();
        let (ty, unit) = structs.generate(fields).unwrap();
        let unit = unit.unwrap();
        let rendered = unit.render(true).unwrap();
        let loader = ClassLoader::new();
        loader.define(rendered.into_class()).unwrap();
        (loader, Arc::from(ty.repr().class_name().unwrap()))
    }

    fn ab() -> Vec<(Arc<str>, TypeWidget)> {
        vec![
            (Arc::from("a"), TypeWidget::int32()),
            (Arc::from("b"), TypeWidget::string().nullable()),
        ]
    }

    #[test]
    fn test_same_fields_share_one_type() {
        let structs = StructGenerator::new();
        let (first, unit) = structs.generate(&ab()).unwrap();
        assert!(unit.is_some());
        let (second, unit) = structs.generate(&ab()).unwrap();
        assert!(unit.is_none());
        assert_eq!(first, second);
        assert_eq!(structs.len(), 1);

        let dup = vec![
            (Arc::from("x"), TypeWidget::int32()),
            (Arc::from("X"), TypeWidget::int32()),
        ];
        assert!(structs.generate(&dup).is_err());
    }

    #[test]
    fn test_accessors() {
        let (loader, class) = load(&ab());
        let unit = loader.class(&class).unwrap();
        let vm = Machine::new(loader.clone());

        let ctor = unit.method("new").unwrap().clone();
        let s = vm.invoke(&ctor, vec![Value::Int(1), Value::Null]).unwrap();

        let get = unit.method("get").unwrap().clone();
        let a = vm.invoke(&get, vec![s.clone(), Value::string("A")]).unwrap();
        assert_eq!(a.as_i64(), Some(1));
        let b = vm.invoke(&get, vec![s.clone(), Value::string("b")]).unwrap();
        assert!(b.is_null());

        let put = unit.method("put").unwrap().clone();
        vm.invoke(&put, vec![s.clone(), Value::string("b"), Value::string("x")])
            .unwrap();
        let b = vm.invoke(&get, vec![s.clone(), Value::string("B")]).unwrap();
        assert_eq!(b.as_str(), Some("x"));

        let err = vm.invoke(&get, vec![s.clone(), Value::string("c")]).unwrap_err();
        assert!(matches!(err, Fault::PropertyNotFound(ref n) if n == "c"));

        let names = unit.method("field_names").unwrap().clone();
        let list = vm.invoke(&names, vec![s]).unwrap().as_list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].as_str(), Some("a"));
    }
}
