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

// Storage locations with paired read/write expressions

use std::rc::Rc;
use std::sync::Arc;

use crate::bytecode::{CodeEmitter, FieldRef, Native, Op};
use crate::core::{Result, Value};
use crate::types::TypeWidget;

use super::frame::Local;
use super::{expr, seq, Expr, Seq};

/// A location that can be read and written at one type
pub trait AssignableValue {
    fn ty(&self) -> &TypeWidget;

    fn read(&self) -> Expr;

    /// Store `value`, converted to [`AssignableValue::ty`]
    fn write(&self, value: Expr) -> Seq;
}

/// Generate `value` converted to `ty`
fn generate_as(code: &mut CodeEmitter, value: &Expr, ty: &TypeWidget) -> Result<()> {
    value.generate(code)?;
    code.cast(ty, value.ty())
}

impl AssignableValue for Local {
    fn ty(&self) -> &TypeWidget {
        self.as_ref().ty()
    }

    fn read(&self) -> Expr {
        let local = self.clone();
        expr(local.ty().clone(), move |code| {
            let slot = code.local_slot(&local)?;
            code.load_slot(slot, local.ty().width());
            Ok(())
        })
    }

    fn write(&self, value: Expr) -> Seq {
        let local = self.clone();
        seq(move |code| {
            generate_as(code, &value, local.ty())?;
            let slot = code.local_slot(&local)?;
            code.store_slot(slot, local.ty().width());
            Ok(())
        })
    }
}

/// Instance field of a generated unit
pub struct FieldValue {
    target: Expr,
    field: Arc<FieldRef>,
    ty: TypeWidget,
}

impl FieldValue {
    pub fn new(target: Expr, name: &str, ty: TypeWidget) -> Rc<Self> {
        let class = target
            .ty()
            .repr()
            .class_name()
            .map(Arc::from)
            .unwrap_or_else(|| Arc::from("Object"));
        Rc::new(FieldValue {
            target,
            field: Arc::new(FieldRef {
                class,
                name: Arc::from(name),
                repr: ty.repr().clone(),
            }),
            ty,
        })
    }
}

impl AssignableValue for FieldValue {
    fn ty(&self) -> &TypeWidget {
        &self.ty
    }

    fn read(&self) -> Expr {
        let (target, field) = (self.target.clone(), self.field.clone());
        expr(self.ty.clone(), move |code| {
            target.generate(code)?;
            code.emit(Op::GetField(field.clone()));
            Ok(())
        })
    }

    fn write(&self, value: Expr) -> Seq {
        let (target, field, ty) = (self.target.clone(), self.field.clone(), self.ty.clone());
        seq(move |code| {
            target.generate(code)?;
            generate_as(code, &value, &ty)?;
            code.emit(Op::PutField(field.clone()));
            Ok(())
        })
    }
}

/// Static field of a generated unit
pub struct StaticValue {
    field: Arc<FieldRef>,
    ty: TypeWidget,
}

impl StaticValue {
    pub fn new(class: &str, name: &str, ty: TypeWidget) -> Rc<Self> {
        Rc::new(StaticValue {
            field: Arc::new(FieldRef {
                class: Arc::from(class),
                name: Arc::from(name),
                repr: ty.repr().clone(),
            }),
            ty,
        })
    }
}

impl AssignableValue for StaticValue {
    fn ty(&self) -> &TypeWidget {
        &self.ty
    }

    fn read(&self) -> Expr {
        let field = self.field.clone();
        expr(self.ty.clone(), move |code| {
            code.emit(Op::GetStatic(field.clone()));
            Ok(())
        })
    }

    fn write(&self, value: Expr) -> Seq {
        let (field, ty) = (self.field.clone(), self.ty.clone());
        seq(move |code| {
            generate_as(code, &value, &ty)?;
            code.emit(Op::PutStatic(field.clone()));
            Ok(())
        })
    }
}

/// Entry of a map; missing keys read as null
pub struct MapEntry {
    map: Expr,
    key: Expr,
    ty: TypeWidget,
}

impl MapEntry {
    pub fn new(map: Expr, key: Expr, value: TypeWidget) -> Rc<Self> {
        Rc::new(MapEntry {
            map,
            key,
            ty: value.boxed().nullable(),
        })
    }
}

impl AssignableValue for MapEntry {
    fn ty(&self) -> &TypeWidget {
        &self.ty
    }

    fn read(&self) -> Expr {
        let (map, key, ty) = (self.map.clone(), self.key.clone(), self.ty.clone());
        expr(self.ty.clone(), move |code| {
            map.generate(code)?;
            key.generate(code)?;
            code.box_value(key.ty())?;
            code.emit(Op::CallNative(Native::MapGet));
            code.downcast(&ty);
            Ok(())
        })
    }

    fn write(&self, value: Expr) -> Seq {
        let (map, key, ty) = (self.map.clone(), self.key.clone(), self.ty.clone());
        seq(move |code| {
            map.generate(code)?;
            key.generate(code)?;
            code.box_value(key.ty())?;
            generate_as(code, &value, &ty)?;
            code.emit(Op::CallNative(Native::MapPut));
            Ok(())
        })
    }
}

/// Element of a list or array; out of range indexes fault
pub struct ListElement {
    list: Expr,
    index: Expr,
    ty: TypeWidget,
}

impl ListElement {
    pub fn new(list: Expr, index: Expr, elem: TypeWidget) -> Rc<Self> {
        Rc::new(ListElement {
            list,
            index,
            ty: elem.boxed().nullable(),
        })
    }
}

impl AssignableValue for ListElement {
    fn ty(&self) -> &TypeWidget {
        &self.ty
    }

    fn read(&self) -> Expr {
        let (list, index, ty) = (self.list.clone(), self.index.clone(), self.ty.clone());
        expr(self.ty.clone(), move |code| {
            list.generate(code)?;
            generate_as(code, &index, &TypeWidget::int32())?;
            code.emit(Op::CallNative(Native::ListGet));
            code.downcast(&ty);
            Ok(())
        })
    }

    fn write(&self, value: Expr) -> Seq {
        let (list, index, ty) = (self.list.clone(), self.index.clone(), self.ty.clone());
        seq(move |code| {
            list.generate(code)?;
            generate_as(code, &index, &TypeWidget::int32())?;
            generate_as(code, &value, &ty)?;
            code.emit(Op::CallNative(Native::ListSet));
            Ok(())
        })
    }
}

/// Named field of an open record
pub struct RecordField {
    record: Expr,
    name: Arc<str>,
    ty: TypeWidget,
}

impl RecordField {
    pub fn new(record: Expr, name: &str) -> Rc<Self> {
        Rc::new(RecordField {
            record,
            name: Arc::from(name),
            ty: TypeWidget::any(),
        })
    }
}

impl AssignableValue for RecordField {
    fn ty(&self) -> &TypeWidget {
        &self.ty
    }

    fn read(&self) -> Expr {
        let (record, name) = (self.record.clone(), self.name.clone());
        expr(self.ty.clone(), move |code| {
            record.generate(code)?;
            code.emit(Op::Const(Value::string(&name)));
            code.emit(Op::CallNative(Native::RecordGet));
            Ok(())
        })
    }

    fn write(&self, value: Expr) -> Seq {
        let (record, name, ty) = (self.record.clone(), self.name.clone(), self.ty.clone());
        seq(move |code| {
            record.generate(code)?;
            code.emit(Op::Const(Value::string(&name)));
            generate_as(code, &value, &ty)?;
            code.emit(Op::CallNative(Native::RecordPut));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::verify;
    use crate::ir::{block, eval, literal, LocalFrame};

    #[test]
    fn test_local_round_trip_emits_width_sized_ops() {
        let frame = LocalFrame::root();
        let x = frame.allocate("x", TypeWidget::int64());
        let body = block(vec![
            x.write(literal(Value::Int(3), TypeWidget::int32())),
            eval(x.read()),
        ]);
        let mut code = CodeEmitter::new();
        code.enter_frame(&frame);
        body.generate(&mut code).unwrap();
        code.exit_frame(&frame).unwrap();
        code.emit(Op::Return(0));
        let out = code.finish();
        assert!(matches!(out.ops[2], Op::Store2(0)));
        assert!(matches!(out.ops[3], Op::Load2(0)));
        assert!(verify(&out.ops, &out.labels, &[], out.max_locals, 0).is_ok());
    }

    #[test]
    fn test_local_outside_frame_fails() {
        let frame = LocalFrame::root();
        let x = frame.allocate("x", TypeWidget::int32());
        let mut code = CodeEmitter::new();
        assert!(x.read().generate(&mut code).is_err());
    }

    #[test]
    fn test_record_field_boxes_value() {
        let record = crate::ir::expr(TypeWidget::record(), |code| {
            code.emit(Op::CallNative(Native::NewRecord));
            Ok(())
        });
        let field = RecordField::new(record, "n");
        let mut code = CodeEmitter::new();
        field
            .write(literal(Value::Int(1), TypeWidget::int32()))
            .generate(&mut code)
            .unwrap();
        assert!(matches!(code.ops()[3], Op::Box(_)));
    }
}
