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

// Record construction
//
// A builder starts Static: fields become a generated closed struct. Adding a
// name that is not an identifier, or merging a source whose fields are not
// statically known, moves it to Dynamic for good; the fields gathered so far
// are replayed into the open record.
//
// Static:  new struct_N; for each field: value != null => obj.field = value
// Dynamic: new record;   for each entry: put non-null values / merge source

use std::rc::Rc;
use std::sync::Arc;

use crate::bytecode::{FieldRef, Native, Op};
use crate::core::{Error, Result, Value};
use crate::ir::{expr, AssignableValue, Expr, Local, LocalFrame, Seq};
use crate::types::{unify, PropertyAdapter, Shape, StructFactory, TypeWidget};

/// Whether `name` can be a struct field
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

enum Entry {
    Field(String, Expr),
    Merge(Expr),
}

enum State {
    Static(Vec<(String, Expr)>),
    Dynamic(Vec<Entry>),
}

pub struct RecordBuilder {
    frame: Rc<LocalFrame>,
    structs: Rc<dyn StructFactory>,
    /// Sequences run before any field value, in order
    prelude: Vec<Seq>,
    state: State,
}

impl RecordBuilder {
    pub fn new(parent: &Rc<LocalFrame>, structs: Rc<dyn StructFactory>) -> Self {
        Self {
            frame: parent.child(),
            structs,
            prelude: Vec::new(),
            state: State::Static(Vec::new()),
        }
    }

    /// A builder that is Dynamic from the start
    pub fn dynamic(parent: &Rc<LocalFrame>, structs: Rc<dyn StructFactory>) -> Self {
        let mut builder = Self::new(parent, structs);
        builder.state = State::Dynamic(Vec::new());
        builder
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.state, State::Dynamic(_))
    }

    fn to_dynamic(&mut self) {
        if let State::Static(fields) = &mut self.state {
            let replay = std::mem::take(fields)
                .into_iter()
                .map(|(name, value)| Entry::Field(name, value))
                .collect();
            tracing::trace!("record builder switched to dynamic");
            self.state = State::Dynamic(replay);
        }
    }

    /// Set field `name`; a later non-null value for the same name wins
    pub fn add(mut self, name: &str, value: Expr) -> Result<Self> {
        if value.ty().is_void() {
            return Err(Error::invalid_argument(format!("field '{}' has no value", name)));
        }
        if !is_identifier(name) {
            self.to_dynamic();
        }
        match &mut self.state {
            State::Static(fields) => fields.push((name.to_string(), value)),
            State::Dynamic(entries) => entries.push(Entry::Field(name.to_string(), value)),
        }
        Ok(self)
    }

    /// Copy the non-null fields of `source`
    pub fn merge(mut self, source: Expr) -> Result<Self> {
        let adapter = PropertyAdapter::of(source.ty()).ok_or_else(|| {
            Error::invalid_argument(format!("cannot merge fields of {}", source.ty()))
        })?;
        let flatten = !self.is_dynamic() && !source.ty().is_nullable();
        if let (true, Shape::Struct(shape)) = (flatten, source.ty().shape()) {
            let held = self.frame.temp("merge", source.ty().clone());
            self.prelude.push(held.write(source.clone()));
            for field in &shape.fields {
                let value = adapter.property(held.read(), &field.name)?;
                self = self.add(&field.name, value)?;
            }
            return Ok(self);
        }
        self.to_dynamic();
        if let State::Dynamic(entries) = &mut self.state {
            entries.push(Entry::Merge(source));
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Expr> {
        let RecordBuilder {
            frame,
            structs,
            prelude,
            state,
        } = self;
        match state {
            State::Static(fields) => build_struct(frame, structs.as_ref(), prelude, fields),
            State::Dynamic(entries) => build_record(frame, prelude, entries),
        }
    }
}

fn build_struct(
    frame: Rc<LocalFrame>,
    structs: &dyn StructFactory,
    prelude: Vec<Seq>,
    fields: Vec<(String, Expr)>,
) -> Result<Expr> {
    // one struct field per distinct name, typed to hold every assignment
    let mut layout: Vec<(Arc<str>, TypeWidget)> = Vec::new();
    let mut targets = Vec::with_capacity(fields.len());
    for (name, value) in &fields {
        let key = name.to_uppercase();
        match layout.iter().position(|(n, _)| n.to_uppercase() == key) {
            Some(at) => {
                layout[at].1 = unify(&layout[at].1, value.ty());
                targets.push(at);
            }
            None => {
                targets.push(layout.len());
                layout.push((Arc::from(name.as_str()), value.ty().clone()));
            }
        }
    }
    let ty = structs.struct_type(&layout)?;
    let class = match ty.repr().class_name() {
        Some(class) => Arc::<str>::from(class),
        None => return Err(Error::internal(format!("struct type {} has no class", ty))),
    };
    let refs: Vec<(Arc<FieldRef>, TypeWidget)> = layout
        .iter()
        .map(|(name, fty)| {
            let field = Arc::new(FieldRef {
                class: class.clone(),
                name: name.clone(),
                repr: fty.repr().clone(),
            });
            (field, fty.clone())
        })
        .collect();
    let object = frame.temp("record", ty.clone());
    Ok(expr(ty, move |code| {
        code.enter_frame(&frame);
        for s in &prelude {
            s.generate(code)?;
        }
        let slot = code.local_slot(&object)?;
        code.emit(Op::New(class.clone()));
        code.emit(Op::Store(slot));
        for ((_, value), at) in fields.iter().zip(&targets) {
            let (field, fty) = &refs[*at];
            let next = code.new_label();
            code.emit(Op::Load(slot));
            value.generate(code)?;
            if value.ty().is_nullable() {
                let put = code.new_label();
                code.emit(Op::Dup(1));
                code.emit(Op::IfNonNull(put));
                code.emit(Op::Pop(2));
                code.jump(next);
                code.mark(put);
            }
            code.cast(fty, value.ty())?;
            code.emit(Op::PutField(field.clone()));
            code.mark(next);
        }
        code.emit(Op::Load(slot));
        code.exit_frame(&frame)
    }))
}

fn build_record(frame: Rc<LocalFrame>, prelude: Vec<Seq>, entries: Vec<Entry>) -> Result<Expr> {
    let ty = TypeWidget::record().not_nullable();
    let record = frame.temp("record", ty.clone());
    let mut steps: Vec<Seq> = Vec::with_capacity(entries.len());
    for entry in entries {
        steps.push(match entry {
            Entry::Field(name, value) => put_field(&record, name, value),
            Entry::Merge(source) => merge_source(&frame, &record, source)?,
        });
    }
    Ok(expr(ty, move |code| {
        code.enter_frame(&frame);
        for s in &prelude {
            s.generate(code)?;
        }
        let slot = code.local_slot(&record)?;
        code.emit(Op::CallNative(Native::NewRecord));
        code.emit(Op::Store(slot));
        for s in &steps {
            s.generate(code)?;
        }
        code.emit(Op::Load(slot));
        code.exit_frame(&frame)
    }))
}

fn put_field(record: &Local, name: String, value: Expr) -> Seq {
    let record = record.clone();
    let name = Value::string(name);
    crate::ir::seq(move |code| {
        let next = code.new_label();
        let slot = code.local_slot(&record)?;
        code.emit(Op::Load(slot));
        code.emit(Op::Const(name.clone()));
        value.generate(code)?;
        code.box_value(value.ty())?;
        if value.ty().is_nullable() {
            let put = code.new_label();
            code.emit(Op::Dup(1));
            code.emit(Op::IfNonNull(put));
            code.emit(Op::Pop(3));
            code.jump(next);
            code.mark(put);
        }
        code.emit(Op::CallNative(Native::RecordPut));
        code.mark(next);
        Ok(())
    })
}

fn merge_source(frame: &Rc<LocalFrame>, record: &Local, source: Expr) -> Result<Seq> {
    let adapter = PropertyAdapter::of(source.ty()).ok_or_else(|| {
        Error::invalid_argument(format!("cannot merge fields of {}", source.ty()))
    })?;
    let held = frame.temp("merge", source.ty().not_nullable());
    let merge = adapter.merge_into(record.read(), held.read())?;
    Ok(crate::ir::seq(move |code| {
        let skip = code.new_label();
        source.generate(code)?;
        code.null_test(source.ty(), skip);
        let slot = code.local_slot(&held)?;
        code.emit(Op::Store(slot));
        merge.generate(code)?;
        code.mark(skip);
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::access::property_value;
    use crate::builder::collections::map;
    use crate::ir::{literal, null};
    use crate::testing::run_in_source;

    fn int(v: i32) -> Expr {
        literal(Value::Int(v), TypeWidget::int32())
    }

    fn text(s: &str) -> Expr {
        literal(Value::string(s), TypeWidget::string().not_nullable())
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("abc"));
        assert!(is_identifier("_a1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_static_struct_round_trip() {
        let read = |name: &'static str| {
            run_in_source(move |source, frame| {
                let record = RecordBuilder::new(frame, source.clone())
                    .add("a", int(1))?
                    .add("b", null(TypeWidget::string()))?;
                assert!(!record.is_dynamic());
                let built = record.build()?;
                assert!(matches!(built.ty().shape(), Shape::Struct(_)));
                property_value(frame, built, name)
            })
        };
        assert_eq!(read("a").as_i64(), Some(1));
        assert!(read("b").is_null());
    }

    #[test]
    fn test_invalid_name_switches_to_dynamic() {
        let read = |name: &'static str| {
            run_in_source(move |source, frame| {
                let record = RecordBuilder::new(frame, source.clone())
                    .add("a", int(1))?
                    .add("b", text("two"))?
                    .add("1abc", int(3))?;
                assert!(record.is_dynamic());
                let built = record.build()?;
                assert_eq!(built.ty(), &TypeWidget::record().not_nullable());
                property_value(frame, built, name)
            })
        };
        assert_eq!(read("a").as_i64(), Some(1));
        assert_eq!(read("B").as_str(), Some("two"));
        assert_eq!(read("1abc").as_i64(), Some(3));
    }

    #[test]
    fn test_merge_keeps_values_over_nulls() {
        let read = |name: &'static str| {
            run_in_source(move |source, frame| {
                let base = RecordBuilder::new(frame, source.clone())
                    .add("x", int(1))?
                    .add("y", text("kept"))?
                    .build()?;
                let merged = RecordBuilder::new(frame, source.clone())
                    .merge(base)?
                    .add("y", null(TypeWidget::string()))?
                    .add("z", int(3))?;
                assert!(!merged.is_dynamic());
                property_value(frame, merged.build()?, name)
            })
        };
        assert_eq!(read("x").as_i64(), Some(1));
        assert_eq!(read("y").as_str(), Some("kept"));
        assert_eq!(read("z").as_i64(), Some(3));
    }

    #[test]
    fn test_merge_open_source() {
        let out = run_in_source(|source, frame| {
            let entries = map(vec![(text("k"), int(7))])?;
            let record = RecordBuilder::new(frame, source.clone())
                .add("a", int(1))?
                .merge(entries)?
                .merge(null(TypeWidget::record()))?;
            assert!(record.is_dynamic());
            property_value(frame, record.build()?, "k")
        });
        assert_eq!(out.as_i64(), Some(7));
    }
}
