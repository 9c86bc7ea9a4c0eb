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

// Loaded units
//
// A `LoadedClass` is the executable form of a generated unit: its instance
// field layout, its static storage and its verified method bodies. The
// `ClassLoader` owns every class of one compiled program together with the
// dynamic linker that serves its call sites.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::bytecode::MethodBody;
use crate::core::{Error, Result, Value};
use crate::types::Repr;

use super::dynamic::DynamicLinker;

/// Default contents of a freshly allocated slot of the given representation
pub fn default_value(repr: &Repr) -> Value {
    match repr {
        Repr::Boolean | Repr::Byte | Repr::Short | Repr::Int => Value::Int(0),
        Repr::Long => Value::Long(0),
        Repr::Float => Value::Float(0.0),
        Repr::Double => Value::Double(0.0),
        Repr::Void | Repr::Ref(_) => Value::Null,
    }
}

/// An executable unit
pub struct LoadedClass {
    pub name: Arc<str>,
    fields: Vec<(Arc<str>, Repr)>,
    field_index: FxHashMap<Arc<str>, usize>,
    statics: RwLock<FxHashMap<Arc<str>, Value>>,
    methods: FxHashMap<Arc<str>, Arc<MethodBody>>,
}

impl LoadedClass {
    pub fn new(
        name: Arc<str>,
        fields: Vec<(Arc<str>, Repr)>,
        statics: Vec<(Arc<str>, Repr)>,
        methods: Vec<MethodBody>,
    ) -> Self {
        let field_index = fields
            .iter()
            .enumerate()
            .map(|(i, (n, _))| (n.clone(), i))
            .collect();
        let statics = statics
            .into_iter()
            .map(|(n, repr)| (n, default_value(&repr)))
            .collect();
        let methods = methods
            .into_iter()
            .map(|m| (m.method.name.clone(), Arc::new(m)))
            .collect();
        Self {
            name,
            fields,
            field_index,
            statics: RwLock::new(statics),
            methods,
        }
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodBody>> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodBody>> {
        self.methods.values()
    }

    pub fn field_slot(&self, name: &str) -> Option<usize> {
        self.field_index.get(name).copied()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn get_static(&self, name: &str) -> Option<Value> {
        self.statics.read().get(name).cloned()
    }

    pub fn set_static(&self, name: &str, value: Value) -> bool {
        match self.statics.write().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// New instance with every field at its default value
    pub fn instantiate(self: &Arc<Self>) -> Instance {
        Instance {
            class: self.clone(),
            fields: RwLock::new(self.fields.iter().map(|(_, r)| default_value(r)).collect()),
        }
    }
}

impl fmt::Debug for LoadedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedClass")
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Instance of a generated struct unit
pub struct Instance {
    class: Arc<LoadedClass>,
    fields: RwLock<Vec<Value>>,
}

impl Instance {
    pub fn class(&self) -> &Arc<LoadedClass> {
        &self.class
    }

    pub fn class_name(&self) -> Arc<str> {
        self.class.name.clone()
    }

    pub fn get(&self, slot: usize) -> Value {
        self.fields.read().get(slot).cloned().unwrap_or_default()
    }

    pub fn set(&self, slot: usize, value: Value) {
        if let Some(field) = self.fields.write().get_mut(slot) {
            *field = value;
        }
    }

    /// Read a field by name
    pub fn field(&self, name: &str) -> Option<Value> {
        self.class.field_slot(name).map(|slot| self.get(slot))
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields.read();
        let mut s = f.debug_struct(&self.class.name);
        for ((name, _), value) in self.class.fields.iter().zip(fields.iter()) {
            s.field(name, value);
        }
        s.finish()
    }
}

/// Registry of the loaded units of one program
#[derive(Default)]
pub struct ClassLoader {
    classes: RwLock<FxHashMap<Arc<str>, Arc<LoadedClass>>>,
    linker: DynamicLinker,
}

impl ClassLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn define(&self, class: LoadedClass) -> Result<Arc<LoadedClass>> {
        let mut classes = self.classes.write();
        if classes.contains_key(&class.name) {
            return Err(Error::new(crate::core::ErrorKind::DuplicateUnit(
                class.name.to_string(),
            )));
        }
        let class = Arc::new(class);
        classes.insert(class.name.clone(), class.clone());
        Ok(class)
    }

    pub fn class(&self, name: &str) -> Option<Arc<LoadedClass>> {
        self.classes.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn linker(&self) -> &DynamicLinker {
        &self.linker
    }
}

impl fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<Arc<str>> = self.classes.read().keys().cloned().collect();
        names.sort_unstable();
        f.debug_struct("ClassLoader")
            .field("classes", &names)
            .field("linker", &self.linker)
            .finish()
    }
}
