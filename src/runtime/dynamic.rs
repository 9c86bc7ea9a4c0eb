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

// Dynamic dispatch for `any`-typed values
//
// Operations on values whose static type is `any` compile to
// `Op::InvokeDynamic` against a `CallSite`. The site keeps a one-entry
// inline cache keyed by the concrete `TypeTag` of the last receiver; on a
// miss it asks the loader's `DynamicLinker` for the adapter of the new type.
// The linker builds each adapter once per type under a lock and serves
// later lookups from a concurrent map without taking it.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::core::{Object, TypeTag, Value, ValueKey};

use super::fault::Fault;
use super::loader::LoadedClass;
use super::machine::{pop, pop_ref, push, Machine, Stack};
use super::record::FieldWriter;

/// Operation performed at a dynamic call site
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DynOp {
    /// [target] -> [value]
    GetProperty(Arc<str>),
    /// [target, key] -> [value]
    Index,
    /// [target] -> [list]
    Iterate,
    /// [record, source] -> []
    MergeFields,
    /// [target] -> [list of names]
    FieldNames,
}

impl DynOp {
    /// (slots popped, slots pushed)
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            DynOp::GetProperty(_) | DynOp::Iterate | DynOp::FieldNames => (1, 1),
            DynOp::Index => (2, 1),
            DynOp::MergeFields => (2, 0),
        }
    }
}

/// Uniform operation set over one concrete runtime type
pub trait RuntimeAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn property(&self, cx: &Machine, target: &Value, name: &str) -> Result<Value, Fault>;

    fn index(&self, cx: &Machine, target: &Value, key: &Value) -> Result<Value, Fault> {
        let _ = (cx, target, key);
        Err(Fault::unsupported(format!("index into {}", self.name())))
    }

    fn iterate(&self, cx: &Machine, target: &Value) -> Result<Vec<Value>, Fault> {
        let _ = (cx, target);
        Err(Fault::unsupported(format!("iterate over {}", self.name())))
    }

    fn field_names(&self, cx: &Machine, target: &Value) -> Result<Vec<Arc<str>>, Fault> {
        let _ = (cx, target);
        Ok(Vec::new())
    }

    /// Copy every non-null field of `source` into `writer`
    fn merge_fields(
        &self,
        cx: &Machine,
        source: &Value,
        writer: &dyn FieldWriter,
    ) -> Result<(), Fault> {
        for name in self.field_names(cx, source)? {
            let value = self.property(cx, source, &name)?;
            if !value.is_null() {
                writer.put(&name, value);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Adapters
// =============================================================================

struct RecordAdapter;

impl RuntimeAdapter for RecordAdapter {
    fn name(&self) -> &str {
        "Record"
    }

    fn property(&self, _cx: &Machine, target: &Value, name: &str) -> Result<Value, Fault> {
        Ok(target
            .as_record()
            .and_then(|r| r.get(name))
            .unwrap_or_default())
    }

    fn index(&self, cx: &Machine, target: &Value, key: &Value) -> Result<Value, Fault> {
        match key.as_str() {
            Some(name) => self.property(cx, target, name),
            None => Err(Fault::class_cast("String", key.class_name().as_ref())),
        }
    }

    fn field_names(&self, _cx: &Machine, target: &Value) -> Result<Vec<Arc<str>>, Fault> {
        Ok(target.as_record().map(|r| r.names()).unwrap_or_default())
    }
}

struct MapAdapter;

impl MapAdapter {
    fn get(target: &Value, key: Value) -> Value {
        match target {
            Value::Object(Object::Map(map)) => {
                map.read().get(&ValueKey(key)).cloned().unwrap_or_default()
            }
            _ => Value::Null,
        }
    }
}

impl RuntimeAdapter for MapAdapter {
    fn name(&self) -> &str {
        "Map"
    }

    fn property(&self, _cx: &Machine, target: &Value, name: &str) -> Result<Value, Fault> {
        Ok(MapAdapter::get(target, Value::string(name)))
    }

    fn index(&self, _cx: &Machine, target: &Value, key: &Value) -> Result<Value, Fault> {
        Ok(MapAdapter::get(target, key.clone()))
    }

    fn field_names(&self, _cx: &Machine, target: &Value) -> Result<Vec<Arc<str>>, Fault> {
        Ok(match target {
            Value::Object(Object::Map(map)) => map
                .read()
                .keys()
                .filter_map(|k| k.0.as_str().map(Arc::from))
                .collect(),
            _ => Vec::new(),
        })
    }
}

struct ListAdapter;

impl RuntimeAdapter for ListAdapter {
    fn name(&self) -> &str {
        "List"
    }

    fn property(&self, _cx: &Machine, _target: &Value, name: &str) -> Result<Value, Fault> {
        Err(Fault::PropertyNotFound(name.to_string()))
    }

    fn index(&self, _cx: &Machine, target: &Value, key: &Value) -> Result<Value, Fault> {
        let index = key
            .as_i64()
            .ok_or_else(|| Fault::class_cast("Integer", key.class_name().as_ref()))?;
        let Value::Object(Object::List(list)) = target else {
            return Err(Fault::class_cast("List", target.class_name().as_ref()));
        };
        let items = list.read();
        usize::try_from(index)
            .ok()
            .and_then(|at| items.get(at).cloned())
            .ok_or(Fault::IndexOutOfBounds {
                index,
                length: items.len(),
            })
    }

    fn iterate(&self, _cx: &Machine, target: &Value) -> Result<Vec<Value>, Fault> {
        Ok(target.as_list().unwrap_or_default())
    }
}

/// Drives the accessors generated for a struct unit
struct StructAdapter {
    class: Arc<LoadedClass>,
}

impl StructAdapter {
    fn call(&self, cx: &Machine, method: &str, args: Vec<Value>) -> Result<Value, Fault> {
        let body = self.class.method(method).ok_or_else(|| {
            Fault::failed(format!("struct {} has no {} accessor", self.class.name, method))
        })?;
        cx.invoke(body, args)
    }
}

impl RuntimeAdapter for StructAdapter {
    fn name(&self) -> &str {
        &self.class.name
    }

    fn property(&self, cx: &Machine, target: &Value, name: &str) -> Result<Value, Fault> {
        self.call(cx, "get", vec![target.clone(), Value::string(name)])
    }

    fn index(&self, cx: &Machine, target: &Value, key: &Value) -> Result<Value, Fault> {
        match key.as_str() {
            Some(name) => self.property(cx, target, name),
            None => Err(Fault::class_cast("String", key.class_name().as_ref())),
        }
    }

    fn field_names(&self, cx: &Machine, target: &Value) -> Result<Vec<Arc<str>>, Fault> {
        let names = self.call(cx, "field_names", vec![target.clone()])?;
        Ok(names
            .as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_str().map(Arc::from))
            .collect())
    }
}

struct HostAdapter {
    class: Arc<str>,
}

impl RuntimeAdapter for HostAdapter {
    fn name(&self) -> &str {
        &self.class
    }

    fn property(&self, _cx: &Machine, target: &Value, name: &str) -> Result<Value, Fault> {
        match target {
            Value::Object(Object::Host(host)) => host
                .property(name)
                .ok_or_else(|| Fault::PropertyNotFound(name.to_string())),
            other => Err(Fault::class_cast(self.class.as_ref(), other.class_name().as_ref())),
        }
    }

    fn field_names(&self, _cx: &Machine, target: &Value) -> Result<Vec<Arc<str>>, Fault> {
        Ok(match target {
            Value::Object(Object::Host(host)) => host.property_names(),
            _ => Vec::new(),
        })
    }
}

/// Values without properties: boxes, strings, timestamps, ...
struct ScalarAdapter {
    class: Arc<str>,
}

impl RuntimeAdapter for ScalarAdapter {
    fn name(&self) -> &str {
        &self.class
    }

    fn property(&self, _cx: &Machine, _target: &Value, name: &str) -> Result<Value, Fault> {
        Err(Fault::PropertyNotFound(name.to_string()))
    }
}

// =============================================================================
// Linker
// =============================================================================

/// Per-program memo of runtime adapters keyed by concrete type
#[derive(Default)]
pub struct DynamicLinker {
    adapters: DashMap<TypeTag, Arc<dyn RuntimeAdapter>>,
    generation: Mutex<()>,
    generated: AtomicUsize,
}

impl DynamicLinker {
    /// Adapter for `tag`, built on first request
    pub fn resolve(&self, cx: &Machine, tag: &TypeTag) -> Result<Arc<dyn RuntimeAdapter>, Fault> {
        if let Some(adapter) = self.adapters.get(tag) {
            return Ok(adapter.value().clone());
        }
        let _guard = self.generation.lock();
        if let Some(adapter) = self.adapters.get(tag) {
            return Ok(adapter.value().clone());
        }
        let adapter = self.generate(cx, tag)?;
        self.adapters.insert(tag.clone(), adapter.clone());
        let count = self.generated.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(tag = ?tag, adapter = adapter.name(), count, "generated runtime adapter");
        Ok(adapter)
    }

    /// Number of adapters built so far
    pub fn generated_count(&self) -> usize {
        self.generated.load(Ordering::Acquire)
    }

    fn generate(&self, cx: &Machine, tag: &TypeTag) -> Result<Arc<dyn RuntimeAdapter>, Fault> {
        Ok(match tag {
            TypeTag::Record => Arc::new(RecordAdapter),
            TypeTag::Map => Arc::new(MapAdapter),
            TypeTag::List => Arc::new(ListAdapter),
            TypeTag::Struct(name) => {
                let class = cx
                    .loader()
                    .class(name)
                    .ok_or_else(|| Fault::failed(format!("struct {} is not loaded", name)))?;
                Arc::new(StructAdapter { class })
            }
            TypeTag::Host(name) => Arc::new(HostAdapter {
                class: name.clone(),
            }),
            TypeTag::Boxed(name) => Arc::new(ScalarAdapter {
                class: Arc::from(*name),
            }),
            TypeTag::Enum(name) => Arc::new(ScalarAdapter {
                class: name.clone(),
            }),
            other => Arc::new(ScalarAdapter {
                class: Arc::from(format!("{:?}", other)),
            }),
        })
    }
}

impl fmt::Debug for DynamicLinker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicLinker")
            .field("adapters", &self.adapters.len())
            .field("generated", &self.generated_count())
            .finish()
    }
}

// =============================================================================
// Call sites
// =============================================================================

type CacheEntry = (TypeTag, Arc<dyn RuntimeAdapter>);

/// A dynamic operation with a one-entry inline cache
pub struct CallSite {
    op: DynOp,
    cache: RwLock<Option<CacheEntry>>,
}

impl CallSite {
    pub fn new(op: DynOp) -> Self {
        Self {
            op,
            cache: RwLock::new(None),
        }
    }

    pub fn op(&self) -> &DynOp {
        &self.op
    }

    fn adapter(&self, cx: &Machine, target: &Value) -> Result<Arc<dyn RuntimeAdapter>, Fault> {
        let tag = match target.type_tag() {
            Some(tag) => tag,
            None if target.is_null() => return Err(Fault::NullPointer),
            None => return Err(Fault::unsupported(format!("dynamic {}", target.class_name()))),
        };
        if let Some((cached, adapter)) = self.cache.read().as_ref() {
            if *cached == tag {
                return Ok(adapter.clone());
            }
        }
        let adapter = cx.loader().linker().resolve(cx, &tag)?;
        *self.cache.write() = Some((tag, adapter.clone()));
        Ok(adapter)
    }

    pub(crate) fn invoke(&self, cx: &Machine, stack: &mut Stack) -> Result<(), Fault> {
        match &self.op {
            DynOp::GetProperty(name) => {
                let target = pop_ref(stack)?;
                let value = self.adapter(cx, &target)?.property(cx, &target, name)?;
                push(stack, value);
            }
            DynOp::Index => {
                let key = pop(stack)?;
                let target = pop_ref(stack)?;
                let value = self.adapter(cx, &target)?.index(cx, &target, &key)?;
                push(stack, value);
            }
            DynOp::Iterate => {
                let target = pop_ref(stack)?;
                let items = self.adapter(cx, &target)?.iterate(cx, &target)?;
                stack.push(Value::list(items));
            }
            DynOp::MergeFields => {
                let source = pop(stack)?;
                let writer = pop_ref(stack)?;
                let record = writer
                    .as_record()
                    .ok_or_else(|| Fault::class_cast("Record", writer.class_name().as_ref()))?;
                if !source.is_null() {
                    self.adapter(cx, &source)?.merge_fields(cx, &source, record)?;
                }
            }
            DynOp::FieldNames => {
                let target = pop_ref(stack)?;
                let names = self.adapter(cx, &target)?.field_names(cx, &target)?;
                stack.push(Value::list(names.into_iter().map(|n| Value::string(&*n)).collect()));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallSite({:?})", self.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ClassLoader, Record};

    #[test]
    fn test_adapter_generated_once_per_type() {
        let machine = Machine::new(ClassLoader::new());
        let site = CallSite::new(DynOp::GetProperty(Arc::from("a")));
        let record = Value::Object(Object::Record(Record::from_pairs([("a", Value::boxed_int(1))])));
        for _ in 0..5 {
            let mut stack: Stack = Stack::new();
            stack.push(record.clone());
            site.invoke(&machine, &mut stack).unwrap();
            assert_eq!(stack[0], Value::boxed_int(1));
        }
        assert_eq!(machine.loader().linker().generated_count(), 1);

        let map = Value::map(vec![(Value::string("a"), Value::boxed_int(2))]);
        let mut stack: Stack = Stack::new();
        stack.push(map);
        site.invoke(&machine, &mut stack).unwrap();
        assert_eq!(stack[0], Value::boxed_int(2));
        assert_eq!(machine.loader().linker().generated_count(), 2);

        // a second site reuses the memoized adapters
        let other = CallSite::new(DynOp::FieldNames);
        let mut stack: Stack = Stack::new();
        stack.push(record);
        other.invoke(&machine, &mut stack).unwrap();
        assert_eq!(machine.loader().linker().generated_count(), 2);
    }

    #[test]
    fn test_adapter_generated_once_across_threads() {
        let loader = ClassLoader::new();
        let site = Arc::new(CallSite::new(DynOp::GetProperty(Arc::from("id"))));
        std::thread::scope(|scope| {
            for t in 0..8 {
                let (loader, site) = (loader.clone(), site.clone());
                scope.spawn(move || {
                    let machine = Machine::new(loader);
                    for i in 0..25 {
                        let id = Value::boxed_int(t * 100 + i);
                        let row = Value::map(vec![(Value::string("id"), id)]);
                        let mut stack: Stack = Stack::new();
                        stack.push(row);
                        site.invoke(&machine, &mut stack).unwrap();
                        assert_eq!(stack[0], Value::boxed_int(t * 100 + i));
                    }
                });
            }
        });
        assert_eq!(loader.linker().generated_count(), 1);
    }

    #[test]
    fn test_list_index() {
        let machine = Machine::new(ClassLoader::new());
        let site = CallSite::new(DynOp::Index);
        let list = Value::list(vec![Value::boxed_int(4), Value::boxed_int(5)]);
        let index = |key: Value| {
            let mut stack: Stack = Stack::new();
            stack.push(list.clone());
            stack.push(key);
            site.invoke(&machine, &mut stack).map(|_| stack[0].clone())
        };
        assert_eq!(index(Value::Int(1)), Ok(Value::boxed_int(5)));
        assert_eq!(index(Value::boxed_long(0)), Ok(Value::boxed_int(4)));
        assert_eq!(
            index(Value::Int(2)),
            Err(Fault::IndexOutOfBounds { index: 2, length: 2 })
        );
        assert_eq!(
            index(Value::Int(-1)),
            Err(Fault::IndexOutOfBounds { index: -1, length: 2 })
        );
    }

    #[test]
    fn test_null_receiver() {
        let machine = Machine::new(ClassLoader::new());
        let site = CallSite::new(DynOp::Iterate);
        let mut stack: Stack = Stack::new();
        stack.push(Value::Null);
        assert_eq!(site.invoke(&machine, &mut stack), Err(Fault::NullPointer));
    }

    #[test]
    fn test_merge_fields_skips_nulls() {
        let machine = Machine::new(ClassLoader::new());
        let site = CallSite::new(DynOp::MergeFields);
        let target = Record::new();
        let source = Record::from_pairs([("a", Value::boxed_int(1)), ("b", Value::Null)]);
        let mut stack: Stack = Stack::new();
        stack.push(Value::Object(Object::Record(target.clone())));
        stack.push(Value::Object(Object::Record(source)));
        site.invoke(&machine, &mut stack).unwrap();
        assert!(stack.is_empty());
        assert_eq!(target.names().len(), 1);
    }
}
