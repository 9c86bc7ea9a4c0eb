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

//! Runtime values manipulated by generated code
//!
//! The machine works on *slots*. Every [`Value`] occupies one slot except
//! `Long` and `Double`, which occupy two: the value itself followed by a
//! [`Value::Top`] filler, the same way category-2 values behave on the JVM.
//! Reference values are wrapped in [`Object`]; `Value::Null` is the null
//! reference.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::runtime::{BoundMethod, Fault, HostObject, Instance, Outcome, Promise, Record, Timeout};

/// Shared mutable list storage
pub type ListRef = Arc<RwLock<Vec<Value>>>;

/// Shared mutable map storage, insertion ordered
pub type MapRef = Arc<RwLock<IndexMap<ValueKey, Value, ahash::RandomState>>>;

/// A slot-sized runtime value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The null reference
    #[default]
    Null,
    /// Upper half of a two-slot value
    Top,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object(Object),
}

/// A boxed primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boxed {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

/// Heap values
#[derive(Clone)]
pub enum Object {
    Boxed(Boxed),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    Timestamp(DateTime<Utc>),
    Enum(EnumValue),
    List(ListRef),
    Map(MapRef),
    Record(Record),
    Instance(Arc<Instance>),
    Promise(Promise),
    Outcome(Arc<Outcome>),
    Timeout(Timeout),
    Function(Arc<BoundMethod>),
    Host(Arc<dyn HostObject>),
    Throwable(Arc<Fault>),
}

/// A member of a host enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_name: Arc<str>,
    pub name: Arc<str>,
    pub ordinal: u32,
}

/// Concrete runtime type of a reference, used to key dynamic adapters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Boxed(&'static str),
    String,
    Bytes,
    Timestamp,
    Enum(Arc<str>),
    List,
    Map,
    Record,
    Struct(Arc<str>),
    Promise,
    Outcome,
    Timeout,
    Function,
    Host(Arc<str>),
    Throwable,
}

impl Boxed {
    /// Library class name of the box
    pub fn class_name(&self) -> &'static str {
        match self {
            Boxed::Boolean(_) => "Boolean",
            Boxed::Byte(_) => "Byte",
            Boxed::Short(_) => "Short",
            Boxed::Int(_) => "Integer",
            Boxed::Long(_) => "Long",
            Boxed::Float(_) => "Float",
            Boxed::Double(_) => "Double",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Boxed::Byte(v) => Some(v as i64),
            Boxed::Short(v) => Some(v as i64),
            Boxed::Int(v) => Some(v as i64),
            Boxed::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Boxed::Float(v) => Some(v as f64),
            Boxed::Double(v) => Some(v),
            Boxed::Boolean(_) => None,
            other => other.as_i64().map(|v| v as f64),
        }
    }

    fn is_integral(&self) -> bool {
        self.as_i64().is_some()
    }
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn string(value: impl AsRef<str>) -> Self {
        Value::Object(Object::String(Arc::from(value.as_ref())))
    }

    pub fn boxed(value: Boxed) -> Self {
        Value::Object(Object::Boxed(value))
    }

    pub fn boxed_int(value: i32) -> Self {
        Value::boxed(Boxed::Int(value))
    }

    pub fn boxed_long(value: i64) -> Self {
        Value::boxed(Boxed::Long(value))
    }

    pub fn boxed_double(value: f64) -> Self {
        Value::boxed(Boxed::Double(value))
    }

    pub fn boxed_bool(value: bool) -> Self {
        Value::boxed(Boxed::Boolean(value))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::Object(Object::List(Arc::new(RwLock::new(items))))
    }

    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let map = entries
            .into_iter()
            .map(|(k, v)| (ValueKey(k), v))
            .collect::<IndexMap<_, _, ahash::RandomState>>();
        Value::Object(Object::Map(Arc::new(RwLock::new(map))))
    }

    pub fn throwable(fault: Fault) -> Self {
        Value::Object(Object::Throwable(Arc::new(fault)))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Number of slots occupied by this value
    pub fn width(&self) -> usize {
        match self {
            Value::Long(_) | Value::Double(_) => 2,
            _ => 1,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Integral view over primitive and boxed integers
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            Value::Object(Object::Boxed(b)) => b.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Object(Object::Boxed(b)) => b.as_f64(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Int(v) => Some(*v != 0),
            Value::Object(Object::Boxed(Boxed::Boolean(b))) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Object(Object::String(s)) => Some(s),
            Value::Object(Object::Enum(e)) => Some(&e.name),
            _ => None,
        }
    }

    /// Snapshot of a list's elements
    pub fn as_list(&self) -> Option<Vec<Value>> {
        match self {
            Value::Object(Object::List(items)) => Some(items.read().clone()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Object(Object::Record(r)) => Some(r),
            _ => None,
        }
    }

    pub fn as_outcome(&self) -> Option<&Outcome> {
        match self {
            Value::Object(Object::Outcome(o)) => Some(o),
            _ => None,
        }
    }

    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            Value::Object(Object::Throwable(f)) => Some(f),
            _ => None,
        }
    }

    /// Class name used for checked casts and fault messages
    pub fn class_name(&self) -> Arc<str> {
        match self {
            Value::Null => Arc::from("null"),
            Value::Top => Arc::from("top"),
            Value::Int(_) => Arc::from("int"),
            Value::Long(_) => Arc::from("long"),
            Value::Float(_) => Arc::from("float"),
            Value::Double(_) => Arc::from("double"),
            Value::Object(o) => o.class_name(),
        }
    }

    /// Concrete type tag of a non-null reference
    pub fn type_tag(&self) -> Option<TypeTag> {
        self.as_object().map(Object::type_tag)
    }

    /// Value equality across numeric boxes, strings and containers
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.equals(b),
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(a), Some(b)) => a == b,
                _ => match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            },
        }
    }

    /// Ordering of two values, `None` when either lacks an ordering
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.compare(b),
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => None,
                },
            },
        }
    }
}

impl Object {
    pub fn class_name(&self) -> Arc<str> {
        match self {
            Object::Boxed(b) => Arc::from(b.class_name()),
            Object::String(_) => Arc::from("String"),
            Object::Bytes(_) => Arc::from("Bytes"),
            Object::Timestamp(_) => Arc::from("Timestamp"),
            Object::Enum(e) => e.type_name.clone(),
            Object::List(_) => Arc::from("List"),
            Object::Map(_) => Arc::from("Map"),
            Object::Record(_) => Arc::from("Record"),
            Object::Instance(i) => i.class_name(),
            Object::Promise(_) => Arc::from("Promise"),
            Object::Outcome(_) => Arc::from("Outcome"),
            Object::Timeout(_) => Arc::from("Timeout"),
            Object::Function(_) => Arc::from("Function"),
            Object::Host(h) => Arc::from(h.class_name()),
            Object::Throwable(_) => Arc::from("Fault"),
        }
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Object::Boxed(b) => TypeTag::Boxed(b.class_name()),
            Object::String(_) => TypeTag::String,
            Object::Bytes(_) => TypeTag::Bytes,
            Object::Timestamp(_) => TypeTag::Timestamp,
            Object::Enum(e) => TypeTag::Enum(e.type_name.clone()),
            Object::List(_) => TypeTag::List,
            Object::Map(_) => TypeTag::Map,
            Object::Record(_) => TypeTag::Record,
            Object::Instance(i) => TypeTag::Struct(i.class_name()),
            Object::Promise(_) => TypeTag::Promise,
            Object::Outcome(_) => TypeTag::Outcome,
            Object::Timeout(_) => TypeTag::Timeout,
            Object::Function(_) => TypeTag::Function,
            Object::Host(h) => TypeTag::Host(Arc::from(h.class_name())),
            Object::Throwable(_) => TypeTag::Throwable,
        }
    }

    /// Checked-cast compatibility with a class name
    ///
    /// `Object` accepts everything, `Number` accepts numeric boxes and names
    /// starting with `[` (native arrays) accept lists.
    pub fn is_instance_of(&self, class: &str) -> bool {
        match class {
            "Object" => true,
            "Number" => matches!(self, Object::Boxed(b) if !matches!(b, Boxed::Boolean(_))),
            name if name.starts_with('[') => matches!(self, Object::List(_)),
            name => *self.class_name() == *name,
        }
    }

    fn equals(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Boxed(a), Object::Boxed(b)) => match (a, b) {
                (Boxed::Boolean(x), Boxed::Boolean(y)) => x == y,
                _ if a.is_integral() && b.is_integral() => a.as_i64() == b.as_i64(),
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                },
            },
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Bytes(a), Object::Bytes(b)) => a == b,
            (Object::Timestamp(a), Object::Timestamp(b)) => a == b,
            (Object::Enum(a), Object::Enum(b)) => a == b,
            (Object::List(a), Object::List(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.read(), b.read());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Object::Map(a), Object::Map(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.read(), b.read());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|w| v.equals(w)).unwrap_or(false))
            }
            (Object::Record(a), Object::Record(b)) => a.equals(b),
            (Object::Instance(a), Object::Instance(b)) => Arc::ptr_eq(a, b),
            (Object::Host(a), Object::Host(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn compare(&self, other: &Object) -> Option<Ordering> {
        match (self, other) {
            (Object::Boxed(Boxed::Boolean(a)), Object::Boxed(Boxed::Boolean(b))) => {
                Some(a.cmp(b))
            }
            (Object::Boxed(a), Object::Boxed(b)) => {
                if a.is_integral() && b.is_integral() {
                    Some(a.as_i64()?.cmp(&b.as_i64()?))
                } else {
                    a.as_f64()?.partial_cmp(&b.as_f64()?)
                }
            }
            (Object::String(a), Object::String(b)) => Some(a.cmp(b)),
            (Object::Bytes(a), Object::Bytes(b)) => Some(a.cmp(b)),
            (Object::Timestamp(a), Object::Timestamp(b)) => Some(a.cmp(b)),
            (Object::Enum(a), Object::Enum(b)) if a.type_name == b.type_name => {
                Some(a.ordinal.cmp(&b.ordinal))
            }
            (Object::Host(a), Object::Host(b)) => a.compare(b.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Boxed(b) => write!(f, "{:?}", b),
            Object::String(s) => write!(f, "{:?}", s),
            Object::Bytes(b) => write!(f, "Bytes({})", b.len()),
            Object::Timestamp(t) => write!(f, "Timestamp({})", t.to_rfc3339()),
            Object::Enum(e) => write!(f, "{}.{}", e.type_name, e.name),
            Object::List(items) => f.debug_list().entries(items.read().iter()).finish(),
            Object::Map(map) => f
                .debug_map()
                .entries(map.read().iter().map(|(k, v)| (&k.0, v)))
                .finish(),
            Object::Record(r) => write!(f, "{:?}", r),
            Object::Instance(i) => write!(f, "{:?}", i),
            Object::Promise(_) => write!(f, "Promise"),
            Object::Outcome(o) => write!(f, "{:?}", o),
            Object::Timeout(t) => write!(f, "{:?}", t),
            Object::Function(m) => write!(f, "Function({})", m.name()),
            Object::Host(h) => write!(f, "{:?}", h),
            Object::Throwable(fault) => write!(f, "Throwable({})", fault),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Top => write!(f, "<top>"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}L", v),
            Value::Float(v) => write!(f, "{}f", v),
            Value::Double(v) => write!(f, "{}d", v),
            Value::Object(Object::String(s)) => write!(f, "{:?}", s),
            Value::Object(o) => write!(f, "{:?}", o),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

/// Hash key wrapper giving map keys value semantics
#[derive(Debug, Clone)]
pub struct ValueKey(pub Value);

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals(&other.0)
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let value = &self.0;
        if let Some(i) = value.as_i64() {
            0u8.hash(state);
            i.hash(state);
            return;
        }
        match value {
            Value::Null | Value::Top => 1u8.hash(state),
            Value::Float(_) | Value::Double(_) => hash_f64(value.as_f64().unwrap_or_default(), state),
            Value::Object(o) => match o {
                Object::Boxed(Boxed::Boolean(b)) => {
                    3u8.hash(state);
                    b.hash(state);
                }
                Object::Boxed(b) => hash_f64(b.as_f64().unwrap_or_default(), state),
                Object::String(s) => {
                    4u8.hash(state);
                    s.hash(state);
                }
                Object::Enum(e) => {
                    5u8.hash(state);
                    e.hash(state);
                }
                other => {
                    6u8.hash(state);
                    other.class_name().hash(state);
                }
            },
            Value::Int(_) | Value::Long(_) => unreachable!("integral handled above"),
        }
    }
}

// Integral floats hash like the integer they equal
fn hash_f64<H: Hasher>(v: f64, state: &mut H) {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        0u8.hash(state);
        (v as i64).hash(state);
    } else {
        2u8.hash(state);
        v.to_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_width() {
        assert_eq!(Value::Int(1).width(), 1);
        assert_eq!(Value::Long(1).width(), 2);
        assert_eq!(Value::Double(1.0).width(), 2);
        assert_eq!(Value::string("x").width(), 1);
    }

    #[test]
    fn test_equals_across_boxes() {
        assert!(Value::boxed_int(7).equals(&Value::boxed_long(7)));
        assert!(Value::Int(3).equals(&Value::boxed_int(3)));
        assert!(!Value::boxed_int(3).equals(&Value::string("3")));
        assert!(Value::list(vec![Value::boxed_int(1)])
            .equals(&Value::list(vec![Value::boxed_long(1)])));
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            Value::string("a").compare(&Value::string("b")),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::boxed_double(2.5).compare(&Value::boxed_int(2)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::list(vec![]).compare(&Value::list(vec![])), None);
    }

    #[test]
    fn test_instance_of() {
        let v = Value::boxed_int(1);
        let o = v.as_object().unwrap();
        assert!(o.is_instance_of("Object"));
        assert!(o.is_instance_of("Number"));
        assert!(o.is_instance_of("Integer"));
        assert!(!o.is_instance_of("Long"));
        assert!(Value::list(vec![])
            .as_object()
            .unwrap()
            .is_instance_of("[I"));
    }

    #[test]
    fn test_map_keys() {
        let map = Value::map(vec![
            (Value::string("a"), Value::boxed_int(1)),
            (Value::boxed_int(2), Value::boxed_int(3)),
        ]);
        let Value::Object(Object::Map(m)) = map else {
            panic!("expected map")
        };
        let m = m.read();
        assert!(m.contains_key(&ValueKey(Value::string("a"))));
        assert!(m.contains_key(&ValueKey(Value::boxed_long(2))));
    }
}
