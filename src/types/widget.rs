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

//! TypeWidget - the type of every compiled value
//!
//! A widget is a shared, immutable [`Shape`] plus a nullability flag. The
//! shape is a closed set of variants; optional capabilities (property access,
//! indexing, iteration, ...) are looked up per variant and come back as
//! `Option<Adapter>` so callers can report typed absence instead of failing
//! half way through code generation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::adapters::{
    IndexAdapter, IterateAdapter, PromiseAdapter, PropertyAdapter, ResultAdapter,
    UnificationAdapter,
};
use super::kind::{CoreKind, Prim};
use super::repr::Repr;

/// Structure of a type, independent of nullability
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Void,
    Primitive(Prim),
    Boxed(Prim),
    String,
    Bytes,
    Timestamp,
    Any,
    /// Native array; elements are stored boxed
    Array(TypeWidget),
    List(TypeWidget),
    Map(TypeWidget, TypeWidget),
    /// Generated closed struct
    Struct(Arc<StructShape>),
    /// Open record backed by a map-like carrier
    Record,
    Enum(Arc<EnumShape>),
    Promise(TypeWidget),
    Result(TypeWidget),
    /// Host class exposing reflective properties
    Host(Arc<ClassShape>),
    Timeout,
    Throwable,
}

/// Field of a closed struct
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldShape {
    pub name: Arc<str>,
    pub ty: TypeWidget,
}

/// A generated nominal struct type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructShape {
    pub name: Arc<str>,
    pub fields: Vec<FieldShape>,
}

impl StructShape {
    /// Case-insensitive field lookup
    pub fn field(&self, name: &str) -> Option<(usize, &FieldShape)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumShape {
    pub name: Arc<str>,
    pub variants: Vec<Arc<str>>,
}

/// A host class described by its readable properties
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassShape {
    pub name: Arc<str>,
    pub properties: Vec<(Arc<str>, TypeWidget)>,
    pub comparable: bool,
}

impl ClassShape {
    pub fn property(&self, name: &str) -> Option<&TypeWidget> {
        self.properties
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, t)| t)
    }
}

#[derive(Debug)]
struct Inner {
    shape: Shape,
    repr: Repr,
}

/// The type of a compiled value
#[derive(Clone)]
pub struct TypeWidget {
    inner: Arc<Inner>,
    nullable: bool,
}

impl TypeWidget {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a widget; primitives and void are never nullable
    pub fn new(shape: Shape, nullable: bool) -> Self {
        let nullable = nullable && !matches!(shape, Shape::Primitive(_) | Shape::Void);
        let repr = repr_of(&shape);
        TypeWidget {
            inner: Arc::new(Inner { shape, repr }),
            nullable,
        }
    }

    pub fn void() -> Self {
        TypeWidget::new(Shape::Void, false)
    }

    pub fn primitive(prim: Prim) -> Self {
        TypeWidget::new(Shape::Primitive(prim), false)
    }

    pub fn boolean() -> Self {
        TypeWidget::primitive(Prim::Boolean)
    }

    pub fn int32() -> Self {
        TypeWidget::primitive(Prim::Int32)
    }

    pub fn int64() -> Self {
        TypeWidget::primitive(Prim::Int64)
    }

    pub fn float64() -> Self {
        TypeWidget::primitive(Prim::Float64)
    }

    pub fn boxed_of(prim: Prim) -> Self {
        TypeWidget::new(Shape::Boxed(prim), true)
    }

    pub fn string() -> Self {
        TypeWidget::new(Shape::String, true)
    }

    pub fn bytes() -> Self {
        TypeWidget::new(Shape::Bytes, true)
    }

    pub fn timestamp() -> Self {
        TypeWidget::new(Shape::Timestamp, true)
    }

    pub fn any() -> Self {
        TypeWidget::new(Shape::Any, true)
    }

    /// Array of `elem`; elements are held boxed
    pub fn array(elem: TypeWidget) -> Self {
        TypeWidget::new(Shape::Array(elem.boxed()), true)
    }

    /// List of `elem`; elements are held boxed
    pub fn list(elem: TypeWidget) -> Self {
        TypeWidget::new(Shape::List(elem.boxed()), true)
    }

    pub fn map(key: TypeWidget, value: TypeWidget) -> Self {
        TypeWidget::new(Shape::Map(key.boxed(), value.boxed()), true)
    }

    pub fn record() -> Self {
        TypeWidget::new(Shape::Record, true)
    }

    pub fn structure(shape: Arc<StructShape>) -> Self {
        TypeWidget::new(Shape::Struct(shape), true)
    }

    pub fn enumeration(shape: Arc<EnumShape>) -> Self {
        TypeWidget::new(Shape::Enum(shape), true)
    }

    pub fn promise(result: TypeWidget) -> Self {
        TypeWidget::new(Shape::Promise(result.boxed()), true)
    }

    pub fn result(value: TypeWidget) -> Self {
        TypeWidget::new(Shape::Result(value.boxed()), true)
    }

    pub fn host(class: Arc<ClassShape>) -> Self {
        TypeWidget::new(Shape::Host(class), true)
    }

    pub fn timeout() -> Self {
        TypeWidget::new(Shape::Timeout, false)
    }

    pub fn throwable() -> Self {
        TypeWidget::new(Shape::Throwable, false)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    pub fn repr(&self) -> &Repr {
        &self.inner.repr
    }

    pub fn width(&self) -> u8 {
        self.inner.repr.width()
    }

    pub fn kind(&self) -> CoreKind {
        match self.shape() {
            Shape::Void => CoreKind::Void,
            Shape::Primitive(p) | Shape::Boxed(p) => p.kind(),
            Shape::String => CoreKind::String,
            Shape::Bytes => CoreKind::Bytes,
            Shape::Timestamp => CoreKind::Timestamp,
            Shape::Any => CoreKind::Any,
            Shape::Array(_) => CoreKind::Array,
            Shape::List(_) => CoreKind::Sequence,
            Shape::Map(_, _) => CoreKind::Map,
            Shape::Struct(_) | Shape::Record => CoreKind::Struct,
            Shape::Enum(_) => CoreKind::Enum,
            Shape::Promise(_) => CoreKind::Promise,
            Shape::Result(_) => CoreKind::Result,
            Shape::Host(_) | Shape::Timeout | Shape::Throwable => CoreKind::Object,
        }
    }

    /// The primitive kind behind a primitive or boxed widget
    pub fn prim(&self) -> Option<Prim> {
        match self.shape() {
            Shape::Primitive(p) | Shape::Boxed(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.shape(), Shape::Primitive(_))
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_void(&self) -> bool {
        matches!(self.shape(), Shape::Void)
    }

    pub fn is_any(&self) -> bool {
        matches!(self.shape(), Shape::Any)
    }

    /// Same shape allocation and nullability
    pub fn same(&self, other: &TypeWidget) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) && self.nullable == other.nullable
    }

    // =========================================================================
    // Nullability and boxing
    // =========================================================================

    /// Nullable view; primitives are returned unchanged
    pub fn nullable(&self) -> TypeWidget {
        if self.nullable || self.is_primitive() || self.is_void() {
            return self.clone();
        }
        TypeWidget {
            inner: self.inner.clone(),
            nullable: true,
        }
    }

    pub fn not_nullable(&self) -> TypeWidget {
        if !self.nullable {
            return self.clone();
        }
        TypeWidget {
            inner: self.inner.clone(),
            nullable: false,
        }
    }

    /// Reference form of a primitive; references are returned unchanged
    pub fn boxed(&self) -> TypeWidget {
        match self.shape() {
            Shape::Primitive(p) => TypeWidget::boxed_of(*p),
            _ => self.clone(),
        }
    }

    /// Primitive form of a boxed primitive; everything else is unchanged
    pub fn unboxed(&self) -> TypeWidget {
        match self.shape() {
            Shape::Boxed(p) => TypeWidget::primitive(*p),
            _ => self.clone(),
        }
    }

    // =========================================================================
    // Capabilities
    // =========================================================================

    pub fn property_adapter(&self) -> Option<PropertyAdapter> {
        PropertyAdapter::of(self)
    }

    pub fn index_adapter(&self) -> Option<IndexAdapter> {
        IndexAdapter::of(self)
    }

    pub fn iterate_adapter(&self) -> Option<IterateAdapter> {
        IterateAdapter::of(self)
    }

    pub fn promise_adapter(&self) -> Option<PromiseAdapter> {
        match self.shape() {
            Shape::Promise(result) => Some(PromiseAdapter::new(result.clone())),
            _ => None,
        }
    }

    pub fn result_adapter(&self) -> Option<ResultAdapter> {
        match self.shape() {
            Shape::Result(value) => Some(ResultAdapter::new(value.clone())),
            _ => None,
        }
    }

    pub fn unification_adapter(&self) -> Option<UnificationAdapter> {
        UnificationAdapter::of(self)
    }

    /// Whether values of this type have a static ordering
    pub fn is_comparable(&self) -> bool {
        match self.shape() {
            Shape::Primitive(_)
            | Shape::Boxed(_)
            | Shape::String
            | Shape::Bytes
            | Shape::Timestamp
            | Shape::Enum(_) => true,
            Shape::Host(class) => class.comparable,
            _ => false,
        }
    }

    pub fn has_properties(&self) -> bool {
        self.property_adapter().is_some()
    }

    pub fn is_iterable(&self) -> bool {
        self.iterate_adapter().is_some()
    }

    pub fn is_promise(&self) -> bool {
        matches!(self.shape(), Shape::Promise(_))
    }

    pub fn is_result(&self) -> bool {
        matches!(self.shape(), Shape::Result(_))
    }
}

fn repr_of(shape: &Shape) -> Repr {
    match shape {
        Shape::Void => Repr::Void,
        Shape::Primitive(p) => p.repr(),
        Shape::Boxed(p) => Repr::reference(p.box_class()),
        Shape::String => Repr::reference("String"),
        Shape::Bytes => Repr::reference("Bytes"),
        Shape::Timestamp => Repr::reference("Timestamp"),
        Shape::Any => Repr::object(),
        Shape::Array(elem) => Repr::Ref(Arc::from(format!("[{}", elem.repr().descriptor()))),
        Shape::List(_) => Repr::reference("List"),
        Shape::Map(_, _) => Repr::reference("Map"),
        Shape::Struct(s) => Repr::Ref(s.name.clone()),
        Shape::Record => Repr::reference("Record"),
        Shape::Enum(e) => Repr::Ref(e.name.clone()),
        Shape::Promise(_) => Repr::reference("Promise"),
        Shape::Result(_) => Repr::reference("Outcome"),
        Shape::Host(c) => Repr::Ref(c.name.clone()),
        Shape::Timeout => Repr::reference("Timeout"),
        Shape::Throwable => Repr::reference("Fault"),
    }
}

impl PartialEq for TypeWidget {
    fn eq(&self, other: &Self) -> bool {
        self.nullable == other.nullable
            && (Arc::ptr_eq(&self.inner, &other.inner) || self.inner.shape == other.inner.shape)
    }
}

impl Eq for TypeWidget {}

impl Hash for TypeWidget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.shape.hash(state);
        self.nullable.hash(state);
    }
}

impl fmt::Display for TypeWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape() {
            Shape::Void => write!(f, "void")?,
            Shape::Primitive(p) => write!(f, "{}", p)?,
            Shape::Boxed(p) => write!(f, "{}", p.box_class())?,
            Shape::String => write!(f, "string")?,
            Shape::Bytes => write!(f, "bytes")?,
            Shape::Timestamp => write!(f, "timestamp")?,
            Shape::Any => write!(f, "any")?,
            Shape::Array(e) => write!(f, "array<{}>", e)?,
            Shape::List(e) => write!(f, "list<{}>", e)?,
            Shape::Map(k, v) => write!(f, "map<{}, {}>", k, v)?,
            Shape::Struct(s) => write!(f, "{}", s.name)?,
            Shape::Record => write!(f, "record")?,
            Shape::Enum(e) => write!(f, "{}", e.name)?,
            Shape::Promise(r) => write!(f, "promise<{}>", r)?,
            Shape::Result(r) => write!(f, "result<{}>", r)?,
            Shape::Host(c) => write!(f, "{}", c.name)?,
            Shape::Timeout => write!(f, "timeout")?,
            Shape::Throwable => write!(f, "throwable")?,
        }
        if self.nullable && !self.is_any() {
            write!(f, "?")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeWidget({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_unbox_round_trip() {
        for p in Prim::ALL {
            let prim = TypeWidget::primitive(p);
            let boxed = TypeWidget::boxed_of(p);
            assert_eq!(prim.boxed().unboxed(), prim);
            assert_eq!(boxed.unboxed().boxed(), boxed);
        }
    }

    #[test]
    fn test_nullable_wrappers() {
        let s = TypeWidget::string();
        assert_eq!(s.not_nullable().nullable(), s);
        let t = TypeWidget::string().not_nullable();
        assert_eq!(t.nullable().not_nullable(), t);

        // primitives never become nullable
        let i = TypeWidget::int32();
        assert_eq!(i.nullable(), i);
        assert!(!i.nullable().is_nullable());
    }

    #[test]
    fn test_representations() {
        assert_eq!(TypeWidget::int64().repr(), &Repr::Long);
        assert_eq!(TypeWidget::any().repr(), &Repr::object());
        assert_eq!(
            TypeWidget::array(TypeWidget::int32()).repr(),
            &Repr::reference("[LInteger;")
        );
        assert_eq!(
            TypeWidget::list(TypeWidget::int32()).repr(),
            TypeWidget::list(TypeWidget::string()).repr()
        );
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(
            TypeWidget::list(TypeWidget::int32()),
            TypeWidget::list(TypeWidget::boxed_of(Prim::Int32))
        );
        assert_ne!(TypeWidget::string(), TypeWidget::string().not_nullable());
        assert_eq!(TypeWidget::list(TypeWidget::int64()).kind(), CoreKind::Sequence);
        assert_eq!(TypeWidget::record().kind(), CoreKind::Struct);
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeWidget::int32().to_string(), "int32");
        assert_eq!(TypeWidget::string().to_string(), "string?");
        assert_eq!(
            TypeWidget::map(TypeWidget::string(), TypeWidget::int32())
                .not_nullable()
                .to_string(),
            "map<string?, Integer?>"
        );
    }
}
