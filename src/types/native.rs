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

//! Native type descriptors and the adapting chain
//!
//! Host values are described by [`NativeType`]. Scalars resolve directly;
//! everything else runs through a fixed chain of [`NativeAdapter`]s where
//! the first adapter that recognizes the descriptor wins.

use std::fmt;
use std::sync::Arc;

use crate::core::{Error, Result};

use super::kind::Prim;
use super::registry::TypeRegistry;
use super::widget::{ClassShape, EnumShape, TypeWidget};

/// Descriptor of a host type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeType {
    Void,
    Primitive(Prim),
    Boxed(Prim),
    String,
    Bytes,
    Timestamp,
    /// The root object class; resolves to `any`
    Object,
    Timeout,
    Array(Box<NativeType>),
    List(Box<NativeType>),
    Map(Box<NativeType>, Box<NativeType>),
    Enum {
        name: Arc<str>,
        variants: Vec<Arc<str>>,
    },
    Future(Box<NativeType>),
    Record,
    /// Wrapper that yields a value of the inner type on demand
    Provider(Box<NativeType>),
    /// Plain host class with readable properties
    Class {
        name: Arc<str>,
        properties: Vec<(Arc<str>, NativeType)>,
        comparable: bool,
    },
    /// A class nothing in the chain understands
    Opaque(Arc<str>),
}

impl NativeType {
    pub fn list(elem: NativeType) -> Self {
        NativeType::List(Box::new(elem))
    }

    pub fn array(elem: NativeType) -> Self {
        NativeType::Array(Box::new(elem))
    }

    pub fn map(key: NativeType, value: NativeType) -> Self {
        NativeType::Map(Box::new(key), Box::new(value))
    }

    pub fn future(inner: NativeType) -> Self {
        NativeType::Future(Box::new(inner))
    }

    pub fn class(name: &str, properties: Vec<(&str, NativeType)>) -> Self {
        NativeType::Class {
            name: Arc::from(name),
            properties: properties
                .into_iter()
                .map(|(n, t)| (Arc::from(n), t))
                .collect(),
            comparable: false,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Class { name, .. } | NativeType::Opaque(name) => write!(f, "{}", name),
            NativeType::Enum { name, .. } => write!(f, "enum {}", name),
            NativeType::Array(e) => write!(f, "{}[]", e),
            NativeType::List(e) => write!(f, "List<{}>", e),
            NativeType::Map(k, v) => write!(f, "Map<{}, {}>", k, v),
            NativeType::Future(e) => write!(f, "Future<{}>", e),
            NativeType::Provider(e) => write!(f, "Provider<{}>", e),
            other => write!(f, "{:?}", other),
        }
    }
}

/// One strategy in the adapting chain
pub trait NativeAdapter: Sync {
    fn name(&self) -> &'static str;

    /// `None` when the descriptor is not handled by this adapter
    fn adapt(&self, registry: &TypeRegistry, native: &NativeType) -> Option<Result<TypeWidget>>;
}

struct ArrayAdapter;
struct EnumAdapter;
struct FutureAdapter;
struct RecordAdapter;
struct MapAdapter;
struct ListAdapter;
struct ProviderAdapter;
struct ReflectiveAdapter;

/// The fixed adapting chain, in resolution order
pub static ADAPTING_CHAIN: [&dyn NativeAdapter; 8] = [
    &ArrayAdapter,
    &EnumAdapter,
    &FutureAdapter,
    &RecordAdapter,
    &MapAdapter,
    &ListAdapter,
    &ProviderAdapter,
    &ReflectiveAdapter,
];

impl NativeAdapter for ArrayAdapter {
    fn name(&self) -> &'static str {
        "array"
    }

    fn adapt(&self, registry: &TypeRegistry, native: &NativeType) -> Option<Result<TypeWidget>> {
        match native {
            NativeType::Array(elem) => Some(registry.resolve_native(elem).map(TypeWidget::array)),
            _ => None,
        }
    }
}

impl NativeAdapter for EnumAdapter {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn adapt(&self, _: &TypeRegistry, native: &NativeType) -> Option<Result<TypeWidget>> {
        match native {
            NativeType::Enum { name, variants } => {
                Some(Ok(TypeWidget::enumeration(Arc::new(EnumShape {
                    name: name.clone(),
                    variants: variants.clone(),
                }))))
            }
            _ => None,
        }
    }
}

impl NativeAdapter for FutureAdapter {
    fn name(&self) -> &'static str {
        "future"
    }

    fn adapt(&self, registry: &TypeRegistry, native: &NativeType) -> Option<Result<TypeWidget>> {
        match native {
            NativeType::Future(inner) => {
                Some(registry.resolve_native(inner).map(TypeWidget::promise))
            }
            _ => None,
        }
    }
}

impl NativeAdapter for RecordAdapter {
    fn name(&self) -> &'static str {
        "record"
    }

    fn adapt(&self, _: &TypeRegistry, native: &NativeType) -> Option<Result<TypeWidget>> {
        match native {
            NativeType::Record => Some(Ok(TypeWidget::record())),
            _ => None,
        }
    }
}

impl NativeAdapter for MapAdapter {
    fn name(&self) -> &'static str {
        "map"
    }

    fn adapt(&self, registry: &TypeRegistry, native: &NativeType) -> Option<Result<TypeWidget>> {
        match native {
            NativeType::Map(key, value) => Some((|| {
                Ok(TypeWidget::map(
                    registry.resolve_native(key)?,
                    registry.resolve_native(value)?,
                ))
            })()),
            _ => None,
        }
    }
}

impl NativeAdapter for ListAdapter {
    fn name(&self) -> &'static str {
        "list"
    }

    fn adapt(&self, registry: &TypeRegistry, native: &NativeType) -> Option<Result<TypeWidget>> {
        match native {
            NativeType::List(elem) => Some(registry.resolve_native(elem).map(TypeWidget::list)),
            _ => None,
        }
    }
}

impl NativeAdapter for ProviderAdapter {
    fn name(&self) -> &'static str {
        "provider"
    }

    fn adapt(&self, registry: &TypeRegistry, native: &NativeType) -> Option<Result<TypeWidget>> {
        match native {
            NativeType::Provider(inner) => {
                Some(registry.resolve_native(inner).map(|t| t.boxed().nullable()))
            }
            _ => None,
        }
    }
}

impl NativeAdapter for ReflectiveAdapter {
    fn name(&self) -> &'static str {
        "reflective"
    }

    fn adapt(&self, registry: &TypeRegistry, native: &NativeType) -> Option<Result<TypeWidget>> {
        match native {
            NativeType::Class {
                name,
                properties,
                comparable,
            } => Some((|| {
                let properties = properties
                    .iter()
                    .map(|(n, t)| Ok((n.clone(), registry.resolve_native(t)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TypeWidget::host(Arc::new(ClassShape {
                    name: name.clone(),
                    properties,
                    comparable: *comparable,
                })))
            })()),
            _ => None,
        }
    }
}

/// Scalars resolved ahead of the chain
pub(crate) fn resolve_scalar(native: &NativeType) -> Option<TypeWidget> {
    Some(match native {
        NativeType::Void => TypeWidget::void(),
        NativeType::Primitive(p) => TypeWidget::primitive(*p),
        NativeType::Boxed(p) => TypeWidget::boxed_of(*p),
        NativeType::String => TypeWidget::string(),
        NativeType::Bytes => TypeWidget::bytes(),
        NativeType::Timestamp => TypeWidget::timestamp(),
        NativeType::Object => TypeWidget::any(),
        NativeType::Timeout => TypeWidget::timeout(),
        _ => return None,
    })
}

/// Run the adapting chain; opaque and unrecognized types fail
pub(crate) fn adapt_native(registry: &TypeRegistry, native: &NativeType) -> Result<TypeWidget> {
    for adapter in ADAPTING_CHAIN.iter() {
        if let Some(result) = adapter.adapt(registry, native) {
            tracing::trace!(adapter = adapter.name(), native = %native, "adapted native type");
            return result;
        }
    }
    Err(Error::unsupported_type(native.to_string()))
}
