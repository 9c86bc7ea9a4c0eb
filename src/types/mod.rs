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

//! Value-type model
//!
//! - [`TypeWidget`] - the type of every compiled value
//! - [`unify`] / [`unify_all`] - least upper bound of operand types
//! - [`TypeRegistry`] - memoized resolution of [`ValueType`] and [`NativeType`]
//! - capability adapters for property, index, iterate, promise, result and
//!   unification operations

pub mod adapters;
pub mod external;
pub mod kind;
pub mod native;
pub mod registry;
pub mod repr;
pub mod unify;
pub mod widget;

pub use adapters::{
    IndexAdapter, IterateAdapter, PromiseAdapter, PropertyAdapter, ResultAdapter,
    UnificationAdapter,
};
pub use external::ValueType;
pub use kind::{CoreKind, Prim};
pub use native::{NativeAdapter, NativeType, ADAPTING_CHAIN};
pub use registry::{StructFactory, TypeRegistry};
pub use repr::{NumKind, Repr};
pub use unify::{infer_constant_type, unify, unify_all};
pub use widget::{ClassShape, EnumShape, FieldShape, Shape, StructShape, TypeWidget};
