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

// Reflective host objects

use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

use crate::core::Value;

/// A host value exposing named, readable properties
///
/// Host classes are described to the compiler with
/// `NativeType::Class`; at runtime their instances are reached through this
/// trait by the dynamic linker.
pub trait HostObject: Send + Sync + Debug {
    fn class_name(&self) -> &str;

    /// Read a property; `None` when the class has no such property.
    /// Primitive properties are returned boxed.
    fn property(&self, name: &str) -> Option<Value>;

    fn property_names(&self) -> Vec<Arc<str>>;

    /// Ordering against another host value, if the class is comparable
    fn compare(&self, _other: &dyn HostObject) -> Option<Ordering> {
        None
    }
}
