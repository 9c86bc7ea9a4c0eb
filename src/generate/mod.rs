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

//! Generated units and the build pipeline
//!
//! - [`UnitGenerator`] / [`MethodGenerator`] - a class under construction
//! - [`StructGenerator`] - nominal struct types, one unit per field list
//! - [`ClassSource`] - collects units and loads them exactly once

pub mod source;
pub mod structs;
pub mod unit;

pub use source::{ClassSource, GIT_COMMIT};
pub use structs::{StructGenerator, STRUCT_PREFIX};
pub use unit::{MethodGenerator, PrepareHook, RenderFailure, RenderedUnit, UnitGenerator};
