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

//! Control-flow and expression builders
//!
//! Everything here produces IR nodes from [`crate::ir`]; nothing emits code
//! until the owning method is rendered. Builders that need locals take the
//! enclosing [`LocalFrame`] and open a child frame of their own.
//!
//! - [`ScopeBuilder`] - nested blocks with locals and early exits
//! - [`IterateBuilder`] / [`transform`] - uniform iteration
//! - [`SwitchBuilder`] / [`CaseBuilder`] - value dispatch
//! - [`CatchBuilder`] / [`try_outcome`] - protected regions
//! - [`RecordBuilder`] - static struct or dynamic record construction
//! - free functions for arithmetic, comparison, boolean logic, null
//!   propagation, property and index access, promises and casts

pub mod access;
pub mod catch;
pub mod collections;
pub mod compare;
pub mod iterate;
pub mod logic;
pub mod record;
pub mod scope;
pub mod switch;

use std::rc::Rc;

use crate::core::Value;
use crate::ir::{self, ConstantTable, Expr, LocalFrame};
use crate::types::{StructFactory, TypeWidget};

pub use access::{cast_value, index_value, property_value, resolve, resolve_later};
pub use catch::{try_outcome, CatchBuilder};
pub use collections::{array, first, length, list, map};
pub use compare::{arithmetic, compare, equality, negate, ordered};
pub use iterate::{transform, IterateBuilder};
pub use logic::{and, bool_value, coalesce, guarded, is_null, not, or};
pub use record::{is_identifier, RecordBuilder};
pub use scope::ScopeBuilder;
pub use switch::{CaseBuilder, SwitchBuilder};

/// Entry point for builders that depend on per-compilation state
#[derive(Clone)]
pub struct ExprFactory {
    constants: Rc<ConstantTable>,
    structs: Rc<dyn StructFactory>,
}

impl ExprFactory {
    pub fn new(constants: Rc<ConstantTable>, structs: Rc<dyn StructFactory>) -> Self {
        Self { constants, structs }
    }

    /// Literal, inlined or hoisted depending on its type
    pub fn constant(&self, value: Value) -> Expr {
        self.constants.constant(value)
    }

    pub fn boolean(&self, value: bool) -> Expr {
        self.constants.boolean(value)
    }

    pub fn null(&self, ty: TypeWidget) -> Expr {
        ir::null(ty)
    }

    pub fn record(&self, frame: &Rc<LocalFrame>) -> RecordBuilder {
        RecordBuilder::new(frame, self.structs.clone())
    }

    pub fn dynamic_record(&self, frame: &Rc<LocalFrame>) -> RecordBuilder {
        RecordBuilder::dynamic(frame, self.structs.clone())
    }
}
