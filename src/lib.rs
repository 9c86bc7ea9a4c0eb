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

//! # Tessera - typed expression compiler for a query engine
//!
//! Tessera takes the operator trees produced by a query planner, infers a
//! static type for every expression and emits verified stack bytecode that
//! runs on a small class-based virtual machine.
//!
//! ## Quick Start
//!
//! ```rust
//! use tessera::compiler::{ExprOperator, OperatorNode};
//! use tessera::{CompilerConfig, ProgramCompiler, Value};
//!
//! let mut compiler = ProgramCompiler::new(CompilerConfig::default());
//! let product = OperatorNode::binary(
//!     ExprOperator::Mult,
//!     OperatorNode::literal(Value::Int(2)),
//!     OperatorNode::literal(Value::Int(3)),
//! );
//! let sum = OperatorNode::binary(ExprOperator::Add, OperatorNode::literal(Value::Int(1)), product);
//! compiler.expression("seven", &[], &sum).unwrap();
//!
//! let program = compiler.build().unwrap();
//! assert_eq!(program.invoke("seven", vec![]).unwrap().as_i64(), Some(7));
//! ```
//!
//! ## Modules
//!
//! - [`types`] - type widgets, unification, adapters and the type registry
//! - [`ir`] - typed expression and sequence nodes, local frames, constants
//! - [`builder`] - control flow, arithmetic, comparison, records
//! - [`bytecode`] - op set, emitter, conversions and the verifier
//! - [`generate`] - units, methods, generated structs and the class source
//! - [`runtime`] - class loader, machine, faults, promises and outcomes
//! - [`compiler`] - operator trees and program compilation
//! - [`core`] - values and compile errors

pub mod builder;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod core;
pub mod generate;
pub mod ir;
pub mod runtime;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use crate::core::{Error, ErrorKind, Location, Object, Result, Value};

pub use compiler::{CompiledProgram, EntryPoint, ExprOperator, OperatorNode, ProgramCompiler};
pub use config::CompilerConfig;
pub use generate::ClassSource;
pub use runtime::{ClassLoader, Fault, FaultKind, Machine, Outcome, Timeout};
pub use types::{unify, TypeRegistry, TypeWidget, ValueType};

#[cfg(test)]
mod send_sync_tests {
    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_compiled_program_is_shareable() {
        assert_send_sync::<crate::CompiledProgram>();
        assert_send_sync::<crate::EntryPoint>();
        assert_send_sync::<crate::ClassLoader>();
    }
}
