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

//! Program compilation
//!
//! A [`ProgramCompiler`] turns named operator trees into static methods of a
//! single generated `program` unit. Every entry point takes the ambient
//! [`Timeout`] as its first parameter, followed by its declared arguments.
//! Statement entry points capture faults into an [`Outcome`] so that one
//! failing statement leaves its siblings untouched.
//!
//! [`Outcome`]: crate::runtime::Outcome

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::builder::{try_outcome, ExprFactory};
use crate::bytecode::MethodBody;
use crate::config::CompilerConfig;
use crate::core::{Boxed, Error, Object, Result, Value};
use crate::generate::{ClassSource, MethodGenerator, UnitGenerator};
use crate::ir::AssignableValue;
use crate::runtime::machine::unbox_value;
use crate::runtime::{ClassLoader, Fault, Machine, Timeout};
use crate::types::{StructFactory, TypeRegistry, TypeWidget, ValueType};

use super::lower::Lowerer;
use super::operator::OperatorNode;

/// Name of the unit holding every entry point
pub const PROGRAM_UNIT: &str = "program";

const TIMEOUT_PARAM: &str = "$timeout";

struct Signature {
    name: String,
    params: Vec<TypeWidget>,
    statement: bool,
}

/// Accumulates entry points, then builds them once
pub struct ProgramCompiler {
    source: Rc<ClassSource>,
    types: Rc<TypeRegistry>,
    factory: ExprFactory,
    unit: UnitGenerator,
    signatures: Vec<Signature>,
}

impl ProgramCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self::with_types(config, TypeRegistry::new())
    }

    /// Compiler resolving types through `types`, typically a child of an
    /// enclosing compilation's registry
    pub fn with_types(config: CompilerConfig, types: Rc<TypeRegistry>) -> Self {
        let source = Rc::new(ClassSource::new(config));
        let structs: Rc<dyn StructFactory> = source.clone();
        let factory = ExprFactory::new(source.constants().clone(), structs);
        Self {
            source,
            types,
            factory,
            unit: UnitGenerator::new(PROGRAM_UNIT),
            signatures: Vec::new(),
        }
    }

    pub fn types(&self) -> &Rc<TypeRegistry> {
        &self.types
    }

    /// Add an entry point returning the value of `node`
    pub fn expression(
        &mut self,
        name: &str,
        params: &[(&str, ValueType)],
        node: &OperatorNode,
    ) -> Result<()> {
        self.entry(name, params, node, false)
    }

    /// Add an entry point returning the outcome of `node`
    pub fn statement(
        &mut self,
        name: &str,
        params: &[(&str, ValueType)],
        node: &OperatorNode,
    ) -> Result<()> {
        self.entry(name, params, node, true)
    }

    fn entry(
        &mut self,
        name: &str,
        params: &[(&str, ValueType)],
        node: &OperatorNode,
        statement: bool,
    ) -> Result<()> {
        if self.source.is_built() {
            return Err(Error::new(crate::core::ErrorKind::AlreadyBuilt));
        }
        if self.signatures.iter().any(|s| s.name == name) {
            return Err(Error::invalid_argument(format!(
                "entry point '{}' is already defined",
                name
            )));
        }
        let mut declared = vec![(TIMEOUT_PARAM, TypeWidget::timeout().not_nullable())];
        for (param, vt) in params {
            declared.push((*param, self.types.resolve_value(vt, self.source.as_ref())?));
        }

        let mut method =
            MethodGenerator::new_static(PROGRAM_UNIT, name, &declared, TypeWidget::any());
        let timeout = method.param(0)?.read();
        let arguments = params
            .iter()
            .zip(&method.params()[1..])
            .map(|((n, _), local)| (n.to_string(), local.clone()))
            .collect();
        let structs: Rc<dyn StructFactory> = self.source.clone();
        let mut lowerer = Lowerer::new(
            self.factory.clone(),
            self.types.clone(),
            structs,
            method.frame().clone(),
            arguments,
            timeout,
        );
        let value = lowerer.lower(node)?;
        let value = if statement { try_outcome(value) } else { value };
        method.set_expression_body(value);
        self.unit.add_method(method)?;

        tracing::trace!(entry = name, statement, "compiled entry point");
        self.signatures.push(Signature {
            name: name.to_string(),
            params: declared.into_iter().skip(1).map(|(_, t)| t).collect(),
            statement,
        });
        Ok(())
    }

    /// Build every entry point; the compiler is consumed
    pub fn build(self) -> Result<CompiledProgram> {
        let ProgramCompiler {
            source,
            unit,
            signatures,
            ..
        } = self;
        source.add_unit(unit)?;
        let loader = source.build()?;
        let timeout = source.config().statement_timeout();

        let mut entries = FxHashMap::default();
        if !signatures.is_empty() {
            let class = loader
                .class(PROGRAM_UNIT)
                .ok_or_else(|| Error::internal("program unit was not loaded"))?;
            for signature in signatures {
                let body = class.method(&signature.name).cloned().ok_or_else(|| {
                    Error::internal(format!("entry point '{}' was not loaded", signature.name))
                })?;
                let entry = EntryPoint {
                    name: Arc::from(signature.name.as_str()),
                    body,
                    loader: loader.clone(),
                    params: signature.params,
                    statement: signature.statement,
                    timeout,
                };
                entries.insert(signature.name, entry);
            }
        }
        tracing::debug!(entries = entries.len(), units = loader.len(), "built program");
        Ok(CompiledProgram { loader, entries })
    }
}

/// A built program; safe to share and invoke from many threads
pub struct CompiledProgram {
    loader: Arc<ClassLoader>,
    entries: FxHashMap<String, EntryPoint>,
}

impl CompiledProgram {
    pub fn entry(&self, name: &str) -> Option<&EntryPoint> {
        self.entries.get(name)
    }

    pub fn entry_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn loader(&self) -> &Arc<ClassLoader> {
        &self.loader
    }

    /// Invoke entry point `name` with the configured timeout
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> std::result::Result<Value, Fault> {
        match self.entries.get(name) {
            Some(entry) => entry.invoke(args),
            None => Err(Fault::failed(format!("no entry point named '{}'", name))),
        }
    }
}

impl fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("entries", &self.entry_names())
            .finish()
    }
}

/// Handle to one compiled entry point
#[derive(Clone)]
pub struct EntryPoint {
    name: Arc<str>,
    body: Arc<MethodBody>,
    loader: Arc<ClassLoader>,
    params: Vec<TypeWidget>,
    statement: bool,
    timeout: Option<Duration>,
}

impl EntryPoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the entry point returns an outcome
    pub fn is_statement(&self) -> bool {
        self.statement
    }

    pub fn params(&self) -> &[TypeWidget] {
        &self.params
    }

    /// Invoke with the timeout configured at compile time
    pub fn invoke(&self, args: Vec<Value>) -> std::result::Result<Value, Fault> {
        let timeout = match self.timeout {
            Some(budget) => Timeout::new(budget),
            None => Timeout::unbounded(),
        };
        self.invoke_with(timeout, args)
    }

    pub fn invoke_with(
        &self,
        timeout: Timeout,
        args: Vec<Value>,
    ) -> std::result::Result<Value, Fault> {
        if args.len() != self.params.len() {
            return Err(Fault::failed(format!(
                "{} expects {} argument(s), got {}",
                self.name,
                self.params.len(),
                args.len()
            )));
        }
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(Value::Object(Object::Timeout(timeout)));
        for (ty, arg) in self.params.iter().zip(args) {
            values.push(coerce_argument(ty, arg)?);
        }
        tracing::trace!(entry = %self.name, "invoking entry point");
        Machine::new(self.loader.clone()).invoke(&self.body, values)
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("statement", &self.statement)
            .finish()
    }
}

/// Host values arrive in whatever numeric form is convenient; parameters
/// declared primitive receive the unboxed form of their kind, everything
/// else the boxed form
fn coerce_argument(ty: &TypeWidget, arg: Value) -> std::result::Result<Value, Fault> {
    let boxed = match arg {
        Value::Int(v) => Value::boxed_int(v),
        Value::Long(v) => Value::boxed_long(v),
        Value::Float(v) => Value::boxed(Boxed::Float(v)),
        Value::Double(v) => Value::boxed_double(v),
        other => other,
    };
    match ty.prim() {
        Some(prim) if ty.is_primitive() => unbox_value(prim, boxed),
        _ => Ok(boxed),
    }
}
