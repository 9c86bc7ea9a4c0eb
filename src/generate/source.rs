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

// The class source: Open -> Built
//
// Units accumulate while a program compiles. `build` runs once:
//
//   prune empty units -> add constants unit -> render + verify
//     -> order by dependency -> link check -> define -> prepare hooks
//
// A unit that fails to render, verify or link is dumped (log, plus a file
// when a dump directory is configured) before the failure is returned.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::CompilerConfig;
use crate::core::{Error, ErrorKind, Result};
use crate::ir::{ConstantTable, CONSTANTS_UNIT};
use crate::runtime::ClassLoader;
use crate::types::{StructFactory, TypeWidget};

use super::structs::StructGenerator;
use super::unit::{RenderedUnit, UnitGenerator};

/// Commit the crate was built from, printed in dumps
pub const GIT_COMMIT: &str = match option_env!("TESSERA_GIT_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Built,
}

/// Accumulates generated units and loads them once
pub struct ClassSource {
    config: CompilerConfig,
    units: RefCell<Vec<UnitGenerator>>,
    names: RefCell<FxHashSet<Arc<str>>>,
    state: Cell<State>,
    structs: StructGenerator,
    constants: Rc<ConstantTable>,
}

impl ClassSource {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            units: RefCell::new(Vec::new()),
            names: RefCell::new(FxHashSet::default()),
            state: Cell::new(State::Open),
            structs: StructGenerator::new(),
            constants: ConstantTable::new(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Constant table shared by every unit of this source
    pub fn constants(&self) -> &Rc<ConstantTable> {
        &self.constants
    }

    pub fn is_built(&self) -> bool {
        self.state.get() == State::Built
    }

    /// Units added so far, empty ones included
    pub fn unit_count(&self) -> usize {
        self.units.borrow().len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.borrow().contains(name)
    }

    fn check_open(&self) -> Result<()> {
        match self.state.get() {
            State::Open => Ok(()),
            State::Built => Err(Error::new(ErrorKind::AlreadyBuilt)),
        }
    }

    pub fn add_unit(&self, unit: UnitGenerator) -> Result<()> {
        self.check_open()?;
        if self.unit_count() >= self.config.max_units {
            return Err(Error::invalid_argument(format!(
                "too many generated units (limit {})",
                self.config.max_units
            )));
        }
        if !self.names.borrow_mut().insert(unit.name().clone()) {
            return Err(Error::new(ErrorKind::DuplicateUnit(unit.name().to_string())));
        }
        tracing::trace!(unit = %unit.name(), "added unit");
        self.units.borrow_mut().push(unit);
        Ok(())
    }

    /// Render, link and load every unit
    pub fn build(&self) -> Result<Arc<ClassLoader>> {
        self.check_open()?;
        self.state.set(State::Built);

        let mut units = self.units.take();
        if let Some(constants) = self.constants_unit()? {
            units.push(constants);
        }
        let before = units.len();
        units.retain(|u| !u.is_empty());
        if units.len() < before {
            tracing::debug!(pruned = before - units.len(), "pruned empty units");
        }

        let mut rendered = Vec::with_capacity(units.len());
        for unit in &units {
            match unit.render(self.config.verify) {
                Ok(r) => rendered.push(r),
                Err(failure) if !failure.error.is_internal() => return Err(failure.error),
                Err(failure) => {
                    let unit = format!("{}.{}", failure.unit, failure.method);
                    return Err(self.dump(&unit, &failure.listing, &failure.error));
                }
            }
        }

        let order = dependency_order(&rendered);
        let loader = ClassLoader::new();
        let pending: FxHashSet<Arc<str>> = rendered.iter().map(|r| r.name.clone()).collect();
        let mut slots: Vec<Option<RenderedUnit>> = rendered.into_iter().map(Some).collect();
        let mut loaded = Vec::with_capacity(order.len());
        for index in order {
            let Some(unit) = slots[index].take() else {
                continue;
            };
            let missing = UnitGenerator::dependencies(&unit)
                .into_iter()
                .find(|dep| !loader.contains(dep) && !pending.contains(dep));
            if let Some(dep) = missing {
                let error = Error::internal(format!("{} references unknown unit {}", unit.name, dep));
                return Err(self.dump(&unit.name, &unit.disassemble(), &error));
            }
            let listing = unit.disassemble();
            let name = unit.name.clone();
            let class = loader
                .define(unit.into_class())
                .map_err(|e| self.dump(&name, &listing, &e))?;
            loaded.push((index, class));
        }

        for (index, class) in &loaded {
            units[*index].prepare(class)?;
        }
        tracing::debug!(units = loaded.len(), "built class source");
        Ok(loader)
    }

    /// Unit declaring a static per hoisted constant
    fn constants_unit(&self) -> Result<Option<UnitGenerator>> {
        let hoisted = self.constants.hoisted();
        if hoisted.is_empty() {
            return Ok(None);
        }
        let mut unit = UnitGenerator::new(CONSTANTS_UNIT);
        for constant in &hoisted {
            unit.add_static(&constant.field.name, constant.ty.clone())?;
        }
        unit.on_prepare(move |class| {
            for constant in &hoisted {
                if !class.set_static(&constant.field.name, constant.value.clone()) {
                    return Err(Error::internal(format!(
                        "constant {} has no slot",
                        constant.field
                    )));
                }
            }
            Ok(())
        });
        Ok(Some(unit))
    }

    /// Log (and optionally persist) a failing unit; returns the error to raise
    fn dump(&self, unit: &str, listing: &str, error: &Error) -> Error {
        tracing::error!(
            unit,
            commit = GIT_COMMIT,
            error = %error,
            "code generation failed\n{}",
            listing
        );
        if let Some(dir) = self.config.resolved_dump_directory() {
            if let Err(e) = write_dump(&dir, unit, listing, error) {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to write dump");
            }
        }
        if error.is_internal() {
            error.clone()
        } else {
            Error::internal(format!("{}: {}", unit, error))
        }
    }
}

fn write_dump(dir: &Path, unit: &str, listing: &str, error: &Error) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let file_name: String = unit
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect();
    let body = format!(
        "unit: {}\ncommit: {}\nerror: {}\n\n{}",
        unit, GIT_COMMIT, error, listing
    );
    fs::write(dir.join(format!("{}.txt", file_name)), body)
}

/// Post-order over member references so dependencies load first
fn dependency_order(units: &[RenderedUnit]) -> Vec<usize> {
    let index: FxHashMap<&str, usize> = units
        .iter()
        .enumerate()
        .map(|(i, u)| (&*u.name, i))
        .collect();
    let mut visited = vec![false; units.len()];
    let mut order = Vec::with_capacity(units.len());

    fn visit(
        at: usize,
        units: &[RenderedUnit],
        index: &FxHashMap<&str, usize>,
        visited: &mut [bool],
        order: &mut Vec<usize>,
    ) {
        if visited[at] {
            return;
        }
        visited[at] = true;
        let mut deps: Vec<usize> = UnitGenerator::dependencies(&units[at])
            .iter()
            .filter_map(|d| index.get(&**d).copied())
            .collect();
        deps.sort_unstable();
        for dep in deps {
            visit(dep, units, index, visited, order);
        }
        order.push(at);
    }

    for at in 0..units.len() {
        visit(at, units, &index, &mut visited, &mut order);
    }
    order
}

impl StructFactory for ClassSource {
    fn struct_type(&self, fields: &[(Arc<str>, TypeWidget)]) -> Result<TypeWidget> {
        self.check_open()?;
        let (ty, unit) = self.structs.generate(fields)?;
        if let Some(unit) = unit {
            self.add_unit(unit)?;
        }
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Op;
    use crate::core::Value;
    use crate::generate::MethodGenerator;
    use crate::ir::seq;
    use crate::runtime::Machine;

    fn returning(unit: &str, name: &str, value: crate::ir::Expr) -> UnitGenerator {
        let mut u = UnitGenerator::new(unit);
        let mut m = MethodGenerator::new_static(unit, name, &[], value.ty().clone());
        m.set_expression_body(value);
        u.add_method(m).unwrap();
        u
    }

    #[test]
    fn test_build_is_one_shot() {
        let source = ClassSource::new(CompilerConfig::default());
        source.add_unit(UnitGenerator::new("empty")).unwrap();
        let dup = source.add_unit(UnitGenerator::new("empty")).unwrap_err();
        assert!(matches!(dup.kind, ErrorKind::DuplicateUnit(_)));

        let loader = source.build().unwrap();
        assert!(loader.is_empty());
        assert!(source.is_built());
        assert!(matches!(source.build().unwrap_err().kind, ErrorKind::AlreadyBuilt));
        let late = source.add_unit(UnitGenerator::new("late")).unwrap_err();
        assert!(matches!(late.kind, ErrorKind::AlreadyBuilt));
    }

    #[test]
    fn test_hoisted_constants_are_injected() {
        let source = ClassSource::new(CompilerConfig::default());
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let value = source.constants().constant(list.clone());
        source.add_unit(returning("prog", "main", value)).unwrap();

        let loader = source.build().unwrap();
        assert!(loader.contains(CONSTANTS_UNIT));
        let main = loader.class("prog").unwrap().method("main").unwrap().clone();
        let out = Machine::new(loader).invoke(&main, vec![]).unwrap();
        assert_eq!(out, list);
    }

    #[test]
    fn test_unknown_reference_is_internal() {
        let source = ClassSource::new(CompilerConfig::default());
        let mut u = UnitGenerator::new("prog");
        let mut m = MethodGenerator::new_static("prog", "main", &[], TypeWidget::any());
        m.set_body(seq(|code| {
            code.emit(Op::New(Arc::from("nowhere")));
            code.emit(Op::Return(1));
            Ok(())
        }));
        u.add_method(m).unwrap();
        source.add_unit(u).unwrap();
        let err = source.build().unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_unit_limit() {
        let source = ClassSource::new(CompilerConfig::default().with_max_units(1));
        source.add_unit(UnitGenerator::new("a")).unwrap();
        assert!(source.add_unit(UnitGenerator::new("b")).is_err());
    }

    #[test]
    fn test_struct_units_are_registered_once() {
        let source = ClassSource::new(CompilerConfig::default());
        let fields = vec![(Arc::from("a"), TypeWidget::int32())];
        let first = source.struct_type(&fields).unwrap();
        let second = source.struct_type(&fields).unwrap();
        assert_eq!(first, second);
        assert_eq!(source.unit_count(), 1);
        let loader = source.build().unwrap();
        assert!(loader.contains(first.repr().class_name().unwrap()));
    }
}
