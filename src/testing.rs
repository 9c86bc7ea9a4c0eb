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

// Helpers for unit tests that compile and run small expressions

use std::rc::Rc;

use crate::config::CompilerConfig;
use crate::core::{Result, Value};
use crate::generate::{ClassSource, MethodGenerator, UnitGenerator};
use crate::ir::{Expr, LocalFrame};
use crate::runtime::{ClassLoader, Fault, Machine};
use crate::types::TypeWidget;

/// Compile the expression built by `build` into a verified method
/// returning `any` and run it
pub(crate) fn try_run_expr<F>(build: F) -> std::result::Result<Value, Fault>
where
    F: FnOnce(&Rc<LocalFrame>) -> Result<Expr>,
{
    let mut unit = UnitGenerator::new("test");
    let mut method = MethodGenerator::new_static("test", "run", &[], TypeWidget::any());
    let value = build(method.frame()).expect("expression builds");
    method.set_expression_body(value);
    unit.add_method(method).expect("method added");
    let rendered = match unit.render(true) {
        Ok(r) => r,
        Err(failure) => panic!("{}\n{}", failure.error, failure.listing),
    };
    let loader = ClassLoader::new();
    let class = loader.define(rendered.into_class()).expect("class defined");
    let body = class.method("run").expect("run method").clone();
    Machine::new(loader).invoke(&body, Vec::new())
}

pub(crate) fn run_expr<F>(build: F) -> Value
where
    F: FnOnce(&Rc<LocalFrame>) -> Result<Expr>,
{
    try_run_expr(build).expect("expression runs")
}

/// Like [`try_run_expr`], but the method is built through a class source so
/// struct units and hoisted constants requested while building are loaded
pub(crate) fn try_run_in_source<F>(build: F) -> std::result::Result<Value, Fault>
where
    F: FnOnce(&Rc<ClassSource>, &Rc<LocalFrame>) -> Result<Expr>,
{
    let source = Rc::new(ClassSource::new(CompilerConfig::default()));
    let mut unit = UnitGenerator::new("test");
    let mut method = MethodGenerator::new_static("test", "run", &[], TypeWidget::any());
    let value = build(&source, method.frame()).expect("expression builds");
    method.set_expression_body(value);
    unit.add_method(method).expect("method added");
    source.add_unit(unit).expect("unit added");
    let loader = source.build().expect("source builds");
    let body = loader
        .class("test")
        .and_then(|c| c.method("run").cloned())
        .expect("run method");
    Machine::new(loader).invoke(&body, Vec::new())
}

pub(crate) fn run_in_source<F>(build: F) -> Value
where
    F: FnOnce(&Rc<ClassSource>, &Rc<LocalFrame>) -> Result<Expr>,
{
    try_run_in_source(build).expect("expression runs")
}
