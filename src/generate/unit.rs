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

// Units under construction
//
// A `UnitGenerator` collects the fields, statics and methods of one
// generated class while a program compiles. Rendering turns every method's
// IR into verified op arrays; nothing is emitted before the class source
// builds, and a unit is rendered exactly once.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::bytecode::{render_ops, verify, CodeEmitter, FieldRef, MethodBody, MethodRef, Op};
use crate::core::{Error, Result};
use crate::ir::{ret, Expr, Invocable, Local, LocalFrame, MethodInvocable, Seq};
use crate::runtime::LoadedClass;
use crate::types::{Repr, TypeWidget};

/// Hook run once the unit is loaded
pub type PrepareHook = Box<dyn Fn(&Arc<LoadedClass>) -> Result<()>>;

/// A method under construction
pub struct MethodGenerator {
    method: Arc<MethodRef>,
    params: Vec<TypeWidget>,
    returns: TypeWidget,
    frame: Rc<LocalFrame>,
    this: Option<Local>,
    locals: Vec<Local>,
    body: Option<Seq>,
}

impl MethodGenerator {
    fn create(
        class: &str,
        name: &str,
        receiver: Option<TypeWidget>,
        params: &[(&str, TypeWidget)],
        returns: TypeWidget,
    ) -> Self {
        // parameters take the first slots, receiver first
        let frame = LocalFrame::root();
        let this = receiver.map(|ty| frame.allocate("this", ty.not_nullable()));
        let locals = params
            .iter()
            .map(|(n, ty)| frame.allocate(n, ty.clone()))
            .collect();
        let method = Arc::new(MethodRef {
            class: Arc::from(class),
            name: Arc::from(name),
            params: params.iter().map(|(_, t)| t.repr().clone()).collect(),
            returns: returns.repr().clone(),
            is_static: this.is_none(),
        });
        Self {
            method,
            params: params.iter().map(|(_, t)| t.clone()).collect(),
            returns,
            frame,
            this,
            locals,
            body: None,
        }
    }

    pub fn new_static(
        class: &str,
        name: &str,
        params: &[(&str, TypeWidget)],
        returns: TypeWidget,
    ) -> Self {
        Self::create(class, name, None, params, returns)
    }

    /// Instance method; the receiver is not listed in `params`
    pub fn new_instance(
        receiver: &TypeWidget,
        name: &str,
        params: &[(&str, TypeWidget)],
        returns: TypeWidget,
    ) -> Result<Self> {
        let class = receiver
            .repr()
            .class_name()
            .ok_or_else(|| Error::invalid_argument(format!("{} has no methods", receiver)))?
            .to_string();
        Ok(Self::create(&class, name, Some(receiver.clone()), params, returns))
    }

    pub fn method(&self) -> &Arc<MethodRef> {
        &self.method
    }

    pub fn name(&self) -> &str {
        &self.method.name
    }

    pub fn returns(&self) -> &TypeWidget {
        &self.returns
    }

    /// Root frame; parameter locals live here
    pub fn frame(&self) -> &Rc<LocalFrame> {
        &self.frame
    }

    pub fn this(&self) -> Option<&Local> {
        self.this.as_ref()
    }

    pub fn param(&self, index: usize) -> Result<Local> {
        self.locals.get(index).cloned().ok_or_else(|| {
            Error::invalid_argument(format!(
                "{} has no parameter {}",
                self.method.name, index
            ))
        })
    }

    pub fn params(&self) -> &[Local] {
        &self.locals
    }

    pub fn set_body(&mut self, body: Seq) {
        self.body = Some(body);
    }

    /// Body returning `value` converted to the return type
    pub fn set_expression_body(&mut self, value: Expr) {
        self.body = Some(ret(value, self.returns.clone()));
    }

    pub fn invocable(&self) -> Rc<dyn Invocable> {
        MethodInvocable::new(self.method.clone(), self.params.clone(), self.returns.clone())
    }

    fn render(&self, verify_code: bool) -> std::result::Result<MethodBody, RenderFailure> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| self.failure(Error::internal("method has no body"), String::new()))?;

        let mut code = CodeEmitter::new();
        code.enter_frame(&self.frame);
        let generated = body.generate(&mut code);
        if generated.is_ok() && self.returns.is_void() {
            code.emit(Op::Return(0));
        }
        let exited = code.exit_frame(&self.frame);
        if let Err(err) = generated.and(exited) {
            let mut listing = String::new();
            render_ops(&mut listing, code.ops(), &[], &[]);
            return Err(self.failure(err, listing));
        }
        let out = code.finish();

        let max_stack = if verify_code {
            let width = self.returns.width() as usize;
            verify(&out.ops, &out.labels, &out.handlers, out.max_locals, width).map_err(|e| {
                self.failure(
                    Error::internal(format!("verification failed: {}", e)),
                    listing(&out.ops, &out.labels, &out.handlers),
                )
            })?
        } else {
            0
        };
        let labels = out
            .labels
            .iter()
            .enumerate()
            .map(|(id, pc)| {
                pc.ok_or_else(|| {
                    self.failure(
                        Error::internal(format!("label L{} is never bound", id)),
                        listing(&out.ops, &out.labels, &out.handlers),
                    )
                })
            })
            .collect::<std::result::Result<Vec<u32>, _>>()?;

        tracing::trace!(method = %self.method, ops = out.ops.len(), max_stack, "rendered method");
        Ok(MethodBody {
            method: self.method.clone(),
            ops: out.ops,
            labels,
            handlers: out.handlers,
            max_locals: out.max_locals,
            max_stack,
        })
    }

    fn failure(&self, error: Error, listing: String) -> RenderFailure {
        RenderFailure {
            unit: self.method.class.clone(),
            method: self.method.name.clone(),
            listing,
            error,
        }
    }
}

fn listing(ops: &[Op], labels: &[Option<u32>], handlers: &[crate::bytecode::Handler]) -> String {
    let bound: Vec<u32> = labels.iter().map(|l| l.unwrap_or(u32::MAX)).collect();
    let mut out = String::new();
    render_ops(&mut out, ops, &bound, handlers);
    out
}

impl fmt::Debug for MethodGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodGenerator")
            .field("method", &self.method.to_string())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// A method that failed to render, with whatever code was produced
#[derive(Debug)]
pub struct RenderFailure {
    pub unit: Arc<str>,
    pub method: Arc<str>,
    pub listing: String,
    pub error: Error,
}

/// Everything needed to define a loaded class
pub struct RenderedUnit {
    pub name: Arc<str>,
    pub fields: Vec<(Arc<str>, Repr)>,
    pub statics: Vec<(Arc<str>, Repr)>,
    pub methods: Vec<MethodBody>,
}

impl RenderedUnit {
    pub fn into_class(self) -> LoadedClass {
        LoadedClass::new(self.name, self.fields, self.statics, self.methods)
    }

    /// Disassembly of every method
    pub fn disassemble(&self) -> String {
        self.methods.iter().map(MethodBody::disassemble).collect()
    }
}

/// A generated class under construction
pub struct UnitGenerator {
    name: Arc<str>,
    fields: Vec<(Arc<str>, TypeWidget)>,
    statics: Vec<(Arc<str>, TypeWidget)>,
    methods: Vec<MethodGenerator>,
    prepare: Vec<PrepareHook>,
}

impl UnitGenerator {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            fields: Vec::new(),
            statics: Vec::new(),
            methods: Vec::new(),
            prepare: Vec::new(),
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    fn field_ref(&self, name: &str, ty: &TypeWidget) -> Arc<FieldRef> {
        Arc::new(FieldRef {
            class: self.name.clone(),
            name: Arc::from(name),
            repr: ty.repr().clone(),
        })
    }

    pub fn add_field(&mut self, name: &str, ty: TypeWidget) -> Result<Arc<FieldRef>> {
        if self.fields.iter().any(|(n, _)| &**n == name) {
            return Err(Error::invalid_argument(format!(
                "field '{}' already exists on {}",
                name, self.name
            )));
        }
        let field = self.field_ref(name, &ty);
        self.fields.push((field.name.clone(), ty));
        Ok(field)
    }

    pub fn add_static(&mut self, name: &str, ty: TypeWidget) -> Result<Arc<FieldRef>> {
        if self.statics.iter().any(|(n, _)| &**n == name) {
            return Err(Error::invalid_argument(format!(
                "static '{}' already exists on {}",
                name, self.name
            )));
        }
        let field = self.field_ref(name, &ty);
        self.statics.push((field.name.clone(), ty));
        Ok(field)
    }

    pub fn add_method(&mut self, method: MethodGenerator) -> Result<()> {
        if *method.method.class != *self.name {
            return Err(Error::internal(format!(
                "method {} added to unit {}",
                method.method, self.name
            )));
        }
        if self.methods.iter().any(|m| m.name() == method.name()) {
            return Err(Error::invalid_argument(format!(
                "method '{}' already exists on {}",
                method.name(),
                self.name
            )));
        }
        self.methods.push(method);
        Ok(())
    }

    pub fn on_prepare<F>(&mut self, hook: F)
    where
        F: Fn(&Arc<LoadedClass>) -> Result<()> + 'static,
    {
        self.prepare.push(Box::new(hook));
    }

    pub fn methods(&self) -> &[MethodGenerator] {
        &self.methods
    }

    /// A unit with no fields, statics or methods generates nothing
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.statics.is_empty() && self.methods.is_empty()
    }

    /// Generated classes whose members the unit's method bodies use
    ///
    /// Type checks are left out; they may name library classes.
    pub fn dependencies(rendered: &RenderedUnit) -> FxHashSet<Arc<str>> {
        rendered
            .methods
            .iter()
            .flat_map(|m| m.ops.iter())
            .filter_map(|op| match op {
                Op::CheckCast(_) | Op::InstanceOf(_) => None,
                other => other.referenced_class(),
            })
            .filter(|c| **c != *rendered.name)
            .map(Arc::from)
            .collect()
    }

    pub(crate) fn render(&self, verify_code: bool) -> std::result::Result<RenderedUnit, RenderFailure> {
        let methods = self
            .methods
            .iter()
            .map(|m| m.render(verify_code))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let reprs = |items: &[(Arc<str>, TypeWidget)]| {
            items
                .iter()
                .map(|(n, t)| (n.clone(), t.repr().clone()))
                .collect::<Vec<_>>()
        };
        Ok(RenderedUnit {
            name: self.name.clone(),
            fields: reprs(&self.fields),
            statics: reprs(&self.statics),
            methods,
        })
    }

    pub(crate) fn prepare(&self, class: &Arc<LoadedClass>) -> Result<()> {
        for hook in &self.prepare {
            hook(class)?;
        }
        Ok(())
    }
}

impl fmt::Debug for UnitGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitGenerator")
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .field("statics", &self.statics.len())
            .field("methods", &self.methods)
            .finish()
    }
}
