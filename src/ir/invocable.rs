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

// Callables with fixed signatures and partial application

use std::rc::Rc;
use std::sync::Arc;

use crate::bytecode::{CodeEmitter, MethodRef, Op};
use crate::core::{Error, Result};
use crate::types::TypeWidget;

use super::{expr, Expr};

/// Something that can be called with typed arguments
pub trait Invocable {
    fn returns(&self) -> &TypeWidget;

    fn params(&self) -> &[TypeWidget];

    /// Call with `args` converted to the parameter types
    fn invoke(&self, args: Vec<Expr>) -> Result<Expr>;
}

fn check_arity(name: &str, params: &[TypeWidget], args: &[Expr]) -> Result<()> {
    if params.len() != args.len() {
        return Err(Error::invalid_argument(format!(
            "{} expects {} arguments, got {}",
            name,
            params.len(),
            args.len()
        )));
    }
    Ok(())
}

fn generate_args(code: &mut CodeEmitter, params: &[TypeWidget], args: &[Expr]) -> Result<()> {
    for (param, arg) in params.iter().zip(args) {
        arg.generate(code)?;
        code.cast(param, arg.ty())?;
    }
    Ok(())
}

/// A method of a generated unit
pub struct MethodInvocable {
    method: Arc<MethodRef>,
    params: Vec<TypeWidget>,
    returns: TypeWidget,
}

impl MethodInvocable {
    /// `params` excludes the receiver of instance methods
    pub fn new(method: Arc<MethodRef>, params: Vec<TypeWidget>, returns: TypeWidget) -> Rc<Self> {
        Rc::new(MethodInvocable {
            method,
            params,
            returns,
        })
    }

    pub fn method(&self) -> &Arc<MethodRef> {
        &self.method
    }
}

impl Invocable for MethodInvocable {
    fn returns(&self) -> &TypeWidget {
        &self.returns
    }

    fn params(&self) -> &[TypeWidget] {
        &self.params
    }

    fn invoke(&self, args: Vec<Expr>) -> Result<Expr> {
        check_arity(&self.method.name, &self.params, &args)?;
        let (method, params) = (self.method.clone(), self.params.clone());
        Ok(expr(self.returns.clone(), move |code| {
            generate_args(code, &params, &args)?;
            code.emit(Op::Invoke(method.clone()));
            Ok(())
        }))
    }
}

type InlineBody = dyn Fn(&mut CodeEmitter) -> Result<()>;

/// Code emitted in place after the arguments
pub struct InlineInvocable {
    name: String,
    params: Vec<TypeWidget>,
    returns: TypeWidget,
    body: Rc<InlineBody>,
}

impl InlineInvocable {
    pub fn new<F>(name: &str, params: Vec<TypeWidget>, returns: TypeWidget, body: F) -> Rc<Self>
    where
        F: Fn(&mut CodeEmitter) -> Result<()> + 'static,
    {
        Rc::new(InlineInvocable {
            name: name.to_string(),
            params,
            returns,
            body: Rc::new(body),
        })
    }
}

impl Invocable for InlineInvocable {
    fn returns(&self) -> &TypeWidget {
        &self.returns
    }

    fn params(&self) -> &[TypeWidget] {
        &self.params
    }

    fn invoke(&self, args: Vec<Expr>) -> Result<Expr> {
        check_arity(&self.name, &self.params, &args)?;
        let (params, body) = (self.params.clone(), self.body.clone());
        Ok(expr(self.returns.clone(), move |code| {
            generate_args(code, &params, &args)?;
            body(code)
        }))
    }
}

/// An invocable with its leading arguments already bound
pub struct Prefix {
    inner: Rc<dyn Invocable>,
    bound: Vec<Expr>,
}

impl Prefix {
    pub fn new(inner: Rc<dyn Invocable>, bound: Vec<Expr>) -> Result<Rc<Self>> {
        if bound.len() > inner.params().len() {
            return Err(Error::invalid_argument(format!(
                "cannot bind {} of {} arguments",
                bound.len(),
                inner.params().len()
            )));
        }
        Ok(Rc::new(Prefix { inner, bound }))
    }
}

impl Invocable for Prefix {
    fn returns(&self) -> &TypeWidget {
        self.inner.returns()
    }

    fn params(&self) -> &[TypeWidget] {
        &self.inner.params()[self.bound.len()..]
    }

    fn invoke(&self, args: Vec<Expr>) -> Result<Expr> {
        let mut all = self.bound.clone();
        all.extend(args);
        self.inner.invoke(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::ArithOp;
    use crate::core::{ErrorKind, Value};
    use crate::ir::literal;
    use crate::types::NumKind;

    fn add() -> Rc<InlineInvocable> {
        InlineInvocable::new(
            "add",
            vec![TypeWidget::int64(), TypeWidget::int64()],
            TypeWidget::int64(),
            |code| {
                code.emit(Op::Arith(ArithOp::Add, NumKind::Long));
                Ok(())
            },
        )
    }

    #[test]
    fn test_prefix_binds_leading_arguments() {
        let inc = Prefix::new(add(), vec![literal(Value::Long(1), TypeWidget::int64())]).unwrap();
        assert_eq!(inc.params().len(), 1);
        let call = inc
            .invoke(vec![literal(Value::Int(41), TypeWidget::int32())])
            .unwrap();
        let mut code = CodeEmitter::new();
        call.generate(&mut code).unwrap();
        // second argument widened before the add
        assert_eq!(code.position(), 4);
        assert_eq!(call.ty(), &TypeWidget::int64());
    }

    #[test]
    fn test_arity_is_checked() {
        let err = add().invoke(vec![]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidArgument(_)));
        assert!(Prefix::new(add(), vec![
            literal(Value::Long(1), TypeWidget::int64()),
            literal(Value::Long(2), TypeWidget::int64()),
            literal(Value::Long(3), TypeWidget::int64()),
        ])
        .is_err());
    }

    #[test]
    fn test_method_invocable() {
        let method = Arc::new(MethodRef {
            class: Arc::from("program"),
            name: Arc::from("length"),
            params: vec![TypeWidget::string().repr().clone()],
            returns: crate::types::Repr::Int,
            is_static: true,
        });
        let call = MethodInvocable::new(method, vec![TypeWidget::string()], TypeWidget::int32())
            .invoke(vec![crate::ir::null(TypeWidget::string())])
            .unwrap();
        let mut code = CodeEmitter::new();
        call.generate(&mut code).unwrap();
        assert!(matches!(code.ops()[1], Op::Invoke(_)));
    }
}
