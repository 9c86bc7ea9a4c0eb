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

//! Lowering of operator trees into expression IR
//!
//! Errors raised while lowering a node carry the innermost known location.

use std::rc::Rc;

use crate::builder::{self, CaseBuilder, ExprFactory};
use crate::bytecode::{ArithOp, Cond};
use crate::core::{Error, Location, Result, Value};
use crate::ir::{AssignableValue, Expr, Local, LocalFrame};
use crate::types::{StructFactory, TypeRegistry, TypeWidget};

use super::operator::{ExprOperator, OperatorNode};

/// Lowers the nodes of one entry point
pub struct Lowerer {
    factory: ExprFactory,
    types: Rc<TypeRegistry>,
    structs: Rc<dyn StructFactory>,
    frame: Rc<LocalFrame>,
    arguments: Vec<(String, Local)>,
    timeout: Expr,
    /// Names bound by enclosing TRANSFORM nodes, innermost last
    bindings: Vec<(String, Expr)>,
}

impl Lowerer {
    pub fn new(
        factory: ExprFactory,
        types: Rc<TypeRegistry>,
        structs: Rc<dyn StructFactory>,
        frame: Rc<LocalFrame>,
        arguments: Vec<(String, Local)>,
        timeout: Expr,
    ) -> Self {
        Self {
            factory,
            types,
            structs,
            frame,
            arguments,
            timeout,
            bindings: Vec::new(),
        }
    }

    pub fn lower(&mut self, node: &OperatorNode) -> Result<Expr> {
        self.lower_node(node).map_err(|e| {
            // nodes built without a position leave it to an enclosing node
            if node.location == Location::default() {
                e
            } else {
                e.at(node.location)
            }
        })
    }

    fn lower_all(&mut self, nodes: &[OperatorNode]) -> Result<Vec<Expr>> {
        nodes.iter().map(|n| self.lower(n)).collect()
    }

    fn operands(&mut self, node: &OperatorNode) -> Result<(Expr, Expr)> {
        let left = self.lower(node.node(0)?)?;
        let right = self.lower(node.node(1)?)?;
        Ok((left, right))
    }

    fn resolve_type(&self, node: &OperatorNode, index: usize) -> Result<Option<TypeWidget>> {
        match node.value_type(index)? {
            Some(t) => Ok(Some(self.types.resolve_value(t, self.structs.as_ref())?)),
            None => Ok(None),
        }
    }

    fn lower_node(&mut self, node: &OperatorNode) -> Result<Expr> {
        let frame = self.frame.clone();
        match node.operator {
            ExprOperator::Literal => Ok(self.factory.constant(node.value(0)?.clone())),
            ExprOperator::Null => {
                let ty = self.resolve_type(node, 0)?.unwrap_or_else(TypeWidget::any);
                Ok(self.factory.null(ty))
            }
            ExprOperator::Array => {
                let items = self.lower_all(node.nodes(0)?)?;
                builder::list(items)
            }
            ExprOperator::Map | ExprOperator::Record => {
                let names = node.names(0)?;
                let values = self.lower_all(node.nodes(1)?)?;
                if names.len() != values.len() {
                    return Err(Error::invalid_argument(format!(
                        "{} has {} names for {} values",
                        node.operator,
                        names.len(),
                        values.len()
                    )));
                }
                if node.operator == ExprOperator::Map {
                    let entries = names
                        .iter()
                        .map(|n| self.factory.constant(Value::string(n)))
                        .zip(values)
                        .collect();
                    return builder::map(entries);
                }
                let mut record = self.factory.record(&frame);
                for (name, value) in names.iter().zip(values) {
                    record = record.add(name, value)?;
                }
                record.build()
            }
            ExprOperator::PropRef => {
                let target = self.lower(node.node(0)?)?;
                builder::property_value(&frame, target, node.name(1)?)
            }
            ExprOperator::Index => {
                let (target, key) = self.operands(node)?;
                builder::index_value(&frame, target, key)
            }
            ExprOperator::Add
            | ExprOperator::Sub
            | ExprOperator::Mult
            | ExprOperator::Div
            | ExprOperator::Mod => {
                let op = match node.operator {
                    ExprOperator::Add => ArithOp::Add,
                    ExprOperator::Sub => ArithOp::Sub,
                    ExprOperator::Mult => ArithOp::Mul,
                    ExprOperator::Div => ArithOp::Div,
                    _ => ArithOp::Rem,
                };
                let (left, right) = self.operands(node)?;
                builder::arithmetic(op, left, right)
            }
            ExprOperator::Negate => builder::negate(self.lower(node.node(0)?)?),
            ExprOperator::Not => builder::not(self.lower(node.node(0)?)?),
            ExprOperator::And => builder::and(self.lower_all(node.nodes(0)?)?),
            ExprOperator::Or => builder::or(self.lower_all(node.nodes(0)?)?),
            ExprOperator::Eq | ExprOperator::Neq => {
                let (left, right) = self.operands(node)?;
                builder::equality(left, right, node.operator == ExprOperator::Neq)
            }
            ExprOperator::Lt | ExprOperator::LtEq | ExprOperator::Gt | ExprOperator::GtEq => {
                let cond = match node.operator {
                    ExprOperator::Lt => Cond::Lt,
                    ExprOperator::LtEq => Cond::Le,
                    ExprOperator::Gt => Cond::Gt,
                    _ => Cond::Ge,
                };
                let (left, right) = self.operands(node)?;
                builder::ordered(cond, left, right, node.location)
            }
            ExprOperator::Compare => {
                let (left, right) = self.operands(node)?;
                builder::compare(left, right, node.location)
            }
            ExprOperator::IsNull => Ok(builder::is_null(self.lower(node.node(0)?)?)),
            ExprOperator::Coalesce => builder::coalesce(self.lower_all(node.nodes(0)?)?),
            ExprOperator::If => {
                let test = self.lower(node.node(0)?)?;
                let (then, otherwise) = (self.lower(node.node(1)?)?, self.lower(node.node(2)?)?);
                CaseBuilder::new().when(test, then).exit(otherwise)
            }
            ExprOperator::Local => {
                let name = node.name(0)?;
                if let Some((_, value)) = self.bindings.iter().rev().find(|(n, _)| n == name) {
                    return Ok(value.clone());
                }
                frame
                    .get(name)
                    .map(|local| local.read())
                    .ok_or_else(|| Error::invalid_argument(format!("unknown local '{}'", name)))
            }
            ExprOperator::Argument => {
                let name = node.name(0)?;
                self.arguments
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, local)| local.read())
                    .ok_or_else(|| Error::invalid_argument(format!("unknown argument '{}'", name)))
            }
            ExprOperator::Transform => {
                let iterable = self.lower(node.node(0)?)?;
                let name = node.name(1)?.to_string();
                let body = node.node(2)?;
                builder::transform(&frame, iterable, |item| {
                    self.bindings.push((name, item));
                    let mapped = self.lower(body);
                    self.bindings.pop();
                    mapped
                })
            }
            ExprOperator::Length => builder::length(&frame, self.lower(node.node(0)?)?),
            ExprOperator::Resolve => {
                let target = self.lower(node.node(0)?)?;
                builder::resolve(&frame, self.timeout.clone(), target)
            }
            ExprOperator::Cast => {
                let value = self.lower(node.node(0)?)?;
                let ty = self
                    .resolve_type(node, 1)?
                    .ok_or_else(|| Error::invalid_argument("CAST requires a target type"))?;
                builder::cast_value(value, ty)
            }
            ExprOperator::Call | ExprOperator::Invoke | ExprOperator::Subquery => {
                Err(Error::unrecognized_operator(node.operator.name()))
            }
        }
    }
}
