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

//! Operator tree consumed by the compiler
//!
//! The planner hands over a tree of [`OperatorNode`]s: an operator tag, its
//! positional arguments and the source location the node came from.

use std::fmt;
use std::str::FromStr;

use crate::core::{Error, Location, Result, Value};
use crate::types::ValueType;

/// Expression operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprOperator {
    Literal,
    Null,
    Array,
    Map,
    Record,
    PropRef,
    Index,
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    Negate,
    Not,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Compare,
    IsNull,
    Coalesce,
    If,
    Local,
    Argument,
    Transform,
    Length,
    Resolve,
    Cast,
    /// Planner-level operators; never lowered here
    Call,
    Invoke,
    Subquery,
}

impl ExprOperator {
    pub const ALL: [ExprOperator; 35] = [
        ExprOperator::Literal,
        ExprOperator::Null,
        ExprOperator::Array,
        ExprOperator::Map,
        ExprOperator::Record,
        ExprOperator::PropRef,
        ExprOperator::Index,
        ExprOperator::Add,
        ExprOperator::Sub,
        ExprOperator::Mult,
        ExprOperator::Div,
        ExprOperator::Mod,
        ExprOperator::Negate,
        ExprOperator::Not,
        ExprOperator::And,
        ExprOperator::Or,
        ExprOperator::Eq,
        ExprOperator::Neq,
        ExprOperator::Lt,
        ExprOperator::LtEq,
        ExprOperator::Gt,
        ExprOperator::GtEq,
        ExprOperator::Compare,
        ExprOperator::IsNull,
        ExprOperator::Coalesce,
        ExprOperator::If,
        ExprOperator::Local,
        ExprOperator::Argument,
        ExprOperator::Transform,
        ExprOperator::Length,
        ExprOperator::Resolve,
        ExprOperator::Cast,
        ExprOperator::Call,
        ExprOperator::Invoke,
        ExprOperator::Subquery,
    ];

    /// Upper-case tag used by the planner
    pub fn name(&self) -> &'static str {
        match self {
            ExprOperator::Literal => "LITERAL",
            ExprOperator::Null => "NULL",
            ExprOperator::Array => "ARRAY",
            ExprOperator::Map => "MAP",
            ExprOperator::Record => "RECORD",
            ExprOperator::PropRef => "PROPREF",
            ExprOperator::Index => "INDEX",
            ExprOperator::Add => "ADD",
            ExprOperator::Sub => "SUB",
            ExprOperator::Mult => "MULT",
            ExprOperator::Div => "DIV",
            ExprOperator::Mod => "MOD",
            ExprOperator::Negate => "NEGATE",
            ExprOperator::Not => "NOT",
            ExprOperator::And => "AND",
            ExprOperator::Or => "OR",
            ExprOperator::Eq => "EQ",
            ExprOperator::Neq => "NEQ",
            ExprOperator::Lt => "LT",
            ExprOperator::LtEq => "LTEQ",
            ExprOperator::Gt => "GT",
            ExprOperator::GtEq => "GTEQ",
            ExprOperator::Compare => "COMPARE",
            ExprOperator::IsNull => "IS_NULL",
            ExprOperator::Coalesce => "COALESCE",
            ExprOperator::If => "IF",
            ExprOperator::Local => "LOCAL",
            ExprOperator::Argument => "ARGUMENT",
            ExprOperator::Transform => "TRANSFORM",
            ExprOperator::Length => "LENGTH",
            ExprOperator::Resolve => "RESOLVE",
            ExprOperator::Cast => "CAST",
            ExprOperator::Call => "CALL",
            ExprOperator::Invoke => "INVOKE",
            ExprOperator::Subquery => "SUBQUERY",
        }
    }
}

impl fmt::Display for ExprOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExprOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ExprOperator::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| Error::unrecognized_operator(s))
    }
}

/// Positional argument of an operator node
#[derive(Debug, Clone)]
pub enum Arg {
    Node(OperatorNode),
    Nodes(Vec<OperatorNode>),
    Name(String),
    Names(Vec<String>),
    Value(Value),
    Type(ValueType),
}

/// One node of the operator tree
#[derive(Debug, Clone)]
pub struct OperatorNode {
    pub operator: ExprOperator,
    pub args: Vec<Arg>,
    pub location: Location,
}

impl OperatorNode {
    pub fn new(operator: ExprOperator, args: Vec<Arg>) -> Self {
        Self {
            operator,
            args,
            location: Location::default(),
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn literal(value: Value) -> Self {
        Self::new(ExprOperator::Literal, vec![Arg::Value(value)])
    }

    pub fn null() -> Self {
        Self::new(ExprOperator::Null, Vec::new())
    }

    pub fn unary(operator: ExprOperator, input: OperatorNode) -> Self {
        Self::new(operator, vec![Arg::Node(input)])
    }

    pub fn binary(operator: ExprOperator, left: OperatorNode, right: OperatorNode) -> Self {
        Self::new(operator, vec![Arg::Node(left), Arg::Node(right)])
    }

    /// Operator over a list of operands (ARRAY, AND, OR, COALESCE)
    pub fn list(operator: ExprOperator, items: Vec<OperatorNode>) -> Self {
        Self::new(operator, vec![Arg::Nodes(items)])
    }

    pub fn local(name: &str) -> Self {
        Self::new(ExprOperator::Local, vec![Arg::Name(name.to_string())])
    }

    pub fn argument(name: &str) -> Self {
        Self::new(ExprOperator::Argument, vec![Arg::Name(name.to_string())])
    }

    pub fn property(target: OperatorNode, name: &str) -> Self {
        Self::new(
            ExprOperator::PropRef,
            vec![Arg::Node(target), Arg::Name(name.to_string())],
        )
    }

    /// `[body for name in iterable if body != null]`
    pub fn transform(iterable: OperatorNode, name: &str, body: OperatorNode) -> Self {
        Self::new(
            ExprOperator::Transform,
            vec![Arg::Node(iterable), Arg::Name(name.to_string()), Arg::Node(body)],
        )
    }

    pub fn cast(input: OperatorNode, ty: ValueType) -> Self {
        Self::new(ExprOperator::Cast, vec![Arg::Node(input), Arg::Type(ty)])
    }

    fn arity_error(&self, expected: &str) -> Error {
        let err = Error::invalid_argument(format!(
            "{} expects {}, got {} argument(s)",
            self.operator,
            expected,
            self.args.len()
        ));
        if self.location == Location::default() {
            err
        } else {
            err.at(self.location)
        }
    }

    pub fn node(&self, index: usize) -> Result<&OperatorNode> {
        match self.args.get(index) {
            Some(Arg::Node(n)) => Ok(n),
            _ => Err(self.arity_error(&format!("an operand at position {}", index))),
        }
    }

    pub fn nodes(&self, index: usize) -> Result<&[OperatorNode]> {
        match self.args.get(index) {
            Some(Arg::Nodes(n)) => Ok(n),
            _ => Err(self.arity_error(&format!("an operand list at position {}", index))),
        }
    }

    pub fn name(&self, index: usize) -> Result<&str> {
        match self.args.get(index) {
            Some(Arg::Name(n)) => Ok(n),
            _ => Err(self.arity_error(&format!("a name at position {}", index))),
        }
    }

    pub fn names(&self, index: usize) -> Result<&[String]> {
        match self.args.get(index) {
            Some(Arg::Names(n)) => Ok(n),
            _ => Err(self.arity_error(&format!("a name list at position {}", index))),
        }
    }

    pub fn value(&self, index: usize) -> Result<&Value> {
        match self.args.get(index) {
            Some(Arg::Value(v)) => Ok(v),
            _ => Err(self.arity_error(&format!("a literal at position {}", index))),
        }
    }

    /// Type argument, absent when the node has fewer arguments
    pub fn value_type(&self, index: usize) -> Result<Option<&ValueType>> {
        match self.args.get(index) {
            Some(Arg::Type(t)) => Ok(Some(t)),
            None => Ok(None),
            _ => Err(self.arity_error(&format!("a type at position {}", index))),
        }
    }
}
