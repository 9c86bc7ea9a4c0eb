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

// Instruction set for generated methods
//
// Values occupy slots; `Long` and `Double` occupy two. Every operation has
// a fixed stack effect in slots, which the verifier checks and the machine
// relies on. Jump targets are labels resolved through the method's label
// table.

use std::fmt;
use std::sync::Arc;

use crate::core::Value;
use crate::runtime::{CallSite, FaultKind};
use crate::types::{NumKind, Prim, Repr};

/// A jump target, bound to a pc once the method is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// Binary arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Branch conditions; `If` compares against zero, `IfCmp` compares two ints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Cond {
    pub fn test(&self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Cond::Eq => ord == Equal,
            Cond::Ne => ord != Equal,
            Cond::Lt => ord == Less,
            Cond::Ge => ord != Less,
            Cond::Gt => ord == Greater,
            Cond::Le => ord != Greater,
        }
    }

    pub fn negate(&self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Ge => Cond::Lt,
            Cond::Gt => Cond::Le,
            Cond::Le => Cond::Gt,
        }
    }
}

/// Reference to a method of a generated unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class: Arc<str>,
    pub name: Arc<str>,
    pub params: Vec<Repr>,
    pub returns: Repr,
    pub is_static: bool,
}

impl MethodRef {
    /// Slots consumed by a call, receiver included
    pub fn arg_slots(&self) -> usize {
        let params: usize = self.params.iter().map(|p| p.width() as usize).sum();
        params + usize::from(!self.is_static)
    }

    pub fn descriptor(&self) -> String {
        let params: String = self.params.iter().map(Repr::descriptor).collect();
        format!("({}){}", params, self.returns.descriptor())
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class, self.name, self.descriptor())
    }
}

/// Reference to a field of a generated unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub class: Arc<str>,
    pub name: Arc<str>,
    pub repr: Repr,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.repr.descriptor())
    }
}

/// Exception handler catch filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatchType {
    Any,
    Fault(FaultKind),
}

/// A protected region of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    pub catch: CatchType,
}

/// Runtime library calls
///
/// Stack effects are listed as `[args] -> [results]`; every argument and
/// result is one reference slot unless noted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Native {
    /// [] -> [list]
    NewList,
    /// [list, item] -> []
    ListAdd,
    /// [list, index:int] -> [item]
    ListGet,
    /// [list, index:int, item] -> []
    ListSet,
    /// [container] -> [size:int]; lists, maps, records, strings, bytes
    Length,
    /// [] -> [map]
    NewMap,
    /// [map, key, value] -> []
    MapPut,
    /// [map, key] -> [value]
    MapGet,
    /// [] -> [record]
    NewRecord,
    /// [record, name, value] -> []
    RecordPut,
    /// [record, name] -> [value]
    RecordGet,
    /// [a, b] -> [bool:int]
    StringEquals,
    /// [s] -> [s]
    StringUpper,
    /// [s] -> [hash:int]
    StringHash,
    /// [a, b] -> [s]
    StringConcat,
    /// [a, b] -> [bool:int]
    ObjectEquals,
    /// [a, b] -> [ordering:int]; faults when either lacks an ordering
    ObjectCompare { line: i32, offset: i32 },
    /// [value] -> [outcome]
    OutcomeSuccess,
    /// [throwable] -> [outcome]
    OutcomeFailure,
    /// [outcome] -> [value]; rethrows a captured fault
    OutcomeValue,
    /// [promise, timeout] -> [value]
    PromiseGet,
    /// [promise, function] -> [promise]
    PromiseThen,
    /// [timeout] -> []
    TimeoutCheck,
    /// [name] -> [throwable]
    PropertyNotFound,
    /// [] -> [throwable]
    NewFault(FaultKind),
}

impl Native {
    /// (slots popped, slots pushed)
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Native::NewList | Native::NewMap | Native::NewRecord | Native::NewFault(_) => (0, 1),
            Native::ListAdd => (2, 0),
            Native::ListGet => (2, 1),
            Native::ListSet => (3, 0),
            Native::Length => (1, 1),
            Native::MapPut | Native::RecordPut => (3, 0),
            Native::MapGet | Native::RecordGet => (2, 1),
            Native::StringEquals
            | Native::StringConcat
            | Native::ObjectEquals
            | Native::ObjectCompare { .. } => (2, 1),
            Native::StringUpper | Native::StringHash => (1, 1),
            Native::OutcomeSuccess | Native::OutcomeFailure | Native::OutcomeValue => (1, 1),
            Native::PromiseGet | Native::PromiseThen => (2, 1),
            Native::TimeoutCheck => (1, 0),
            Native::PropertyNotFound => (1, 1),
        }
    }
}

/// Machine operation
#[derive(Clone)]
pub enum Op {
    // =========================================================================
    // CONSTANTS AND LOCALS
    // =========================================================================
    Nop,
    /// Stack: [] -> [null]
    ConstNull,
    /// Inline literal; wide literals push two slots
    Const(Value),
    /// Load a one-slot local
    Load(u16),
    /// Load a two-slot local
    Load2(u16),
    Store(u16),
    Store2(u16),

    // =========================================================================
    // STACK MANIPULATION (slot counts)
    // =========================================================================
    /// Drop the top `n` slots
    Pop(u8),
    /// Duplicate the top `n` slots
    Dup(u8),
    /// Copy the top `n` slots beneath the next `under` slots
    DupX(u8, u8),
    /// Exchange two one-slot values
    Swap,

    // =========================================================================
    // ARITHMETIC AND CONVERSION
    // =========================================================================
    Arith(ArithOp, NumKind),
    Neg(NumKind),
    /// Three-way compare; pushes -1, 0 or 1
    Cmp(NumKind),
    Convert(NumKind, NumKind),
    /// Truncate an int to a narrower primitive
    Narrow(Prim),
    Box(Prim),
    Unbox(Prim),
    CheckCast(Arc<str>),
    /// Stack: [ref] -> [bool:int]
    InstanceOf(Arc<str>),

    // =========================================================================
    // CONTROL FLOW
    // =========================================================================
    Jump(Label),
    If(Cond, Label),
    IfCmp(Cond, Label),
    IfNull(Label),
    IfNonNull(Label),
    /// Keys are sorted ascending
    LookupSwitch {
        keys: Arc<[i32]>,
        targets: Arc<[Label]>,
        default: Label,
    },
    Throw,
    /// Return the top `n` slots
    Return(u8),

    // =========================================================================
    // OBJECTS AND CALLS
    // =========================================================================
    New(Arc<str>),
    GetField(Arc<FieldRef>),
    PutField(Arc<FieldRef>),
    GetStatic(Arc<FieldRef>),
    PutStatic(Arc<FieldRef>),
    Invoke(Arc<MethodRef>),
    /// Push a function handle for a static method
    Function(Arc<MethodRef>),
    CallNative(Native),
    InvokeDynamic(Arc<CallSite>),
}

impl Op {
    /// (slots popped, slots pushed)
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Op::Nop | Op::Jump(_) => (0, 0),
            Op::ConstNull => (0, 1),
            Op::Const(v) => (0, v.width()),
            Op::Load(_) => (0, 1),
            Op::Load2(_) => (0, 2),
            Op::Store(_) => (1, 0),
            Op::Store2(_) => (2, 0),
            Op::Pop(n) => (*n as usize, 0),
            Op::Dup(n) => (*n as usize, 2 * *n as usize),
            Op::DupX(n, under) => {
                let (n, u) = (*n as usize, *under as usize);
                (n + u, 2 * n + u)
            }
            Op::Swap => (2, 2),
            Op::Arith(_, k) => (2 * k.width() as usize, k.width() as usize),
            Op::Neg(k) => (k.width() as usize, k.width() as usize),
            Op::Cmp(k) => (2 * k.width() as usize, 1),
            Op::Convert(from, to) => (from.width() as usize, to.width() as usize),
            Op::Narrow(_) => (1, 1),
            Op::Box(p) => (p.width() as usize, 1),
            Op::Unbox(p) => (1, p.width() as usize),
            Op::CheckCast(_) | Op::InstanceOf(_) => (1, 1),
            Op::If(_, _) | Op::IfNull(_) | Op::IfNonNull(_) => (1, 0),
            Op::IfCmp(_, _) => (2, 0),
            Op::LookupSwitch { .. } => (1, 0),
            Op::Throw => (1, 0),
            Op::Return(n) => (*n as usize, 0),
            Op::New(_) => (0, 1),
            Op::GetField(f) => (1, f.repr.width() as usize),
            Op::PutField(f) => (1 + f.repr.width() as usize, 0),
            Op::GetStatic(f) => (0, f.repr.width() as usize),
            Op::PutStatic(f) => (f.repr.width() as usize, 0),
            Op::Invoke(m) => (m.arg_slots(), m.returns.width() as usize),
            Op::Function(_) => (0, 1),
            Op::CallNative(n) => n.stack_effect(),
            Op::InvokeDynamic(site) => site.op().stack_effect(),
        }
    }

    /// Labels this op may transfer control to
    pub fn branch_targets(&self) -> Vec<Label> {
        match self {
            Op::Jump(l) | Op::If(_, l) | Op::IfCmp(_, l) | Op::IfNull(l) | Op::IfNonNull(l) => {
                vec![*l]
            }
            Op::LookupSwitch {
                targets, default, ..
            } => {
                let mut all: Vec<Label> = targets.to_vec();
                all.push(*default);
                all
            }
            _ => Vec::new(),
        }
    }

    /// Whether execution can continue at the next pc
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Op::Jump(_) | Op::LookupSwitch { .. } | Op::Throw | Op::Return(_)
        )
    }

    /// Class referenced by this op, for link-time resolution
    pub fn referenced_class(&self) -> Option<&str> {
        match self {
            Op::New(c) | Op::CheckCast(c) | Op::InstanceOf(c) => Some(c),
            Op::GetField(f) | Op::PutField(f) | Op::GetStatic(f) | Op::PutStatic(f) => {
                Some(&f.class)
            }
            Op::Invoke(m) | Op::Function(m) => Some(&m.class),
            _ => None,
        }
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Nop => write!(f, "Nop"),
            Op::ConstNull => write!(f, "ConstNull"),
            Op::Const(v) => write!(f, "Const({})", v),
            Op::Load(s) => write!(f, "Load({})", s),
            Op::Load2(s) => write!(f, "Load2({})", s),
            Op::Store(s) => write!(f, "Store({})", s),
            Op::Store2(s) => write!(f, "Store2({})", s),
            Op::Pop(n) => write!(f, "Pop({})", n),
            Op::Dup(n) => write!(f, "Dup({})", n),
            Op::DupX(n, u) => write!(f, "DupX({}, {})", n, u),
            Op::Swap => write!(f, "Swap"),
            Op::Arith(op, k) => write!(f, "{:?}.{}", op, k),
            Op::Neg(k) => write!(f, "Neg.{}", k),
            Op::Cmp(k) => write!(f, "Cmp.{}", k),
            Op::Convert(a, b) => write!(f, "{}2{}", a, b),
            Op::Narrow(p) => write!(f, "Narrow({})", p),
            Op::Box(p) => write!(f, "Box({})", p),
            Op::Unbox(p) => write!(f, "Unbox({})", p),
            Op::CheckCast(c) => write!(f, "CheckCast({})", c),
            Op::InstanceOf(c) => write!(f, "InstanceOf({})", c),
            Op::Jump(l) => write!(f, "Jump(L{})", l.0),
            Op::If(c, l) => write!(f, "If{:?}(L{})", c, l.0),
            Op::IfCmp(c, l) => write!(f, "IfCmp{:?}(L{})", c, l.0),
            Op::IfNull(l) => write!(f, "IfNull(L{})", l.0),
            Op::IfNonNull(l) => write!(f, "IfNonNull(L{})", l.0),
            Op::LookupSwitch {
                keys,
                targets,
                default,
            } => {
                write!(f, "LookupSwitch {{")?;
                for (k, t) in keys.iter().zip(targets.iter()) {
                    write!(f, " {} -> L{},", k, t.0)?;
                }
                write!(f, " default -> L{} }}", default.0)
            }
            Op::Throw => write!(f, "Throw"),
            Op::Return(n) => write!(f, "Return({})", n),
            Op::New(c) => write!(f, "New({})", c),
            Op::GetField(r) => write!(f, "GetField({})", r),
            Op::PutField(r) => write!(f, "PutField({})", r),
            Op::GetStatic(r) => write!(f, "GetStatic({})", r),
            Op::PutStatic(r) => write!(f, "PutStatic({})", r),
            Op::Invoke(m) => write!(f, "Invoke({})", m),
            Op::Function(m) => write!(f, "Function({})", m),
            Op::CallNative(n) => write!(f, "CallNative({:?})", n),
            Op::InvokeDynamic(site) => write!(f, "InvokeDynamic({:?})", site.op()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_effects() {
        assert_eq!(Op::Const(Value::Long(1)).stack_effect(), (0, 2));
        assert_eq!(Op::Arith(ArithOp::Add, NumKind::Double).stack_effect(), (4, 2));
        assert_eq!(Op::Cmp(NumKind::Long).stack_effect(), (4, 1));
        assert_eq!(Op::Convert(NumKind::Int, NumKind::Long).stack_effect(), (1, 2));
        assert_eq!(Op::DupX(1, 2).stack_effect(), (3, 4));
        assert_eq!(Op::Box(Prim::Float64).stack_effect(), (2, 1));
    }

    #[test]
    fn test_method_ref_slots() {
        let m = MethodRef {
            class: Arc::from("program"),
            name: Arc::from("f"),
            params: vec![Repr::Long, Repr::object()],
            returns: Repr::Int,
            is_static: false,
        };
        assert_eq!(m.arg_slots(), 4);
        assert_eq!(m.descriptor(), "(JLObject;)I");
    }

    #[test]
    fn test_cond_negate() {
        use std::cmp::Ordering;
        for c in [Cond::Eq, Cond::Ne, Cond::Lt, Cond::Ge, Cond::Gt, Cond::Le] {
            for o in [Ordering::Less, Ordering::Equal, Ordering::Greater] {
                assert_ne!(c.test(o), c.negate().test(o));
            }
        }
    }

    #[test]
    fn test_control_flow_shape() {
        assert!(!Op::Jump(Label(0)).falls_through());
        assert!(Op::IfNull(Label(0)).falls_through());
        let switch = Op::LookupSwitch {
            keys: Arc::from(vec![1, 2]),
            targets: Arc::from(vec![Label(1), Label(2)]),
            default: Label(3),
        };
        assert_eq!(switch.branch_targets().len(), 3);
    }
}
