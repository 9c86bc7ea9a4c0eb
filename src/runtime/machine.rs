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

// Stack machine executing verified method bodies
//
// Design goals:
// - Linear dispatch over the op array, one operand stack per activation
// - Faults unwind to the innermost matching handler of the faulting method,
//   then propagate to the caller
// - Two-slot values are pushed as the value followed by `Value::Top`

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::bytecode::{ArithOp, MethodBody, Op};
use crate::core::{Boxed, Object, Value};
use crate::types::{NumKind, Prim};

use super::fault::Fault;
use super::loader::ClassLoader;
use super::natives;

/// Inline operand stack capacity; deeper methods spill to the heap
const STACK_INLINE_CAPACITY: usize = 16;

/// Calls nested deeper than this fault instead of exhausting the host stack
const MAX_CALL_DEPTH: usize = 256;

pub(crate) type Stack = SmallVec<[Value; STACK_INLINE_CAPACITY]>;

/// A static method bound to the loader that owns it
pub struct BoundMethod {
    body: Arc<MethodBody>,
    loader: Arc<ClassLoader>,
}

impl BoundMethod {
    pub fn new(body: Arc<MethodBody>, loader: Arc<ClassLoader>) -> Self {
        Self { body, loader }
    }

    pub fn name(&self) -> &str {
        self.body.name()
    }

    /// Invoke on a fresh machine
    pub fn call(&self, args: Vec<Value>) -> Result<Value, Fault> {
        Machine::new(self.loader.clone()).invoke(&self.body, args)
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundMethod({})", self.body.method)
    }
}

/// Executes methods of one loader on the current thread
pub struct Machine {
    loader: Arc<ClassLoader>,
    depth: Cell<usize>,
}

// =============================================================================
// Operand helpers
// =============================================================================

#[inline]
pub(crate) fn pop(stack: &mut Stack) -> Result<Value, Fault> {
    stack
        .pop()
        .ok_or_else(|| Fault::failed("operand stack underflow"))
}

#[inline]
pub(crate) fn pop_int(stack: &mut Stack) -> Result<i32, Fault> {
    match pop(stack)? {
        Value::Int(v) => Ok(v),
        other => Err(Fault::class_cast("int", other.class_name().as_ref())),
    }
}

/// Pop a two-slot value
#[inline]
pub(crate) fn pop_wide(stack: &mut Stack) -> Result<Value, Fault> {
    pop(stack)?;
    pop(stack)
}

/// Pop `width` slots and return the value they hold
#[inline]
pub(crate) fn pop_sized(stack: &mut Stack, width: u8) -> Result<Value, Fault> {
    match width {
        2 => pop_wide(stack),
        _ => pop(stack),
    }
}

#[inline]
pub(crate) fn push(stack: &mut Stack, value: Value) {
    let wide = value.width() == 2;
    stack.push(value);
    if wide {
        stack.push(Value::Top);
    }
}

/// Pop a non-null reference
#[inline]
pub(crate) fn pop_ref(stack: &mut Stack) -> Result<Value, Fault> {
    let value = pop(stack)?;
    if value.is_null() {
        return Err(Fault::NullPointer);
    }
    Ok(value)
}

fn pop_num(stack: &mut Stack, kind: NumKind) -> Result<Value, Fault> {
    pop_sized(stack, kind.width())
}

fn ordering_int(ord: std::cmp::Ordering) -> Value {
    Value::Int(ord as i32)
}

fn arith(op: ArithOp, kind: NumKind, a: Value, b: Value) -> Result<Value, Fault> {
    let mismatch = || Fault::class_cast(kind.to_string(), "operand");
    Ok(match (kind, a, b) {
        (NumKind::Int, Value::Int(a), Value::Int(b)) => Value::Int(match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div if b == 0 => return Err(Fault::DivideByZero),
            ArithOp::Div => a.wrapping_div(b),
            ArithOp::Rem if b == 0 => return Err(Fault::DivideByZero),
            ArithOp::Rem => a.wrapping_rem(b),
        }),
        (NumKind::Long, Value::Long(a), Value::Long(b)) => Value::Long(match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div if b == 0 => return Err(Fault::DivideByZero),
            ArithOp::Div => a.wrapping_div(b),
            ArithOp::Rem if b == 0 => return Err(Fault::DivideByZero),
            ArithOp::Rem => a.wrapping_rem(b),
        }),
        (NumKind::Float, Value::Float(a), Value::Float(b)) => Value::Float(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Rem => a % b,
        }),
        (NumKind::Double, Value::Double(a), Value::Double(b)) => Value::Double(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Rem => a % b,
        }),
        _ => return Err(mismatch()),
    })
}

fn compare(kind: NumKind, a: Value, b: Value) -> Result<Value, Fault> {
    use std::cmp::Ordering;
    Ok(match (kind, a, b) {
        (NumKind::Int, Value::Int(a), Value::Int(b)) => ordering_int(a.cmp(&b)),
        (NumKind::Long, Value::Long(a), Value::Long(b)) => ordering_int(a.cmp(&b)),
        // NaN compares greater
        (NumKind::Float, Value::Float(a), Value::Float(b)) => {
            ordering_int(a.partial_cmp(&b).unwrap_or(Ordering::Greater))
        }
        (NumKind::Double, Value::Double(a), Value::Double(b)) => {
            ordering_int(a.partial_cmp(&b).unwrap_or(Ordering::Greater))
        }
        _ => return Err(Fault::class_cast(kind.to_string(), "operand")),
    })
}

fn convert(from: NumKind, to: NumKind, v: Value) -> Result<Value, Fault> {
    let as_f64 = match &v {
        Value::Int(i) => *i as f64,
        Value::Long(l) => *l as f64,
        Value::Float(f) => *f as f64,
        Value::Double(d) => *d,
        other => return Err(Fault::class_cast(from.to_string(), other.class_name().as_ref())),
    };
    Ok(match (to, v) {
        (NumKind::Int, Value::Long(l)) => Value::Int(l as i32),
        (NumKind::Int, _) => Value::Int(as_f64 as i32),
        (NumKind::Long, Value::Int(i)) => Value::Long(i as i64),
        (NumKind::Long, Value::Long(l)) => Value::Long(l),
        (NumKind::Long, _) => Value::Long(as_f64 as i64),
        (NumKind::Float, _) => Value::Float(as_f64 as f32),
        (NumKind::Double, _) => Value::Double(as_f64),
    })
}

fn narrow(prim: Prim, v: i32) -> i32 {
    match prim {
        Prim::Boolean => i32::from(v != 0),
        Prim::Int8 => v as i8 as i32,
        Prim::Int16 => v as i16 as i32,
        _ => v,
    }
}

fn box_value(prim: Prim, v: Value) -> Result<Value, Fault> {
    let boxed = match (prim, v) {
        (Prim::Boolean, Value::Int(i)) => Boxed::Boolean(i != 0),
        (Prim::Int8, Value::Int(i)) => Boxed::Byte(i as i8),
        (Prim::Int16, Value::Int(i)) => Boxed::Short(i as i16),
        (Prim::Int32, Value::Int(i)) => Boxed::Int(i),
        (Prim::Int64, Value::Long(l)) => Boxed::Long(l),
        (Prim::Float32, Value::Float(f)) => Boxed::Float(f),
        (Prim::Float64, Value::Double(d)) => Boxed::Double(d),
        (prim, other) => {
            return Err(Fault::class_cast(prim.to_string(), other.class_name().as_ref()))
        }
    };
    Ok(Value::boxed(boxed))
}

pub(crate) fn unbox_value(prim: Prim, v: Value) -> Result<Value, Fault> {
    let b = match &v {
        Value::Null => return Err(Fault::NullPointer),
        Value::Object(Object::Boxed(b)) => *b,
        other => {
            return Err(Fault::class_cast(prim.box_class(), other.class_name().as_ref()))
        }
    };
    let int = || b.as_i64().unwrap_or_else(|| b.as_f64().unwrap_or(0.0) as i64);
    let float = || b.as_f64().unwrap_or(0.0);
    Ok(match prim {
        Prim::Boolean => match b {
            Boxed::Boolean(x) => Value::Int(i32::from(x)),
            _ => Value::Int(i32::from(int() != 0)),
        },
        Prim::Int8 | Prim::Int16 | Prim::Int32 => Value::Int(narrow(prim, int() as i32)),
        Prim::Int64 => Value::Long(int()),
        Prim::Float32 => Value::Float(float() as f32),
        Prim::Float64 => Value::Double(float()),
    })
}

enum Step {
    Next,
    Jump(usize),
    Return(Value),
}

impl Machine {
    pub fn new(loader: Arc<ClassLoader>) -> Self {
        Self {
            loader,
            depth: Cell::new(0),
        }
    }

    pub fn loader(&self) -> &Arc<ClassLoader> {
        &self.loader
    }

    /// Run a method with one value per parameter
    pub fn invoke(&self, body: &Arc<MethodBody>, args: Vec<Value>) -> Result<Value, Fault> {
        let mut slots: Stack = SmallVec::with_capacity(args.len());
        for arg in args {
            push(&mut slots, arg);
        }
        self.run(body, slots)
    }

    fn run(&self, body: &MethodBody, args: Stack) -> Result<Value, Fault> {
        let depth = self.depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(Fault::failed("call depth exceeded"));
        }
        self.depth.set(depth + 1);
        let result = self.execute(body, args);
        self.depth.set(depth);
        result
    }

    fn execute(&self, body: &MethodBody, args: Stack) -> Result<Value, Fault> {
        let mut locals: Vec<Value> = args.into_vec();
        locals.resize(body.max_locals.max(locals.len() as u16) as usize, Value::Null);
        let mut stack: Stack = SmallVec::with_capacity(body.max_stack);
        let mut pc = 0usize;

        loop {
            let op = body
                .ops
                .get(pc)
                .ok_or_else(|| Fault::failed("control fell off the end of a method"))?;
            match self.step(body, op, &mut stack, &mut locals) {
                Ok(Step::Next) => pc += 1,
                Ok(Step::Jump(target)) => pc = target,
                Ok(Step::Return(value)) => return Ok(value),
                Err(fault) => match body.handler_for(pc, &fault) {
                    Some(handler) => {
                        stack.clear();
                        stack.push(Value::throwable(fault));
                        pc = handler;
                    }
                    None => return Err(fault),
                },
            }
        }
    }

    fn step(
        &self,
        body: &MethodBody,
        op: &Op,
        stack: &mut Stack,
        locals: &mut [Value],
    ) -> Result<Step, Fault> {
        match op {
            // =================================================================
            // CONSTANTS AND LOCALS
            // =================================================================
            Op::Nop => {}
            Op::ConstNull => stack.push(Value::Null),
            Op::Const(v) => push(stack, v.clone()),
            Op::Load(slot) => stack.push(locals[*slot as usize].clone()),
            Op::Load2(slot) => push(stack, locals[*slot as usize].clone()),
            Op::Store(slot) => locals[*slot as usize] = pop(stack)?,
            Op::Store2(slot) => {
                locals[*slot as usize] = pop_wide(stack)?;
                locals[*slot as usize + 1] = Value::Top;
            }

            // =================================================================
            // STACK MANIPULATION
            // =================================================================
            Op::Pop(n) => {
                let keep = stack.len().saturating_sub(*n as usize);
                stack.truncate(keep);
            }
            Op::Dup(n) => {
                let start = stack.len().saturating_sub(*n as usize);
                let top: Stack = stack[start..].iter().cloned().collect();
                stack.extend(top);
            }
            Op::DupX(n, under) => {
                let (n, under) = (*n as usize, *under as usize);
                let len = stack.len();
                if len < n + under {
                    return Err(Fault::failed("operand stack underflow"));
                }
                let top: Stack = stack[len - n..].iter().cloned().collect();
                let at = len - n - under;
                stack.insert_many(at, top);
            }
            Op::Swap => {
                let len = stack.len();
                if len < 2 {
                    return Err(Fault::failed("operand stack underflow"));
                }
                stack.swap(len - 1, len - 2);
            }

            // =================================================================
            // ARITHMETIC AND CONVERSION
            // =================================================================
            Op::Arith(op, kind) => {
                let b = pop_num(stack, *kind)?;
                let a = pop_num(stack, *kind)?;
                push(stack, arith(*op, *kind, a, b)?);
            }
            Op::Neg(kind) => {
                let v = match pop_num(stack, *kind)? {
                    Value::Int(i) => Value::Int(i.wrapping_neg()),
                    Value::Long(l) => Value::Long(l.wrapping_neg()),
                    Value::Float(f) => Value::Float(-f),
                    Value::Double(d) => Value::Double(-d),
                    other => {
                        return Err(Fault::class_cast(kind.to_string(), other.class_name().as_ref()))
                    }
                };
                push(stack, v);
            }
            Op::Cmp(kind) => {
                let b = pop_num(stack, *kind)?;
                let a = pop_num(stack, *kind)?;
                push(stack, compare(*kind, a, b)?);
            }
            Op::Convert(from, to) => {
                let v = pop_num(stack, *from)?;
                push(stack, convert(*from, *to, v)?);
            }
            Op::Narrow(prim) => {
                let v = pop_int(stack)?;
                stack.push(Value::Int(narrow(*prim, v)));
            }
            Op::Box(prim) => {
                let v = pop_sized(stack, prim.width())?;
                stack.push(box_value(*prim, v)?);
            }
            Op::Unbox(prim) => {
                let v = pop(stack)?;
                push(stack, unbox_value(*prim, v)?);
            }
            Op::CheckCast(class) => {
                if let Some(Value::Object(o)) = stack.last() {
                    if !o.is_instance_of(class) {
                        return Err(Fault::class_cast(class.as_ref(), o.class_name().as_ref()));
                    }
                }
            }
            Op::InstanceOf(class) => {
                let v = pop(stack)?;
                let is = v.as_object().map(|o| o.is_instance_of(class)).unwrap_or(false);
                stack.push(Value::Int(i32::from(is)));
            }

            // =================================================================
            // CONTROL FLOW
            // =================================================================
            Op::Jump(label) => return Ok(Step::Jump(body.target(*label))),
            Op::If(cond, label) => {
                let v = pop_int(stack)?;
                if cond.test(v.cmp(&0)) {
                    return Ok(Step::Jump(body.target(*label)));
                }
            }
            Op::IfCmp(cond, label) => {
                let b = pop_int(stack)?;
                let a = pop_int(stack)?;
                if cond.test(a.cmp(&b)) {
                    return Ok(Step::Jump(body.target(*label)));
                }
            }
            Op::IfNull(label) => {
                if pop(stack)?.is_null() {
                    return Ok(Step::Jump(body.target(*label)));
                }
            }
            Op::IfNonNull(label) => {
                if !pop(stack)?.is_null() {
                    return Ok(Step::Jump(body.target(*label)));
                }
            }
            Op::LookupSwitch {
                keys,
                targets,
                default,
            } => {
                let key = pop_int(stack)?;
                let label = match keys.binary_search(&key) {
                    Ok(i) => targets[i],
                    Err(_) => *default,
                };
                return Ok(Step::Jump(body.target(label)));
            }
            Op::Throw => {
                let v = pop(stack)?;
                return Err(match v.as_fault() {
                    Some(fault) => fault.clone(),
                    None if v.is_null() => Fault::NullPointer,
                    None => Fault::class_cast("Fault", v.class_name().as_ref()),
                });
            }
            Op::Return(n) => {
                let v = match n {
                    0 => Value::Null,
                    _ => pop_sized(stack, *n)?,
                };
                return Ok(Step::Return(v));
            }

            // =================================================================
            // OBJECTS AND CALLS
            // =================================================================
            Op::New(class) => {
                let class = self.class(class)?;
                stack.push(Value::Object(Object::Instance(Arc::new(class.instantiate()))));
            }
            Op::GetField(field) => {
                let target = pop_ref(stack)?;
                let value = match &target {
                    Value::Object(Object::Instance(inst)) => inst
                        .field(&field.name)
                        .ok_or_else(|| Fault::PropertyNotFound(field.name.to_string()))?,
                    other => return Err(Fault::class_cast(field.class.as_ref(), other.class_name().as_ref())),
                };
                push(stack, value);
            }
            Op::PutField(field) => {
                let value = pop_sized(stack, field.repr.width())?;
                let target = pop_ref(stack)?;
                match &target {
                    Value::Object(Object::Instance(inst)) => {
                        let slot = inst
                            .class()
                            .field_slot(&field.name)
                            .ok_or_else(|| Fault::PropertyNotFound(field.name.to_string()))?;
                        inst.set(slot, value);
                    }
                    other => return Err(Fault::class_cast(field.class.as_ref(), other.class_name().as_ref())),
                }
            }
            Op::GetStatic(field) => {
                let value = self
                    .class(&field.class)?
                    .get_static(&field.name)
                    .ok_or_else(|| Fault::PropertyNotFound(field.to_string()))?;
                push(stack, value);
            }
            Op::PutStatic(field) => {
                let value = pop_sized(stack, field.repr.width())?;
                if !self.class(&field.class)?.set_static(&field.name, value) {
                    return Err(Fault::PropertyNotFound(field.to_string()));
                }
            }
            Op::Invoke(method) => {
                let callee = self.method(&method.class, &method.name)?;
                let at = stack.len().saturating_sub(method.arg_slots());
                let args: Stack = stack.drain(at..).collect();
                let result = self.run(&callee, args)?;
                if method.returns.width() > 0 {
                    push(stack, result);
                }
            }
            Op::Function(method) => {
                let callee = self.method(&method.class, &method.name)?;
                let bound = BoundMethod::new(callee, self.loader.clone());
                stack.push(Value::Object(Object::Function(Arc::new(bound))));
            }
            Op::CallNative(native) => natives::call(native, stack)?,
            Op::InvokeDynamic(site) => site.invoke(self, stack)?,
        }
        Ok(Step::Next)
    }

    fn class(&self, name: &str) -> Result<Arc<super::loader::LoadedClass>, Fault> {
        self.loader
            .class(name)
            .ok_or_else(|| Fault::failed(format!("class {} is not loaded", name)))
    }

    fn method(&self, class: &str, name: &str) -> Result<Arc<MethodBody>, Fault> {
        self.class(class)?
            .method(name)
            .cloned()
            .ok_or_else(|| Fault::failed(format!("method {}.{} is not loaded", class, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Cond, Label, MethodRef};
    use crate::types::Repr;

    fn body(ops: Vec<Op>, labels: Vec<u32>, max_locals: u16) -> Arc<MethodBody> {
        Arc::new(MethodBody {
            method: Arc::new(MethodRef {
                class: Arc::from("test"),
                name: Arc::from("run"),
                params: Vec::new(),
                returns: Repr::object(),
                is_static: true,
            }),
            ops,
            labels,
            handlers: Vec::new(),
            max_locals,
            max_stack: 8,
        })
    }

    fn run(ops: Vec<Op>, labels: Vec<u32>) -> Result<Value, Fault> {
        Machine::new(ClassLoader::new()).invoke(&body(ops, labels, 4), Vec::new())
    }

    #[test]
    fn test_int_addition_wraps() {
        let v = run(
            vec![
                Op::Const(Value::Int(2_000_000_000)),
                Op::Const(Value::Int(2_000_000_000)),
                Op::Arith(ArithOp::Add, NumKind::Int),
                Op::Return(1),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(v, Value::Int(-294_967_296));
    }

    #[test]
    fn test_long_locals_and_division() {
        let v = run(
            vec![
                Op::Const(Value::Long(84)),
                Op::Store2(0),
                Op::Load2(0),
                Op::Const(Value::Long(2)),
                Op::Arith(ArithOp::Div, NumKind::Long),
                Op::Return(2),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(v, Value::Long(42));

        let err = run(
            vec![
                Op::Const(Value::Int(1)),
                Op::Const(Value::Int(0)),
                Op::Arith(ArithOp::Rem, NumKind::Int),
                Op::Return(1),
            ],
            vec![],
        )
        .unwrap_err();
        assert_eq!(err, Fault::DivideByZero);
    }

    #[test]
    fn test_branches_and_switch() {
        // if 3 > 2 then 10 else 20
        let v = run(
            vec![
                Op::Const(Value::Int(3)),
                Op::Const(Value::Int(2)),
                Op::IfCmp(Cond::Gt, Label(0)),
                Op::Const(Value::Int(20)),
                Op::Return(1),
                Op::Const(Value::Int(10)),
                Op::Return(1),
            ],
            vec![5],
        )
        .unwrap();
        assert_eq!(v, Value::Int(10));

        let switch = |key: i32| {
            run(
                vec![
                    Op::Const(Value::Int(key)),
                    Op::LookupSwitch {
                        keys: Arc::from(vec![1, 7]),
                        targets: Arc::from(vec![Label(0), Label(1)]),
                        default: Label(2),
                    },
                    Op::Const(Value::string("one")),
                    Op::Return(1),
                    Op::Const(Value::string("seven")),
                    Op::Return(1),
                    Op::Const(Value::string("other")),
                    Op::Return(1),
                ],
                vec![2, 4, 6],
            )
            .unwrap()
        };
        assert_eq!(switch(7).as_str(), Some("seven"));
        assert_eq!(switch(1).as_str(), Some("one"));
        assert_eq!(switch(3).as_str(), Some("other"));
    }

    #[test]
    fn test_box_unbox_and_casts() {
        let v = run(
            vec![
                Op::Const(Value::Double(1.5)),
                Op::Box(Prim::Float64),
                Op::CheckCast(Arc::from("Double")),
                Op::Unbox(Prim::Float64),
                Op::Convert(NumKind::Double, NumKind::Int),
                Op::Return(1),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(v, Value::Int(1));

        let err = run(
            vec![
                Op::Const(Value::string("x")),
                Op::CheckCast(Arc::from("Integer")),
                Op::Return(1),
            ],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, Fault::ClassCast { .. }));
    }

    #[test]
    fn test_dup_x_swaps_wide_under_narrow() {
        // [long, int] -> [int, long]
        let v = run(
            vec![
                Op::Const(Value::Long(5)),
                Op::Const(Value::Int(1)),
                Op::DupX(1, 2),
                Op::Pop(1),
                Op::Pop(2),
                Op::Return(1),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(v, Value::Int(1));
    }
}
