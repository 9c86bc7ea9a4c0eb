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

// Runtime library calls made through `Op::CallNative`

use std::cmp::Ordering;
use std::sync::Arc;

use crate::bytecode::Native;
use crate::core::{Object, Value, ValueKey};

use super::fault::{java_hash, Fault};
use super::machine::{pop, pop_int, pop_ref, Stack};
use super::outcome::Outcome;
use super::record::{FieldWriter, Record};

fn expect_string(v: &Value) -> Result<Arc<str>, Fault> {
    match v {
        Value::Object(Object::String(s)) => Ok(s.clone()),
        Value::Null => Err(Fault::NullPointer),
        other => Err(Fault::class_cast("String", other.class_name().as_ref())),
    }
}

fn expect_record(v: &Value) -> Result<&Record, Fault> {
    match v {
        Value::Object(Object::Record(r)) => Ok(r),
        Value::Null => Err(Fault::NullPointer),
        other => Err(Fault::class_cast("Record", other.class_name().as_ref())),
    }
}

fn bounds(index: i64, length: usize) -> Result<usize, Fault> {
    if index < 0 || index as usize >= length {
        return Err(Fault::IndexOutOfBounds { index, length });
    }
    Ok(index as usize)
}

fn length(v: &Value) -> Result<i32, Fault> {
    let len = match v {
        Value::Null => return Err(Fault::NullPointer),
        Value::Object(Object::List(items)) => items.read().len(),
        Value::Object(Object::Map(map)) => map.read().len(),
        Value::Object(Object::Record(r)) => r.len(),
        Value::Object(Object::String(s)) => s.chars().count(),
        Value::Object(Object::Bytes(b)) => b.len(),
        Value::Object(Object::Instance(i)) => i.class().field_count(),
        other => {
            return Err(Fault::unsupported(format!(
                "length of {}",
                other.class_name()
            )))
        }
    };
    Ok(len as i32)
}

/// Execute one native call against the operand stack
pub(crate) fn call(native: &Native, stack: &mut Stack) -> Result<(), Fault> {
    match native {
        // =====================================================================
        // Lists and maps
        // =====================================================================
        Native::NewList => stack.push(Value::list(Vec::new())),
        Native::ListAdd => {
            let item = pop(stack)?;
            match pop_ref(stack)? {
                Value::Object(Object::List(items)) => items.write().push(item),
                other => return Err(Fault::class_cast("List", other.class_name().as_ref())),
            }
        }
        Native::ListGet => {
            let index = pop_int(stack)?;
            match pop_ref(stack)? {
                Value::Object(Object::List(items)) => {
                    let items = items.read();
                    let i = bounds(index as i64, items.len())?;
                    stack.push(items[i].clone());
                }
                other => return Err(Fault::class_cast("List", other.class_name().as_ref())),
            }
        }
        Native::ListSet => {
            let item = pop(stack)?;
            let index = pop_int(stack)?;
            match pop_ref(stack)? {
                Value::Object(Object::List(items)) => {
                    let mut items = items.write();
                    let i = bounds(index as i64, items.len())?;
                    items[i] = item;
                }
                other => return Err(Fault::class_cast("List", other.class_name().as_ref())),
            }
        }
        Native::Length => {
            let v = pop(stack)?;
            stack.push(Value::Int(length(&v)?));
        }
        Native::NewMap => stack.push(Value::map(Vec::new())),
        Native::MapPut => {
            let value = pop(stack)?;
            let key = pop(stack)?;
            match pop_ref(stack)? {
                Value::Object(Object::Map(map)) => {
                    map.write().insert(ValueKey(key), value);
                }
                other => return Err(Fault::class_cast("Map", other.class_name().as_ref())),
            }
        }
        Native::MapGet => {
            let key = pop(stack)?;
            match pop_ref(stack)? {
                Value::Object(Object::Map(map)) => {
                    let value = map.read().get(&ValueKey(key)).cloned().unwrap_or_default();
                    stack.push(value);
                }
                other => return Err(Fault::class_cast("Map", other.class_name().as_ref())),
            }
        }

        // =====================================================================
        // Records
        // =====================================================================
        Native::NewRecord => stack.push(Value::Object(Object::Record(Record::new()))),
        Native::RecordPut => {
            let value = pop(stack)?;
            let name = expect_string(&pop(stack)?)?;
            let record = pop(stack)?;
            expect_record(&record)?.put(&name, value);
        }
        Native::RecordGet => {
            let name = expect_string(&pop(stack)?)?;
            let record = pop(stack)?;
            let value = expect_record(&record)?.get(&name).unwrap_or_default();
            stack.push(value);
        }

        // =====================================================================
        // Strings and comparison
        // =====================================================================
        Native::StringEquals => {
            let b = pop(stack)?;
            let a = pop(stack)?;
            let eq = match (a.as_str(), b.as_str()) {
                (Some(a), Some(b)) => a == b,
                _ => a.is_null() && b.is_null(),
            };
            stack.push(Value::Int(i32::from(eq)));
        }
        Native::StringUpper => {
            let s = expect_string(&pop(stack)?)?;
            stack.push(Value::string(s.to_uppercase()));
        }
        Native::StringHash => {
            let s = expect_string(&pop(stack)?)?;
            stack.push(Value::Int(java_hash(&s)));
        }
        Native::StringConcat => {
            let b = pop(stack)?;
            let a = pop(stack)?;
            let text = |v: &Value| match v.as_str() {
                Some(s) => s.to_string(),
                None => v.to_string(),
            };
            stack.push(Value::string(format!("{}{}", text(&a), text(&b))));
        }
        Native::ObjectEquals => {
            let b = pop(stack)?;
            let a = pop(stack)?;
            stack.push(Value::Int(i32::from(a.equals(&b))));
        }
        Native::ObjectCompare { line, offset } => {
            let b = pop_ref(stack)?;
            let a = pop_ref(stack)?;
            let ord = a.compare(&b).ok_or_else(|| {
                // report whichever side lacks an ordering
                let culprit = if a.compare(&a).is_none() { &a } else { &b };
                Fault::NotComparable {
                    type_name: culprit.class_name().to_string(),
                    line: *line,
                    offset: *offset,
                }
            })?;
            stack.push(Value::Int(match ord {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }));
        }

        // =====================================================================
        // Outcomes, promises and timeouts
        // =====================================================================
        Native::OutcomeSuccess => {
            let v = pop(stack)?;
            stack.push(Value::Object(Object::Outcome(Arc::new(Outcome::Success(v)))));
        }
        Native::OutcomeFailure => {
            let v = pop(stack)?;
            let fault = v.as_fault().cloned().unwrap_or(Fault::NullPointer);
            stack.push(Value::Object(Object::Outcome(Arc::new(Outcome::Failure(fault)))));
        }
        Native::OutcomeValue => match pop_ref(stack)? {
            Value::Object(Object::Outcome(o)) => stack.push(o.as_ref().clone().into_result()?),
            other => return Err(Fault::class_cast("Outcome", other.class_name().as_ref())),
        },
        Native::PromiseGet => {
            let timeout = match pop_ref(stack)? {
                Value::Object(Object::Timeout(t)) => t,
                other => return Err(Fault::class_cast("Timeout", other.class_name().as_ref())),
            };
            match pop_ref(stack)? {
                Value::Object(Object::Promise(p)) => stack.push(p.get(&timeout)?),
                other => return Err(Fault::class_cast("Promise", other.class_name().as_ref())),
            }
        }
        Native::PromiseThen => {
            let function = match pop_ref(stack)? {
                Value::Object(Object::Function(f)) => f,
                other => return Err(Fault::class_cast("Function", other.class_name().as_ref())),
            };
            match pop_ref(stack)? {
                Value::Object(Object::Promise(p)) => {
                    let next = p.then(move |v| function.call(vec![v]));
                    stack.push(Value::Object(Object::Promise(next)));
                }
                other => return Err(Fault::class_cast("Promise", other.class_name().as_ref())),
            }
        }
        Native::TimeoutCheck => match pop_ref(stack)? {
            Value::Object(Object::Timeout(t)) => t.check()?,
            other => return Err(Fault::class_cast("Timeout", other.class_name().as_ref())),
        },

        // =====================================================================
        // Faults
        // =====================================================================
        Native::PropertyNotFound => {
            let name = pop(stack)?;
            let name = name.as_str().map(String::from).unwrap_or_else(|| name.to_string());
            stack.push(Value::throwable(Fault::PropertyNotFound(name)));
        }
        Native::NewFault(kind) => stack.push(Value::throwable(Fault::of_kind(*kind))),
    }
    Ok(())
}
