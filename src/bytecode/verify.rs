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

// Dataflow verifier for generated methods
//
// Walks every reachable pc tracking operand stack depth in slots. A method
// passes when every merge point sees one depth, no op underflows, every
// label is bound, returns leave exactly the declared width and locals stay
// in range. The largest depth seen becomes the method's max stack.

use thiserror::Error;

use super::ops::{Handler, Op};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("label L{0} is never bound")]
    UnboundLabel(u32),

    #[error("stack underflow at pc {pc}: {op} needs {needed} slots, depth is {depth}")]
    Underflow {
        pc: usize,
        op: String,
        needed: usize,
        depth: usize,
    },

    #[error("stack depth mismatch at pc {pc}: {first} vs {second}")]
    DepthMismatch {
        pc: usize,
        first: usize,
        second: usize,
    },

    #[error("return at pc {pc} leaves {depth} slots, expected {expected}")]
    ReturnWidth {
        pc: usize,
        depth: usize,
        expected: usize,
    },

    #[error("local slot {slot} out of range at pc {pc} (max_locals={max_locals})")]
    LocalOutOfRange { pc: usize, slot: u16, max_locals: u16 },

    #[error("protected region at pc {pc} entered with {depth} slots on the stack")]
    ProtectedDepth { pc: usize, depth: usize },

    #[error("control falls off the end of the method")]
    FallsOffEnd,

    #[error("method has no code")]
    Empty,
}

fn merge(
    pc: usize,
    depth: usize,
    depth_at: &mut [Option<usize>],
    work: &mut Vec<usize>,
) -> Result<(), VerifyError> {
    match depth_at[pc] {
        Some(existing) if existing != depth => Err(VerifyError::DepthMismatch {
            pc,
            first: existing,
            second: depth,
        }),
        Some(_) => Ok(()),
        None => {
            depth_at[pc] = Some(depth);
            work.push(pc);
            Ok(())
        }
    }
}

/// Verify a method body; returns the maximum stack depth
pub fn verify(
    ops: &[Op],
    labels: &[Option<u32>],
    handlers: &[Handler],
    max_locals: u16,
    return_width: usize,
) -> Result<usize, VerifyError> {
    if ops.is_empty() {
        return Err(VerifyError::Empty);
    }
    let mut bound = Vec::with_capacity(labels.len());
    for (id, pc) in labels.iter().enumerate() {
        match pc {
            Some(pc) => bound.push(*pc as usize),
            None => return Err(VerifyError::UnboundLabel(id as u32)),
        }
    }

    let mut depth_at: Vec<Option<usize>> = vec![None; ops.len() + 1];
    let mut work: Vec<usize> = Vec::new();
    let mut max_stack = 0usize;

    merge(0, 0, &mut depth_at, &mut work)?;
    // handlers start with the throwable on an otherwise empty stack
    for h in handlers {
        merge(bound[h.handler.0 as usize], 1, &mut depth_at, &mut work)?;
    }

    while let Some(pc) = work.pop() {
        if pc == ops.len() {
            return Err(VerifyError::FallsOffEnd);
        }
        let op = &ops[pc];
        let depth = depth_at[pc].unwrap_or_default();
        let (pops, pushes) = op.stack_effect();
        if depth < pops {
            return Err(VerifyError::Underflow {
                pc,
                op: format!("{:?}", op),
                needed: pops,
                depth,
            });
        }
        match op {
            Op::Load(slot) | Op::Store(slot) if *slot >= max_locals => {
                return Err(VerifyError::LocalOutOfRange {
                    pc,
                    slot: *slot,
                    max_locals,
                })
            }
            Op::Load2(slot) | Op::Store2(slot) if *slot + 1 >= max_locals => {
                return Err(VerifyError::LocalOutOfRange {
                    pc,
                    slot: *slot,
                    max_locals,
                })
            }
            Op::Return(n) if depth != *n as usize || *n as usize != return_width => {
                return Err(VerifyError::ReturnWidth {
                    pc,
                    depth,
                    expected: return_width,
                })
            }
            _ => {}
        }
        let next = depth - pops + pushes;
        max_stack = max_stack.max(next).max(depth);
        for target in op.branch_targets() {
            merge(bound[target.0 as usize], next, &mut depth_at, &mut work)?;
        }
        if op.falls_through() {
            merge(pc + 1, next, &mut depth_at, &mut work)?;
        }
    }
    // a fault clears the operand stack, so regions must start empty
    for h in handlers {
        let pc = bound[h.start.0 as usize];
        match depth_at.get(pc).copied().flatten() {
            Some(depth) if depth > 0 => return Err(VerifyError::ProtectedDepth { pc, depth }),
            _ => {}
        }
    }
    Ok(max_stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::ops::{Cond, Label};
    use crate::core::Value;

    #[test]
    fn test_straight_line() {
        let ops = vec![
            Op::Const(Value::Int(1)),
            Op::Const(Value::Long(2)),
            Op::Pop(2),
            Op::Return(1),
        ];
        assert_eq!(verify(&ops, &[], &[], 0, 1).unwrap(), 3);
    }

    #[test]
    fn test_mismatched_merge() {
        // one branch pushes a value the other does not
        let ops = vec![
            Op::Const(Value::Int(1)),
            Op::If(Cond::Eq, Label(0)),
            Op::Const(Value::Int(7)),
            Op::Nop,
            Op::Return(0),
        ];
        let err = verify(&ops, &[Some(3)], &[], 0, 0).unwrap_err();
        assert!(matches!(err, VerifyError::DepthMismatch { pc: 3, .. }));
    }

    #[test]
    fn test_unbound_label() {
        let ops = vec![Op::Jump(Label(0))];
        assert_eq!(
            verify(&ops, &[None], &[], 0, 0).unwrap_err(),
            VerifyError::UnboundLabel(0)
        );
    }

    #[test]
    fn test_underflow_and_locals() {
        let err = verify(&[Op::Pop(1), Op::Return(0)], &[], &[], 0, 0).unwrap_err();
        assert!(matches!(err, VerifyError::Underflow { pc: 0, .. }));
        let err = verify(&[Op::Load(3), Op::Return(1)], &[], &[], 2, 1).unwrap_err();
        assert!(matches!(err, VerifyError::LocalOutOfRange { slot: 3, .. }));
    }

    #[test]
    fn test_return_width_and_fall_off() {
        let err = verify(&[Op::Const(Value::Int(1)), Op::Return(1)], &[], &[], 0, 2).unwrap_err();
        assert!(matches!(err, VerifyError::ReturnWidth { .. }));
        let err = verify(&[Op::Nop], &[], &[], 0, 0).unwrap_err();
        assert_eq!(err, VerifyError::FallsOffEnd);
    }

    #[test]
    fn test_protected_region_starts_empty() {
        use crate::bytecode::ops::CatchType;
        // L0 start, L1 end, L2 handler
        let ops = vec![
            Op::Const(Value::Int(1)),
            Op::Const(Value::Int(2)),
            Op::Pop(1),
            Op::Return(1),
            Op::Return(1),
        ];
        let handlers = vec![Handler {
            start: Label(0),
            end: Label(1),
            handler: Label(2),
            catch: CatchType::Any,
        }];
        let labels = [Some(1), Some(3), Some(4)];
        let err = verify(&ops, &labels, &handlers, 0, 1).unwrap_err();
        assert_eq!(err, VerifyError::ProtectedDepth { pc: 1, depth: 1 });

        let labels = [Some(0), Some(3), Some(4)];
        let ops = vec![
            Op::Const(Value::Int(1)),
            Op::Const(Value::Int(2)),
            Op::Pop(1),
            Op::Return(1),
            Op::Return(1),
        ];
        assert_eq!(verify(&ops, &labels, &handlers, 0, 1).unwrap(), 2);
    }
}
