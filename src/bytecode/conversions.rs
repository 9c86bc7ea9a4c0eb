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

// Fixed from -> to conversion table
//
// Covers primitive widening and narrowing, boolean <-> numeric and the
// boxing conversions between a primitive and any box class. Anything not
// listed here is handled by the emitter's cast rules.

use crate::types::{NumKind, Prim, Repr};

use super::ops::Op;

fn prim_of(repr: &Repr) -> Option<Prim> {
    match repr {
        Repr::Boolean => Some(Prim::Boolean),
        Repr::Byte => Some(Prim::Int8),
        Repr::Short => Some(Prim::Int16),
        Repr::Int => Some(Prim::Int32),
        Repr::Long => Some(Prim::Int64),
        Repr::Float => Some(Prim::Float32),
        Repr::Double => Some(Prim::Float64),
        Repr::Ref(_) | Repr::Void => None,
    }
}

fn box_of(repr: &Repr) -> Option<Prim> {
    repr.class_name().and_then(Prim::from_box_class)
}

/// Primitive to primitive
fn primitive(from: Prim, to: Prim) -> Vec<Op> {
    if from == to {
        return Vec::new();
    }
    let (fk, tk) = (from.num_kind(), to.num_kind());
    let mut ops = Vec::new();
    if from == Prim::Boolean || to == Prim::Boolean {
        // booleans travel as 0/1 ints
        if fk != NumKind::Int {
            ops.push(Op::Convert(fk, NumKind::Int));
        }
        if to == Prim::Boolean {
            ops.push(Op::Narrow(Prim::Boolean));
        } else if tk != NumKind::Int {
            ops.push(Op::Convert(NumKind::Int, tk));
        }
        return ops;
    }
    if fk != tk {
        ops.push(Op::Convert(fk, tk));
    }
    match to {
        Prim::Int8 | Prim::Int16 if from.kind().rank() > to.kind().rank() => ops.push(Op::Narrow(to)),
        _ => {}
    }
    ops
}

/// Ops converting `source` into `target`, if the table has an entry
pub fn conversion(source: &Repr, target: &Repr) -> Option<Vec<Op>> {
    match (prim_of(source), prim_of(target)) {
        (Some(from), Some(to)) => Some(primitive(from, to)),
        (Some(from), None) => {
            let to = box_of(target)?;
            let mut ops = primitive(from, to);
            ops.push(Op::Box(to));
            Some(ops)
        }
        (None, Some(to)) => {
            let from = box_of(source)?;
            let mut ops = vec![Op::Unbox(from)];
            ops.extend(primitive(from, to));
            Some(ops)
        }
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(from: Repr, to: Repr) -> Option<usize> {
        conversion(&from, &to).map(|ops| ops.len())
    }

    #[test]
    fn test_widening() {
        assert_eq!(count(Repr::Int, Repr::Int), Some(0));
        assert_eq!(count(Repr::Int, Repr::Long), Some(1));
        assert_eq!(count(Repr::Byte, Repr::Int), Some(0));
        assert_eq!(count(Repr::Float, Repr::Double), Some(1));
    }

    #[test]
    fn test_narrowing() {
        let ops = conversion(&Repr::Long, &Repr::Short).unwrap();
        assert!(matches!(ops[0], Op::Convert(NumKind::Long, NumKind::Int)));
        assert!(matches!(ops[1], Op::Narrow(Prim::Int16)));
        assert_eq!(count(Repr::Int, Repr::Byte), Some(1));
    }

    #[test]
    fn test_boolean() {
        assert_eq!(count(Repr::Boolean, Repr::Int), Some(0));
        assert_eq!(count(Repr::Int, Repr::Boolean), Some(1));
        assert_eq!(count(Repr::Double, Repr::Boolean), Some(2));
    }

    #[test]
    fn test_boxing() {
        assert_eq!(count(Repr::Int, Repr::reference("Integer")), Some(1));
        assert_eq!(count(Repr::Int, Repr::reference("Long")), Some(2));
        assert_eq!(count(Repr::reference("Long"), Repr::Int), Some(2));
        assert_eq!(count(Repr::reference("Integer"), Repr::reference("Long")), None);
        assert_eq!(count(Repr::Int, Repr::reference("String")), None);
    }
}
