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

// Runtime faults raised by generated code

use thiserror::Error;

use crate::bytecode::CatchType;

/// A throwable raised while a compiled program runs
///
/// Faults unwind the machine until a handler region whose catch filter
/// accepts them is found. Uncaught faults surface from
/// `EntryPoint::invoke`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Fault {
    #[error("null reference")]
    NullPointer,

    #[error("cannot cast {found} to {expected}")]
    ClassCast { expected: String, found: String },

    #[error("value of type {type_name} is not comparable (L{line}:{offset})")]
    NotComparable {
        type_name: String,
        line: i32,
        offset: i32,
    },

    #[error("property '{0}' not found")]
    PropertyNotFound(String),

    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("division by zero")]
    DivideByZero,

    #[error("timeout exceeded")]
    Timeout,

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),
}

/// Discriminant of a [`Fault`], used as a catch filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    NullPointer,
    ClassCast,
    NotComparable,
    PropertyNotFound,
    IndexOutOfBounds,
    DivideByZero,
    Timeout,
    Unsupported,
    Failed,
}

impl Fault {
    pub fn class_cast(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Fault::ClassCast {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Fault::Unsupported(what.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Fault::Failed(message.into())
    }

    /// A fault of the given kind with a generic payload
    pub fn of_kind(kind: FaultKind) -> Self {
        match kind {
            FaultKind::NullPointer => Fault::NullPointer,
            FaultKind::ClassCast => Fault::class_cast("?", "?"),
            FaultKind::NotComparable => Fault::NotComparable {
                type_name: "?".into(),
                line: -1,
                offset: 0,
            },
            FaultKind::PropertyNotFound => Fault::PropertyNotFound("?".into()),
            FaultKind::IndexOutOfBounds => Fault::IndexOutOfBounds {
                index: -1,
                length: 0,
            },
            FaultKind::DivideByZero => Fault::DivideByZero,
            FaultKind::Timeout => Fault::Timeout,
            FaultKind::Unsupported => Fault::unsupported("operation"),
            FaultKind::Failed => Fault::failed("failed"),
        }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::NullPointer => FaultKind::NullPointer,
            Fault::ClassCast { .. } => FaultKind::ClassCast,
            Fault::NotComparable { .. } => FaultKind::NotComparable,
            Fault::PropertyNotFound(_) => FaultKind::PropertyNotFound,
            Fault::IndexOutOfBounds { .. } => FaultKind::IndexOutOfBounds,
            Fault::DivideByZero => FaultKind::DivideByZero,
            Fault::Timeout => FaultKind::Timeout,
            Fault::Unsupported(_) => FaultKind::Unsupported,
            Fault::Failed(_) => FaultKind::Failed,
        }
    }

    /// Whether a handler with this catch filter accepts the fault
    pub fn caught_by(&self, catch: CatchType) -> bool {
        match catch {
            CatchType::Any => true,
            CatchType::Fault(kind) => self.kind() == kind,
        }
    }
}

/// String hash with 32-bit wraparound over UTF-16 code units
///
/// Generated string switches bucket on this value, so it must agree
/// between emission and execution.
pub fn java_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_filters() {
        let fault = Fault::DivideByZero;
        assert!(fault.caught_by(CatchType::Any));
        assert!(fault.caught_by(CatchType::Fault(FaultKind::DivideByZero)));
        assert!(!fault.caught_by(CatchType::Fault(FaultKind::Timeout)));
    }

    #[test]
    fn test_of_kind_round_trips_kind() {
        for kind in [
            FaultKind::NullPointer,
            FaultKind::ClassCast,
            FaultKind::NotComparable,
            FaultKind::PropertyNotFound,
            FaultKind::IndexOutOfBounds,
            FaultKind::DivideByZero,
            FaultKind::Timeout,
            FaultKind::Unsupported,
            FaultKind::Failed,
        ] {
            assert_eq!(Fault::of_kind(kind).kind(), kind);
        }
    }

    #[test]
    fn test_hash_collisions() {
        assert_eq!(java_hash(""), 0);
        assert_eq!(java_hash("a"), 97);
        assert_eq!(java_hash("Aa"), java_hash("BB"));
        assert_ne!(java_hash("AB"), java_hash("BA"));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Fault::class_cast("String", "Integer").to_string(),
            "cannot cast Integer to String"
        );
        assert_eq!(
            Fault::PropertyNotFound("x".into()).to_string(),
            "property 'x' not found"
        );
    }
}
