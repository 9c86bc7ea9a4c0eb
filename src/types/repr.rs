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

//! Native representations
//!
//! A [`Repr`] is what a value looks like on the machine: a primitive of some
//! width or a reference to an object of a named class. Two types with the same
//! representation and nullability are interchangeable.

use std::fmt;
use std::sync::Arc;

/// Native representation descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Repr {
    Void,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Reference to an object of the named class
    Ref(Arc<str>),
}

/// Stack computational kinds; narrower integers compute as `Int`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumKind {
    Int,
    Long,
    Float,
    Double,
}

impl Repr {
    pub fn reference(class: &str) -> Repr {
        Repr::Ref(Arc::from(class))
    }

    /// The `Object` reference every `any` value uses
    pub fn object() -> Repr {
        Repr::reference("Object")
    }

    /// Number of stack or local slots occupied
    pub fn width(&self) -> u8 {
        match self {
            Repr::Void => 0,
            Repr::Long | Repr::Double => 2,
            _ => 1,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Repr::Ref(_) | Repr::Void)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Repr::Ref(_))
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Repr::Ref(name) => Some(name),
            _ => None,
        }
    }

    pub fn num_kind(&self) -> Option<NumKind> {
        match self {
            Repr::Boolean | Repr::Byte | Repr::Short | Repr::Int => Some(NumKind::Int),
            Repr::Long => Some(NumKind::Long),
            Repr::Float => Some(NumKind::Float),
            Repr::Double => Some(NumKind::Double),
            _ => None,
        }
    }

    /// Compact descriptor used in signatures and disassembly
    pub fn descriptor(&self) -> String {
        match self {
            Repr::Void => "V".to_string(),
            Repr::Boolean => "Z".to_string(),
            Repr::Byte => "B".to_string(),
            Repr::Short => "S".to_string(),
            Repr::Int => "I".to_string(),
            Repr::Long => "J".to_string(),
            Repr::Float => "F".to_string(),
            Repr::Double => "D".to_string(),
            Repr::Ref(name) if name.starts_with('[') => name.to_string(),
            Repr::Ref(name) => format!("L{};", name),
        }
    }
}

impl NumKind {
    pub fn width(&self) -> u8 {
        match self {
            NumKind::Long | NumKind::Double => 2,
            _ => 1,
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, NumKind::Int | NumKind::Long)
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

impl fmt::Display for NumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumKind::Int => "i",
            NumKind::Long => "l",
            NumKind::Float => "f",
            NumKind::Double => "d",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(Repr::Void.width(), 0);
        assert_eq!(Repr::Int.width(), 1);
        assert_eq!(Repr::Double.width(), 2);
        assert_eq!(Repr::object().width(), 1);
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(Repr::Long.descriptor(), "J");
        assert_eq!(Repr::reference("String").descriptor(), "LString;");
        assert_eq!(Repr::reference("[I").descriptor(), "[I");
        assert!(Repr::Boolean.is_primitive());
        assert!(!Repr::object().is_primitive());
    }
}
