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

//! Core kinds and primitive classification

use std::fmt;
use std::str::FromStr;

use crate::core::{Error, Result};

use super::repr::{NumKind, Repr};

/// The kind of value a type describes, independent of nullability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CoreKind {
    Void = 0,
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Int64 = 4,
    Float32 = 5,
    Float64 = 6,
    Boolean = 7,
    String = 8,
    Bytes = 9,
    Timestamp = 10,
    Enum = 11,
    Array = 12,
    Sequence = 13,
    Map = 14,
    Struct = 15,
    Promise = 16,
    Result = 17,
    /// Host classes and runtime handles
    Object = 18,
    Any = 19,
}

impl CoreKind {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            CoreKind::Int8 | CoreKind::Int16 | CoreKind::Int32 | CoreKind::Int64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, CoreKind::Float32 | CoreKind::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width rank used to pick the wider of two numeric kinds
    pub fn rank(&self) -> u8 {
        match self {
            CoreKind::Int8 => 1,
            CoreKind::Int16 => 2,
            CoreKind::Int32 => 3,
            CoreKind::Int64 => 4,
            CoreKind::Float32 => 5,
            CoreKind::Float64 => 6,
            _ => 0,
        }
    }

    /// Composite kinds unify through a unification adapter
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            CoreKind::Array
                | CoreKind::Sequence
                | CoreKind::Map
                | CoreKind::Struct
                | CoreKind::Promise
                | CoreKind::Result
        )
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for CoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoreKind::Void => "VOID",
            CoreKind::Int8 => "INT8",
            CoreKind::Int16 => "INT16",
            CoreKind::Int32 => "INT32",
            CoreKind::Int64 => "INT64",
            CoreKind::Float32 => "FLOAT32",
            CoreKind::Float64 => "FLOAT64",
            CoreKind::Boolean => "BOOLEAN",
            CoreKind::String => "STRING",
            CoreKind::Bytes => "BYTES",
            CoreKind::Timestamp => "TIMESTAMP",
            CoreKind::Enum => "ENUM",
            CoreKind::Array => "ARRAY",
            CoreKind::Sequence => "SEQUENCE",
            CoreKind::Map => "MAP",
            CoreKind::Struct => "STRUCT",
            CoreKind::Promise => "PROMISE",
            CoreKind::Result => "RESULT",
            CoreKind::Object => "OBJECT",
            CoreKind::Any => "ANY",
        };
        f.write_str(name)
    }
}

impl FromStr for CoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "VOID" => Ok(CoreKind::Void),
            "INT8" | "BYTE" => Ok(CoreKind::Int8),
            "INT16" | "SHORT" => Ok(CoreKind::Int16),
            "INT32" | "INT" | "INTEGER" => Ok(CoreKind::Int32),
            "INT64" | "LONG" => Ok(CoreKind::Int64),
            "FLOAT32" | "FLOAT" => Ok(CoreKind::Float32),
            "FLOAT64" | "DOUBLE" => Ok(CoreKind::Float64),
            "BOOLEAN" | "BOOL" => Ok(CoreKind::Boolean),
            "STRING" => Ok(CoreKind::String),
            "BYTES" => Ok(CoreKind::Bytes),
            "TIMESTAMP" => Ok(CoreKind::Timestamp),
            "ENUM" => Ok(CoreKind::Enum),
            "ARRAY" => Ok(CoreKind::Array),
            "SEQUENCE" | "LIST" => Ok(CoreKind::Sequence),
            "MAP" => Ok(CoreKind::Map),
            "STRUCT" | "RECORD" => Ok(CoreKind::Struct),
            "PROMISE" => Ok(CoreKind::Promise),
            "RESULT" => Ok(CoreKind::Result),
            "OBJECT" => Ok(CoreKind::Object),
            "ANY" => Ok(CoreKind::Any),
            other => Err(Error::unsupported_type(other)),
        }
    }
}

/// Primitive (unboxed) value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl Prim {
    pub const ALL: [Prim; 7] = [
        Prim::Boolean,
        Prim::Int8,
        Prim::Int16,
        Prim::Int32,
        Prim::Int64,
        Prim::Float32,
        Prim::Float64,
    ];

    pub fn kind(&self) -> CoreKind {
        match self {
            Prim::Boolean => CoreKind::Boolean,
            Prim::Int8 => CoreKind::Int8,
            Prim::Int16 => CoreKind::Int16,
            Prim::Int32 => CoreKind::Int32,
            Prim::Int64 => CoreKind::Int64,
            Prim::Float32 => CoreKind::Float32,
            Prim::Float64 => CoreKind::Float64,
        }
    }

    pub fn from_kind(kind: CoreKind) -> Option<Prim> {
        Prim::ALL.into_iter().find(|p| p.kind() == kind)
    }

    pub fn repr(&self) -> Repr {
        match self {
            Prim::Boolean => Repr::Boolean,
            Prim::Int8 => Repr::Byte,
            Prim::Int16 => Repr::Short,
            Prim::Int32 => Repr::Int,
            Prim::Int64 => Repr::Long,
            Prim::Float32 => Repr::Float,
            Prim::Float64 => Repr::Double,
        }
    }

    /// Stack computational kind
    pub fn num_kind(&self) -> NumKind {
        match self {
            Prim::Boolean | Prim::Int8 | Prim::Int16 | Prim::Int32 => NumKind::Int,
            Prim::Int64 => NumKind::Long,
            Prim::Float32 => NumKind::Float,
            Prim::Float64 => NumKind::Double,
        }
    }

    /// Library class of the boxed form
    pub fn box_class(&self) -> &'static str {
        match self {
            Prim::Boolean => "Boolean",
            Prim::Int8 => "Byte",
            Prim::Int16 => "Short",
            Prim::Int32 => "Integer",
            Prim::Int64 => "Long",
            Prim::Float32 => "Float",
            Prim::Float64 => "Double",
        }
    }

    pub fn from_box_class(name: &str) -> Option<Prim> {
        Prim::ALL.into_iter().find(|p| p.box_class() == name)
    }

    pub fn width(&self) -> u8 {
        self.repr().width()
    }
}

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind().to_string().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(CoreKind::Int16.is_integer());
        assert!(!CoreKind::Int16.is_float());
        assert!(CoreKind::Float32.is_numeric());
        assert!(!CoreKind::Boolean.is_numeric());
        assert!(CoreKind::Int64.rank() > CoreKind::Int32.rank());
        assert!(CoreKind::Sequence.is_composite());
        assert!(!CoreKind::String.is_composite());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("int".parse::<CoreKind>().unwrap(), CoreKind::Int32);
        assert_eq!("LIST".parse::<CoreKind>().unwrap(), CoreKind::Sequence);
        assert!("widget".parse::<CoreKind>().is_err());
    }

    #[test]
    fn test_prim_boxes() {
        for p in Prim::ALL {
            assert_eq!(Prim::from_box_class(p.box_class()), Some(p));
            assert_eq!(Prim::from_kind(p.kind()), Some(p));
        }
        assert_eq!(Prim::Int64.width(), 2);
        assert_eq!(Prim::Int16.num_kind(), NumKind::Int);
    }
}
