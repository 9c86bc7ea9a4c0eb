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

//! Error types for Tessera
//!
//! Every compile-time failure is reported as one [`Error`]: an optional source
//! location plus an [`ErrorKind`]. Faults raised while *running* generated code
//! live in [`crate::runtime::Fault`].

use std::fmt;

use thiserror::Error;

/// Result type alias for compiler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Position of an operator node in the query source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub line: i32,
    pub offset: i32,
}

impl Location {
    pub fn new(line: i32, offset: i32) -> Self {
        Self { line, offset }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}:{}", self.line, self.offset)
    }
}

fn location_prefix(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!("{}: ", loc),
        None => String::new(),
    }
}

/// Program compile error
///
/// Carries the location of the operator being compiled when one is known.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{kind}", location_prefix(.location))]
pub struct Error {
    pub location: Option<Location>,
    pub kind: ErrorKind,
}

/// The reason compilation failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    // =========================================================================
    // Type errors
    // =========================================================================
    /// A native or external type could not be adapted
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// `unify` called on an empty list
    #[error("cannot unify an empty list of types")]
    EmptyTypeList,

    /// Field lookup on a closed type failed
    #[error("property '{property}' not found on {type_name}")]
    PropertyNotFound { type_name: String, property: String },

    /// No conversion exists between the two representations
    #[error("cannot cast {from} to {to}")]
    IncompatibleCast { to: String, from: String },

    /// The type has no iterate capability
    #[error("type {0} is not iterable")]
    NotIterable(String),

    /// The type has no index capability
    #[error("type {0} is not indexable")]
    NotIndexable(String),

    // =========================================================================
    // Program structure errors
    // =========================================================================
    /// Two units were registered under one name
    #[error("unit '{0}' already exists")]
    DuplicateUnit(String),

    /// Operator tag the lowering does not know how to compile
    #[error("unrecognized operator: {0}")]
    UnrecognizedOperator(String),

    /// Wrong arity or argument shape on an operator node
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Units or the pipeline were used after the one-shot build
    #[error("class source has already been built")]
    AlreadyBuilt,

    // =========================================================================
    // Internal errors
    // =========================================================================
    /// Verification or link failure; a code generation bug
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            location: None,
            kind,
        }
    }

    /// Attach a location unless one is already present
    pub fn at(mut self, location: Location) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    pub fn unsupported_type(what: impl Into<String>) -> Self {
        Error::new(ErrorKind::UnsupportedType(what.into()))
    }

    pub fn property_not_found(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Error::new(ErrorKind::PropertyNotFound {
            type_name: type_name.into(),
            property: property.into(),
        })
    }

    pub fn incompatible_cast(target: impl fmt::Display, source: impl fmt::Display) -> Self {
        Error::new(ErrorKind::IncompatibleCast {
            to: target.to_string(),
            from: source.to_string(),
        })
    }

    pub fn not_iterable(type_name: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotIterable(type_name.into()))
    }

    pub fn not_indexable(type_name: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotIndexable(type_name.into()))
    }

    pub fn unrecognized_operator(name: impl Into<String>) -> Self {
        Error::new(ErrorKind::UnrecognizedOperator(name.into()))
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument(message.into()))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Internal(message.into()))
    }

    /// Check if this error signals a bug in the compiler itself
    pub fn is_internal(&self) -> bool {
        matches!(self.kind, ErrorKind::Internal(_))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::new(ErrorKind::EmptyTypeList).to_string(),
            "cannot unify an empty list of types"
        );
        assert_eq!(
            Error::incompatible_cast("int32", "string").to_string(),
            "cannot cast string to int32"
        );
    }

    #[test]
    fn test_location_prefix() {
        let err = Error::property_not_found("struct_1", "c").at(Location::new(3, 14));
        assert_eq!(err.to_string(), "L3:14: property 'c' not found on struct_1");

        // the innermost location wins
        let err = err.at(Location::new(1, 1));
        assert_eq!(err.location, Some(Location::new(3, 14)));
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::internal("bad stack").is_internal());
        assert!(!Error::unsupported_type("opaque").is_internal());
        assert_eq!(
            Error::from(ErrorKind::AlreadyBuilt),
            Error::new(ErrorKind::AlreadyBuilt)
        );
    }
}
