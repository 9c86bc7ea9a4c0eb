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

//! Core types shared by the compiler and the runtime
//!
//! - [`Value`] - slot-sized runtime values and heap [`Object`]s
//! - [`Error`] - the compile error raised for every rejected program
//! - [`Location`] - source position attached to errors

pub mod error;
pub mod value;

// Re-export main types for convenience
pub use error::{Error, ErrorKind, Location, Result};
pub use value::{Boxed, EnumValue, ListRef, MapRef, Object, TypeTag, Value, ValueKey};

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Errors keep the first location they are given
    #[test]
    fn test_error_location_integration() {
        let err = Error::property_not_found("point", "z")
            .at(Location::new(3, 7))
            .at(Location::new(9, 9));
        assert_eq!(err.location, Some(Location::new(3, 7)));
        assert!(err.to_string().starts_with("L3:7"));
        assert!(!err.is_internal());
    }

    /// Map keys compare by value across boxes
    #[test]
    fn test_value_key_integration() {
        let map = Value::map(vec![(Value::boxed_int(1), Value::string("one"))]);
        let Value::Object(Object::Map(m)) = map else {
            panic!("expected map")
        };
        let found = m.read().get(&ValueKey(Value::Long(1))).cloned();
        assert_eq!(found.and_then(|v| v.as_str().map(String::from)), Some("one".into()));
    }
}
