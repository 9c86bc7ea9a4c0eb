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

//! Type System Tests
//!
//! Unification, boxing and nullability through the public type API

use tessera::types::{Prim, Shape};
use tessera::{unify, ClassSource, CompilerConfig, TypeRegistry, TypeWidget, ValueType};

fn samples() -> Vec<TypeWidget> {
    vec![
        TypeWidget::boolean(),
        TypeWidget::int32(),
        TypeWidget::int64(),
        TypeWidget::float64(),
        TypeWidget::boxed_of(Prim::Int32),
        TypeWidget::string(),
        TypeWidget::string().not_nullable(),
        TypeWidget::any(),
        TypeWidget::list(TypeWidget::int32()).not_nullable(),
        TypeWidget::list(TypeWidget::int64()),
        TypeWidget::map(TypeWidget::string(), TypeWidget::int64()),
        TypeWidget::record(),
    ]
}

/// Test that unify does not depend on operand order
#[test]
fn test_unify_is_symmetric() {
    let types = samples();
    for a in &types {
        for b in &types {
            assert_eq!(unify(a, b), unify(b, a), "unify({}, {})", a, b);
        }
    }
}

/// Test that unifying a type with itself is the identity
#[test]
fn test_unify_is_idempotent() {
    for t in samples() {
        assert_eq!(unify(&t, &t), t);
    }
}

/// Test that numeric unification does not depend on grouping
#[test]
fn test_numeric_unify_grouping() {
    let numerics = [
        TypeWidget::int32(),
        TypeWidget::int64(),
        TypeWidget::float64(),
        TypeWidget::boxed_of(Prim::Int32),
        TypeWidget::boxed_of(Prim::Int64).nullable(),
    ];
    for a in &numerics {
        for b in &numerics {
            for c in &numerics {
                let left = unify(&unify(a, b), c);
                let right = unify(a, &unify(b, c));
                assert_eq!(left, right, "grouping of {}, {}, {}", a, b, c);
            }
        }
    }
}

/// Test boxing round trips and nullable wrappers
#[test]
fn test_boxing_and_nullability() {
    for prim in [Prim::Boolean, Prim::Int32, Prim::Int64, Prim::Float64] {
        let raw = TypeWidget::primitive(prim);
        assert_eq!(raw.boxed().unboxed(), raw);
        assert!(!raw.nullable().is_nullable());
        assert!(raw.boxed().nullable().is_nullable());
    }
    let text = TypeWidget::string();
    assert_eq!(text.nullable(), text.nullable().nullable());
    assert_eq!(text.not_nullable().nullable(), text.nullable());
    assert_eq!(TypeWidget::any().boxed(), TypeWidget::any());
}

/// Test unification of collections
#[test]
fn test_collection_unify() {
    let narrow = TypeWidget::list(TypeWidget::int32()).not_nullable();
    let wide = TypeWidget::list(TypeWidget::int64()).not_nullable();
    let joined = unify(&narrow, &wide);
    match joined.shape() {
        Shape::List(elem) => assert_eq!(elem.kind(), TypeWidget::int64().kind()),
        other => panic!("expected a list, got {:?}", other),
    }

    let map = TypeWidget::map(TypeWidget::string(), TypeWidget::int32());
    assert!(unify(&map, &narrow).is_any());
    assert!(unify(&TypeWidget::int32(), &TypeWidget::string()).is_any());
}

/// Test planner types resolving into widgets
#[test]
fn test_value_type_resolution() {
    let registry = TypeRegistry::new();
    let source = ClassSource::new(CompilerConfig::default());

    let int = registry.resolve_value(&ValueType::Int32, &source).unwrap();
    assert!(int.is_primitive());
    let optional = registry
        .resolve_value(&ValueType::optional(ValueType::Int32), &source)
        .unwrap();
    assert!(optional.is_nullable());
    assert_eq!(optional.unboxed().not_nullable(), int);

    let point = ValueType::closed_struct(vec![("x", ValueType::Int64), ("y", ValueType::Int64)]);
    let first = registry.resolve_value(&point, &source).unwrap();
    let second = registry.resolve_value(&point, &source).unwrap();
    assert!(matches!(first.shape(), Shape::Struct(_)));
    assert_eq!(first, second);
    assert_eq!(source.unit_count(), 1);

    let open = registry.resolve_value(&ValueType::open_struct(), &source).unwrap();
    assert_eq!(open, TypeWidget::record().not_nullable());
}
