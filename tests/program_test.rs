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

//! Program Compilation Tests
//!
//! Compiles operator trees into entry points and invokes them

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tessera::compiler::Arg;
use tessera::{
    CompilerConfig, ExprOperator, Fault, OperatorNode, ProgramCompiler, Timeout, Value, ValueType,
};

fn int(v: i32) -> OperatorNode {
    OperatorNode::literal(Value::Int(v))
}

fn typed_null(ty: ValueType) -> OperatorNode {
    OperatorNode::new(ExprOperator::Null, vec![Arg::Type(ty)])
}

fn compile_one(node: OperatorNode) -> Value {
    let mut compiler = ProgramCompiler::new(CompilerConfig::default());
    compiler
        .expression("main", &[], &node)
        .expect("Failed to compile expression");
    let program = compiler.build().expect("Failed to build program");
    program.invoke("main", vec![]).expect("Failed to invoke")
}

/// Test that operator nesting decides evaluation order
#[test]
fn test_arithmetic_follows_tree_shape() {
    let product = OperatorNode::binary(ExprOperator::Mult, int(2), int(3));
    let sum = OperatorNode::binary(ExprOperator::Add, int(1), product);
    assert_eq!(compile_one(sum).as_i64(), Some(7));
}

/// Test binary operators whose right operand can never be null
#[test]
fn test_binary_operators_with_non_null_operands() {
    let divide = OperatorNode::binary(ExprOperator::Div, int(5), int(2));
    assert_eq!(compile_one(divide).as_i64(), Some(2));

    let equal = OperatorNode::binary(ExprOperator::Eq, int(1), int(1));
    assert_eq!(compile_one(equal).as_bool(), Some(true));

    let text = |s: &str| OperatorNode::literal(Value::string(s));
    let same = OperatorNode::binary(ExprOperator::Eq, text("a"), text("a"));
    assert_eq!(compile_one(same).as_bool(), Some(true));

    let less = OperatorNode::binary(
        ExprOperator::Lt,
        OperatorNode::literal(Value::Double(1.0)),
        OperatorNode::literal(Value::Double(2.0)),
    );
    assert_eq!(compile_one(less).as_bool(), Some(true));
}

/// Test that int32 arithmetic wraps instead of widening
#[test]
fn test_int32_overflow_wraps() {
    let sum = OperatorNode::binary(ExprOperator::Add, int(i32::MAX), int(1));
    assert_eq!(compile_one(sum).as_i64(), Some(i32::MIN as i64));
}

/// Test that mixed widths widen to the larger kind
#[test]
fn test_mixed_width_arithmetic() {
    let sum = OperatorNode::binary(
        ExprOperator::Add,
        int(i32::MAX),
        OperatorNode::literal(Value::Long(1)),
    );
    assert_eq!(compile_one(sum).as_i64(), Some(i32::MAX as i64 + 1));
}

/// Test that TRANSFORM drops items whose mapped value is null
#[test]
fn test_transform_skips_nulls() {
    let items = OperatorNode::list(
        ExprOperator::Array,
        vec![int(1), int(2), typed_null(ValueType::Int32), int(4)],
    );
    let body = OperatorNode::binary(ExprOperator::Add, OperatorNode::local("x"), int(10));
    let out = compile_one(OperatorNode::transform(items, "x", body));
    let values: Vec<i64> = out
        .as_list()
        .expect("transform returns a list")
        .iter()
        .filter_map(Value::as_i64)
        .collect();
    assert_eq!(values, vec![11, 12, 14]);
}

/// Test COALESCE and IF over nullable operands
#[test]
fn test_coalesce_and_if() {
    let coalesce = OperatorNode::list(
        ExprOperator::Coalesce,
        vec![typed_null(ValueType::Int32), int(5), int(6)],
    );
    assert_eq!(compile_one(coalesce).as_i64(), Some(5));

    let test = OperatorNode::binary(ExprOperator::Lt, int(1), int(2));
    let choice = OperatorNode::new(
        ExprOperator::If,
        vec![
            Arg::Node(test),
            Arg::Node(OperatorNode::literal(Value::string("yes"))),
            Arg::Node(OperatorNode::literal(Value::string("no"))),
        ],
    );
    assert_eq!(compile_one(choice).as_str(), Some("yes"));
}

/// Test the three-way comparison ranking of nulls
#[test]
fn test_compare_ranks_nulls() {
    let compare = |left: OperatorNode, right: OperatorNode| {
        compile_one(OperatorNode::binary(ExprOperator::Compare, left, right)).as_i64()
    };
    assert_eq!(compare(typed_null(ValueType::Int32), int(1)), Some(-1));
    assert_eq!(compare(int(1), typed_null(ValueType::Int32)), Some(1));
    assert_eq!(
        compare(typed_null(ValueType::Int32), typed_null(ValueType::Int32)),
        Some(0)
    );
    assert_eq!(compare(int(3), int(2)), Some(1));

    // a non-null left operand against a nullable right one
    let five = OperatorNode::literal(Value::Long(5));
    assert_eq!(compare(five.clone(), typed_null(ValueType::Int32)), Some(1));
    assert_eq!(compare(typed_null(ValueType::Int32), five), Some(-1));
}

/// Test that a record with a non-identifier field still reads back
#[test]
fn test_record_with_non_identifier_field() {
    let record = OperatorNode::new(
        ExprOperator::Record,
        vec![
            Arg::Names(vec!["a".to_string(), "1abc".to_string()]),
            Arg::Nodes(vec![int(1), int(2)]),
        ],
    );
    let first = compile_one(OperatorNode::property(record.clone(), "a"));
    assert_eq!(first.as_i64(), Some(1));
    let second = compile_one(OperatorNode::property(record, "1abc"));
    assert_eq!(second.as_i64(), Some(2));
}

/// Test that property reads on untyped arguments memoize one adapter per type
#[test]
fn test_dynamic_property_adapters_are_memoized() {
    let mut compiler = ProgramCompiler::new(CompilerConfig::default());
    let read = OperatorNode::property(OperatorNode::argument("row"), "id");
    compiler
        .expression("id", &[("row", ValueType::Any)], &read)
        .expect("Failed to compile");
    let program = compiler.build().expect("Failed to build");

    for id in 0..4 {
        let row = Value::map(vec![(Value::string("id"), Value::boxed_int(id))]);
        let out = program.invoke("id", vec![row]).expect("Failed to invoke");
        assert_eq!(out.as_i64(), Some(id as i64));
    }
    assert_eq!(program.loader().linker().generated_count(), 1);
}

/// Test that threads racing on an unseen type still build one adapter
#[test]
fn test_dynamic_adapter_generated_once_across_threads() {
    let mut compiler = ProgramCompiler::new(CompilerConfig::default());
    let read = OperatorNode::property(OperatorNode::argument("row"), "id");
    compiler
        .expression("id", &[("row", ValueType::Any)], &read)
        .expect("Failed to compile");
    let program = Arc::new(compiler.build().expect("Failed to build"));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let program = program.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    let id = t * 100 + i;
                    let row = Value::map(vec![(Value::string("id"), Value::boxed_int(id))]);
                    let out = program.invoke("id", vec![row]).expect("Failed to invoke");
                    assert_eq!(out.as_i64(), Some(id as i64));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread panicked");
    }
    assert_eq!(program.loader().linker().generated_count(), 1);
}

/// Test that a failing statement yields a failed outcome and leaves siblings alone
#[test]
fn test_statement_failure_is_isolated() {
    let mut compiler = ProgramCompiler::new(CompilerConfig::default());
    let divide = OperatorNode::binary(ExprOperator::Div, int(1), int(0));
    let fine = OperatorNode::binary(ExprOperator::Add, int(1), int(1));
    compiler.statement("bad", &[], &divide).expect("Failed to compile");
    compiler.statement("good", &[], &fine).expect("Failed to compile");
    let program = compiler.build().expect("Failed to build");

    let bad = program.invoke("bad", vec![]).expect("statements never raise");
    let outcome = bad.as_outcome().expect("statement returns an outcome");
    assert!(!outcome.is_success());
    assert_eq!(outcome.fault(), Some(&Fault::DivideByZero));

    let good = program.invoke("good", vec![]).expect("statements never raise");
    let outcome = good.as_outcome().expect("statement returns an outcome");
    assert!(outcome.is_success());
    assert_eq!(outcome.value().and_then(Value::as_i64), Some(2));

    // an expression entry point surfaces the same fault directly
    let mut compiler = ProgramCompiler::new(CompilerConfig::default());
    let divide = OperatorNode::binary(ExprOperator::Div, int(1), int(0));
    compiler.expression("bad", &[], &divide).expect("Failed to compile");
    let program = compiler.build().expect("Failed to build");
    assert_eq!(program.invoke("bad", vec![]), Err(Fault::DivideByZero));
}

/// Test that RESOLVE passes values that are not promises through
#[test]
fn test_resolve_passes_plain_values() {
    let mut compiler = ProgramCompiler::new(
        CompilerConfig::default().with_statement_timeout(Duration::from_secs(5)),
    );
    let node = OperatorNode::unary(ExprOperator::Resolve, int(3));
    compiler.expression("plain", &[], &node).expect("Failed to compile");
    let program = compiler.build().expect("Failed to build");
    let entry = program.entry("plain").expect("entry exists");
    assert_eq!(entry.invoke(vec![]).expect("Failed to invoke").as_i64(), Some(3));
    let out = entry
        .invoke_with(Timeout::new(Duration::from_secs(1)), vec![])
        .expect("Failed to invoke");
    assert_eq!(out.as_i64(), Some(3));
}

/// Test that one built program serves many threads
#[test]
fn test_program_is_shared_across_threads() {
    let mut compiler = ProgramCompiler::new(CompilerConfig::default());
    let doubled = OperatorNode::binary(ExprOperator::Mult, OperatorNode::argument("n"), int(2));
    compiler
        .expression("double", &[("n", ValueType::Int64)], &doubled)
        .expect("Failed to compile");
    let program = Arc::new(compiler.build().expect("Failed to build"));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let program = program.clone();
            thread::spawn(move || {
                (0..50)
                    .map(|i| {
                        let n = (t * 100 + i) as i64;
                        let out = program
                            .invoke("double", vec![Value::Long(n)])
                            .expect("Failed to invoke");
                        assert_eq!(out.as_i64(), Some(n * 2));
                    })
                    .count()
            })
        })
        .collect();
    let total: usize = handles.into_iter().map(|h| h.join().expect("thread panicked")).sum();
    assert_eq!(total, 200);
}
