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

//! Code Generation Tests
//!
//! Cast emission, generated structs and failure dumps

use tessera::bytecode::{CodeEmitter, Cond, Op};
use tessera::compiler::Arg;
use tessera::generate::{MethodGenerator, UnitGenerator};
use tessera::ir::seq;
use tessera::{
    ClassSource, CompilerConfig, ErrorKind, ExprOperator, Location, OperatorNode,
    ProgramCompiler, TypeWidget, Value, ValueType,
};

fn cast_ops(target: TypeWidget, source: TypeWidget) -> Vec<Op> {
    let mut code = CodeEmitter::new();
    code.cast(&target, &source).expect("Failed to emit cast");
    code.ops().to_vec()
}

/// Test the number of ops each kind of cast emits
#[test]
fn test_cast_op_counts() {
    assert!(cast_ops(TypeWidget::int64(), TypeWidget::int64()).is_empty());
    assert!(cast_ops(TypeWidget::any(), TypeWidget::record()).is_empty());

    let widen = cast_ops(TypeWidget::int64(), TypeWidget::int32());
    assert_eq!(widen.len(), 1);
    assert!(matches!(widen[0], Op::Convert(..)));

    let boxed = cast_ops(TypeWidget::any(), TypeWidget::int32());
    assert_eq!(boxed.len(), 1);
    assert!(matches!(boxed[0], Op::Box(_)));
}

fn record_node(names: &[&str], values: Vec<OperatorNode>) -> OperatorNode {
    OperatorNode::new(
        ExprOperator::Record,
        vec![
            Arg::Names(names.iter().map(|n| n.to_string()).collect()),
            Arg::Nodes(values),
        ],
    )
}

/// Test that identifier-only records become generated structs
#[test]
fn test_struct_record_round_trip() {
    let null_text = OperatorNode::new(ExprOperator::Null, vec![Arg::Type(ValueType::String)]);
    let record = record_node(
        &["a", "b"],
        vec![OperatorNode::literal(Value::Int(1)), null_text],
    );

    let mut compiler = ProgramCompiler::new(CompilerConfig::default());
    compiler
        .expression("a", &[], &OperatorNode::property(record.clone(), "a"))
        .expect("Failed to compile");
    compiler
        .expression("b", &[], &OperatorNode::property(record.clone(), "B"))
        .expect("Failed to compile");
    let missing = OperatorNode::property(record, "c").at(Location::new(4, 2));
    let err = compiler.expression("c", &[], &missing).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::PropertyNotFound { .. }));
    assert_eq!(err.location, Some(Location::new(4, 2)));

    let program = compiler.build().expect("Failed to build");
    assert_eq!(program.invoke("a", vec![]).unwrap().as_i64(), Some(1));
    assert!(program.invoke("b", vec![]).unwrap().is_null());
    // both entry points share one generated struct
    assert_eq!(program.loader().len(), 2);
}

/// Test that a verification failure is internal and leaves a dump behind
#[test]
fn test_verification_failure_dumps_listing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tessera=debug")
        .with_test_writer()
        .try_init();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = CompilerConfig::default().with_dump_directory(dir.path());
    let source = ClassSource::new(config);

    let mut unit = UnitGenerator::new("broken");
    let mut method = MethodGenerator::new_static("broken", "main", &[], TypeWidget::any());
    method.set_body(seq(|code| {
        let long = code.new_label();
        let join = code.new_label();
        code.emit(Op::Const(Value::Int(0)));
        code.emit(Op::If(Cond::Eq, long));
        code.emit(Op::Const(Value::Int(1)));
        code.jump(join);
        code.mark(long);
        code.emit(Op::Const(Value::Long(1)));
        code.mark(join);
        code.emit(Op::Return(1));
        Ok(())
    }));
    unit.add_method(method).expect("Failed to add method");
    source.add_unit(unit).expect("Failed to add unit");

    let err = source.build().unwrap_err();
    assert!(err.is_internal());
    assert!(err.to_string().contains("verification failed"));

    let dumps: Vec<_> = std::fs::read_dir(dir.path())
        .expect("Failed to read dump dir")
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(dumps.len(), 1);
    let body = std::fs::read_to_string(dumps[0].path()).expect("Failed to read dump");
    assert!(body.starts_with("unit: broken.main"));
    assert!(body.contains("verification failed"));
}

/// Test that an unverified build loads code the verifier would reject
#[test]
fn test_verification_can_be_disabled() {
    let source = ClassSource::new(CompilerConfig::default().with_verify(false));
    let mut unit = UnitGenerator::new("loose");
    let mut method = MethodGenerator::new_static("loose", "main", &[], TypeWidget::any());
    method.set_body(seq(|code| {
        code.emit(Op::Const(Value::string("extra")));
        code.emit(Op::Const(Value::string("value")));
        code.emit(Op::Return(1));
        Ok(())
    }));
    unit.add_method(method).expect("Failed to add method");
    source.add_unit(unit).expect("Failed to add unit");
    let loader = source.build().expect("Failed to build");
    assert!(loader.contains("loose"));
}
