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

// Low-level code emission
//
// `CodeEmitter` accumulates the ops of one method. IR nodes drive it
// through `generate`; it owns labels, exception regions and the mapping
// from active `LocalFrame`s to local slots.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{Error, Result, Value};
use crate::ir::{Expr, LocalFrame, LocalValue};
use crate::runtime::java_hash;
use crate::types::{unify, NumKind, Repr, TypeWidget};

use super::conversions::conversion;
use super::ops::{CatchType, Cond, Handler, Label, Native, Op};

/// Result of emitting two operands at a common type
#[derive(Debug, Clone)]
pub struct Unification {
    pub ty: TypeWidget,
    /// Whether any null branch was emitted
    pub nullable: bool,
}

struct ActiveFrame {
    key: usize,
    base: u16,
    slots: FxHashMap<usize, u16>,
}

/// Ops, labels and handlers produced for one method
pub struct EmittedCode {
    pub ops: Vec<Op>,
    pub labels: Vec<Option<u32>>,
    pub handlers: Vec<Handler>,
    pub max_locals: u16,
}

/// Per-method code emitter
pub struct CodeEmitter {
    ops: Vec<Op>,
    labels: Vec<Option<u32>>,
    handlers: Vec<Handler>,
    frames: Vec<ActiveFrame>,
    next_slot: u16,
    max_locals: u16,
    symbols: u32,
}

impl Default for CodeEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeEmitter {
    pub fn new() -> Self {
        Self {
            ops: Vec::with_capacity(64),
            labels: Vec::new(),
            handlers: Vec::new(),
            frames: Vec::new(),
            next_slot: 0,
            max_locals: 0,
            symbols: 0,
        }
    }

    // =========================================================================
    // Ops and labels
    // =========================================================================

    #[inline]
    pub fn emit(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Number of ops emitted so far
    #[inline]
    pub fn position(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() as u32 - 1)
    }

    /// Bind a label to the next op
    pub fn mark(&mut self, label: Label) {
        self.labels[label.0 as usize] = Some(self.ops.len() as u32);
    }

    pub fn jump(&mut self, label: Label) {
        self.emit(Op::Jump(label));
    }

    /// Unique name for a temporary
    pub fn gensym(&mut self, prefix: &str) -> String {
        self.symbols += 1;
        format!("{}{}", prefix, self.symbols)
    }

    /// Register a protected region; inner regions must be added first
    pub fn try_region(&mut self, start: Label, end: Label, handler: Label, catch: CatchType) {
        self.handlers.push(Handler {
            start,
            end,
            handler,
            catch,
        });
    }

    pub fn finish(self) -> EmittedCode {
        EmittedCode {
            ops: self.ops,
            labels: self.labels,
            handlers: self.handlers,
            max_locals: self.max_locals,
        }
    }

    // =========================================================================
    // Locals
    // =========================================================================

    /// Assign slots to every local of `frame`
    pub fn enter_frame(&mut self, frame: &Rc<LocalFrame>) {
        let base = self.next_slot;
        let mut slots = FxHashMap::default();
        for local in frame.locals() {
            slots.insert(Rc::as_ptr(&local) as usize, self.next_slot);
            self.next_slot += local.ty().width().max(1) as u16;
        }
        self.max_locals = self.max_locals.max(self.next_slot);
        self.frames.push(ActiveFrame {
            key: Rc::as_ptr(frame) as usize,
            base,
            slots,
        });
    }

    /// Release the slots of the innermost frame
    pub fn exit_frame(&mut self, frame: &Rc<LocalFrame>) -> Result<()> {
        match self.frames.pop() {
            Some(active) if active.key == Rc::as_ptr(frame) as usize => {
                self.next_slot = active.base;
                Ok(())
            }
            _ => Err(Error::internal("local frames exited out of order")),
        }
    }

    /// Slot of a local; fails when its frame is not active
    pub fn local_slot(&self, local: &LocalValue) -> Result<u16> {
        let key = local as *const LocalValue as usize;
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.slots.get(&key).copied())
            .ok_or_else(|| {
                Error::internal(format!("local '{}' used outside its scope", local.name()))
            })
    }

    /// Anonymous slot living until the innermost frame exits
    pub fn allocate_temp(&mut self, width: u8) -> u16 {
        let slot = self.next_slot;
        self.next_slot += width.max(1) as u16;
        self.max_locals = self.max_locals.max(self.next_slot);
        slot
    }

    pub fn load_slot(&mut self, slot: u16, width: u8) {
        match width {
            2 => self.emit(Op::Load2(slot)),
            _ => self.emit(Op::Load(slot)),
        }
    }

    pub fn store_slot(&mut self, slot: u16, width: u8) {
        match width {
            2 => self.emit(Op::Store2(slot)),
            _ => self.emit(Op::Store(slot)),
        }
    }

    // =========================================================================
    // Width-sized stack manipulation
    // =========================================================================

    pub fn pop(&mut self, ty: &TypeWidget) {
        self.pop_width(ty.width());
    }

    pub fn pop_width(&mut self, width: u8) {
        if width > 0 {
            self.emit(Op::Pop(width));
        }
    }

    pub fn dup(&mut self, ty: &TypeWidget) {
        if ty.width() > 0 {
            self.emit(Op::Dup(ty.width()));
        }
    }

    /// Exchange the top value with the one beneath it
    pub fn swap(&mut self, top: &TypeWidget, under: &TypeWidget) {
        match (top.width(), under.width()) {
            (1, 1) => self.emit(Op::Swap),
            (t, u) if t > 0 && u > 0 => {
                self.emit(Op::DupX(t, u));
                self.emit(Op::Pop(t));
            }
            _ => {}
        }
    }

    // =========================================================================
    // Boxing and casts
    // =========================================================================

    /// Box a primitive; references are left alone
    pub fn box_value(&mut self, ty: &TypeWidget) -> Result<()> {
        if ty.is_primitive() {
            self.cast(&ty.boxed(), &ty.not_nullable())?;
        }
        Ok(())
    }

    pub fn unbox(&mut self, ty: &TypeWidget) -> Result<()> {
        self.cast(&ty.unboxed(), ty)
    }

    /// Convert the top value from `source` to `target`
    pub fn cast(&mut self, target: &TypeWidget, source: &TypeWidget) -> Result<()> {
        if target == source || target.repr() == source.repr() {
            return Ok(());
        }
        if target.repr() == &Repr::object() {
            return self.box_value(source);
        }
        if let Some(ops) = conversion(source.repr(), target.repr()) {
            ops.into_iter().for_each(|op| self.emit(op));
            return Ok(());
        }
        if target.is_primitive() && !source.is_primitive() {
            self.cast(&target.boxed(), source)?;
            return self.cast(target, &target.boxed());
        }
        self.check_cast(target, source)
    }

    /// Null-aware cast; jumps to `is_null` with the null popped
    ///
    /// Returns whether a null branch was emitted.
    pub fn cast_or_null(
        &mut self,
        target: &TypeWidget,
        source: &TypeWidget,
        is_null: Label,
    ) -> Result<bool> {
        if target == source || target.repr() == source.repr() {
            return Ok(self.null_test(source, is_null));
        }
        if target.repr() == &Repr::object() {
            if source.is_primitive() {
                self.box_value(source)?;
                return Ok(false);
            }
            return Ok(self.null_test(source, is_null));
        }
        if let Some(ops) = conversion(source.repr(), target.repr()) {
            let tested = source.is_nullable() && self.null_test(source, is_null);
            ops.into_iter().for_each(|op| self.emit(op));
            return Ok(tested);
        }
        if target.is_primitive() && !source.is_primitive() {
            let boxed = target.boxed();
            let tested = self.cast_or_null(&boxed, source, is_null)?;
            self.unbox(&boxed.not_nullable())?;
            return Ok(tested);
        }
        let tested = self.null_test(source, is_null);
        self.check_cast(target, source)?;
        Ok(tested)
    }

    /// Narrow an `Object` on the stack to `ty`
    ///
    /// Boxed primitives are left unchecked since unboxing accepts any
    /// numeric box.
    pub fn downcast(&mut self, ty: &TypeWidget) {
        if ty.is_any() || ty.prim().is_some() {
            return;
        }
        if let Repr::Ref(class) = ty.repr() {
            self.emit(Op::CheckCast(class.clone()));
        }
    }

    fn check_cast(&mut self, target: &TypeWidget, source: &TypeWidget) -> Result<()> {
        if target.is_primitive() || source.is_primitive() || target.is_void() || source.is_void() {
            return Err(Error::incompatible_cast(target, source));
        }
        match target.repr() {
            Repr::Ref(class) => {
                self.emit(Op::CheckCast(class.clone()));
                Ok(())
            }
            _ => Err(Error::incompatible_cast(target, source)),
        }
    }

    // =========================================================================
    // Null tests
    // =========================================================================

    /// Jump to `is_null` with the value popped when it is null
    pub fn null_test(&mut self, ty: &TypeWidget, is_null: Label) -> bool {
        if !ty.is_nullable() {
            return false;
        }
        let done = self.new_label();
        self.dup(ty);
        self.emit(Op::IfNonNull(done));
        self.pop(ty);
        self.jump(is_null);
        self.mark(done);
        true
    }

    /// Jump to `is_null` leaving the null on the stack
    pub fn null_test_leave_null(&mut self, ty: &TypeWidget, is_null: Label) -> bool {
        if !ty.is_nullable() {
            return false;
        }
        let done = self.new_label();
        self.dup(ty);
        self.emit(Op::IfNonNull(done));
        self.jump(is_null);
        self.mark(done);
        true
    }

    /// Jump to `is_not_null` keeping the value; falls through with it popped
    pub fn not_null_test(&mut self, ty: &TypeWidget, is_not_null: Label) {
        if ty.is_nullable() {
            self.dup(ty);
            self.emit(Op::IfNonNull(is_not_null));
            self.pop(ty);
        } else {
            self.jump(is_not_null);
        }
    }

    // =========================================================================
    // Operand unification
    // =========================================================================

    /// Emit both operands converted to their unified type
    pub fn unified_emit(
        &mut self,
        left: &Expr,
        right: &Expr,
        left_null: Label,
        right_null: Label,
        both_null: Label,
    ) -> Result<Unification> {
        let ty = unify(left.ty(), right.ty());
        self.unify_as(&ty, left, right, left_null, right_null, both_null)
    }

    /// Emit both operands converted to `ty`
    ///
    /// Null operands branch away with an empty stack: to `left_null` or
    /// `right_null` when only one side is null, to `both_null` when both are.
    pub fn unify_as(
        &mut self,
        ty: &TypeWidget,
        left: &Expr,
        right: &Expr,
        left_null: Label,
        right_null: Label,
        both_null: Label,
    ) -> Result<Unification> {
        left.generate(self)?;
        let distinct = left_null != both_null && right.ty().is_nullable();
        let left_is_null = if distinct { self.new_label() } else { left_null };
        let mut nullable = self.cast_or_null(ty, left.ty(), left_is_null)?;
        if nullable && distinct {
            let skip = self.new_label();
            self.jump(skip);
            self.mark(left_is_null);
            right.generate(self)?;
            self.emit(Op::IfNull(both_null));
            self.jump(left_null);
            self.mark(skip);
        } else if distinct {
            self.mark(left_is_null);
        }
        let pop = self.new_label();
        right.generate(self)?;
        if self.cast_or_null(ty, right.ty(), pop)? {
            let done = self.new_label();
            nullable = true;
            self.jump(done);
            self.mark(pop);
            // drop the converted left operand
            self.pop(ty);
            self.jump(right_null);
            self.mark(done);
        } else {
            self.mark(pop);
        }
        Ok(Unification {
            ty: ty.clone(),
            nullable,
        })
    }

    // =========================================================================
    // Control flow coercion
    // =========================================================================

    /// Consume a boolean or numeric value; jump to `is_false` when it is
    /// false, zero or null
    pub fn test_false(&mut self, ty: &TypeWidget, is_false: Label) -> Result<()> {
        let mut ty = ty.clone();
        if !ty.is_primitive() {
            let prim = ty.prim().ok_or_else(|| Error::incompatible_cast("boolean", &ty))?;
            let unboxed = TypeWidget::primitive(prim);
            self.cast_or_null(&unboxed, &ty, is_false)?;
            ty = unboxed;
        }
        match ty.repr().num_kind() {
            Some(NumKind::Int) => {}
            Some(kind) => {
                self.emit(Op::Const(zero(kind)));
                self.emit(Op::Cmp(kind));
            }
            None => return Err(Error::incompatible_cast("boolean", &ty)),
        }
        self.emit(Op::If(Cond::Eq, is_false));
        Ok(())
    }

    // =========================================================================
    // Switches
    // =========================================================================

    /// Dispatch on the int on top of the stack
    pub fn emit_integer_switch(&mut self, cases: &BTreeMap<i32, Label>, default: Label) {
        let keys: Vec<i32> = cases.keys().copied().collect();
        let targets: Vec<Label> = cases.values().copied().collect();
        self.emit(Op::LookupSwitch {
            keys: Arc::from(keys),
            targets: Arc::from(targets),
            default,
        });
    }

    /// Case-insensitive dispatch on the string on top of the stack
    ///
    /// The key is upper-cased and bucketed by its hash; each bucket compares
    /// names exactly and falls through to `default`. A null key goes to
    /// `default`.
    pub fn emit_string_switch(&mut self, cases: &[(String, Label)], default: Label) {
        let mut buckets: BTreeMap<i32, Vec<(String, Label)>> = BTreeMap::new();
        for (name, label) in cases {
            let upper = name.to_uppercase();
            buckets
                .entry(java_hash(&upper))
                .or_default()
                .push((upper, *label));
        }
        let tmp = self.allocate_temp(1);
        let non_null = self.new_label();
        self.emit(Op::Dup(1));
        self.emit(Op::IfNonNull(non_null));
        self.emit(Op::Pop(1));
        self.jump(default);
        self.mark(non_null);
        self.emit(Op::CallNative(Native::StringUpper));
        self.emit(Op::Dup(1));
        self.emit(Op::Store(tmp));
        self.emit(Op::CallNative(Native::StringHash));
        let bucket_labels: BTreeMap<i32, Label> =
            buckets.keys().map(|h| (*h, self.new_label())).collect();
        self.emit_integer_switch(&bucket_labels, default);
        for (hash, entries) in buckets {
            self.mark(bucket_labels[&hash]);
            for (name, label) in entries {
                self.emit(Op::Const(Value::string(&name)));
                self.emit(Op::Load(tmp));
                self.emit(Op::CallNative(Native::StringEquals));
                self.emit(Op::If(Cond::Ne, label));
            }
            self.jump(default);
        }
    }
}

fn zero(kind: NumKind) -> Value {
    match kind {
        NumKind::Int => Value::Int(0),
        NumKind::Long => Value::Long(0),
        NumKind::Float => Value::Float(0.0),
        NumKind::Double => Value::Double(0.0),
    }
}
