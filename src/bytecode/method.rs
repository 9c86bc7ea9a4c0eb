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

// Finished method bodies

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use super::ops::{Handler, Label, MethodRef, Op};

/// A rendered, verified method ready for the machine
///
/// Cheap to share: the machine and bound function handles hold it behind
/// an `Arc`.
pub struct MethodBody {
    /// Signature of this method
    pub method: Arc<MethodRef>,

    /// The operation sequence
    pub ops: Vec<Op>,

    /// Label id -> pc
    pub labels: Vec<u32>,

    /// Protected regions, innermost first
    pub handlers: Vec<Handler>,

    /// Local slots, parameters included
    pub max_locals: u16,

    /// Maximum operand stack depth in slots
    pub max_stack: usize,
}

impl MethodBody {
    pub fn name(&self) -> &str {
        &self.method.name
    }

    /// Resolve a label to its pc
    #[inline]
    pub fn target(&self, label: Label) -> usize {
        self.labels[label.0 as usize] as usize
    }

    /// Handler covering `pc` that accepts the fault, if any
    pub fn handler_for(&self, pc: usize, fault: &crate::runtime::Fault) -> Option<usize> {
        self.handlers
            .iter()
            .find(|h| {
                let (start, end) = (self.target(h.start), self.target(h.end));
                pc >= start && pc < end && fault.caught_by(h.catch)
            })
            .map(|h| self.target(h.handler))
    }

    /// Human readable listing
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "method {} locals={} stack={}",
            self.method, self.max_locals, self.max_stack
        );
        render_ops(&mut out, &self.ops, &self.labels, &self.handlers);
        out
    }
}

/// Listing of ops with label markers; `labels` may be partially bound
pub(crate) fn render_ops(out: &mut String, ops: &[Op], labels: &[u32], handlers: &[Handler]) {
    for (pc, op) in ops.iter().enumerate() {
        for (id, _) in labels.iter().enumerate().filter(|(_, p)| **p as usize == pc) {
            let _ = writeln!(out, "L{}:", id);
        }
        let _ = writeln!(out, "{:04}: {:?}", pc, op);
    }
    for h in handlers {
        let _ = writeln!(
            out,
            "try L{}..L{} -> L{} catch {:?}",
            h.start.0, h.end.0, h.handler.0, h.catch
        );
    }
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBody")
            .field("method", &self.method.to_string())
            .field("ops_count", &self.ops.len())
            .field("max_locals", &self.max_locals)
            .field("max_stack", &self.max_stack)
            .finish()
    }
}
