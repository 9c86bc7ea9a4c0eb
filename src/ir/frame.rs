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

// Lexical frames of local storage slots
//
// A frame is live between the emitter's `enter_frame` and `exit_frame`;
// its locals get slots on entry and lose them on exit, so a local read
// outside its frame fails at emission instead of reading a stale slot.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::types::TypeWidget;

/// A named local slot; identity is the allocation, not the name
pub struct LocalValue {
    name: String,
    ty: TypeWidget,
}

pub type Local = Rc<LocalValue>;

impl LocalValue {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeWidget {
        &self.ty
    }
}

impl fmt::Debug for LocalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// A scope of locals; nested scopes form a stack
pub struct LocalFrame {
    parent: Option<Rc<LocalFrame>>,
    locals: RefCell<Vec<Local>>,
    // shared by the whole frame tree
    temps: Rc<Cell<u32>>,
}

impl LocalFrame {
    pub fn root() -> Rc<Self> {
        Rc::new(LocalFrame {
            parent: None,
            locals: RefCell::new(Vec::new()),
            temps: Rc::new(Cell::new(0)),
        })
    }

    pub fn child(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(LocalFrame {
            parent: Some(self.clone()),
            locals: RefCell::new(Vec::new()),
            temps: self.temps.clone(),
        })
    }

    pub fn parent(&self) -> Option<&Rc<LocalFrame>> {
        self.parent.as_ref()
    }

    /// Add a named local to this frame
    pub fn allocate(&self, name: &str, ty: TypeWidget) -> Local {
        let local = Rc::new(LocalValue {
            name: name.to_string(),
            ty,
        });
        self.locals.borrow_mut().push(local.clone());
        local
    }

    /// Add a local with a generated unique name
    pub fn temp(&self, prefix: &str, ty: TypeWidget) -> Local {
        let n = self.temps.get() + 1;
        self.temps.set(n);
        self.allocate(&format!("${}{}", prefix, n), ty)
    }

    /// Find a local by name, innermost frame first
    pub fn get(&self, name: &str) -> Option<Local> {
        let found = self
            .locals
            .borrow()
            .iter()
            .rev()
            .find(|l| l.name == name)
            .cloned();
        found.or_else(|| self.parent.as_ref().and_then(|p| p.get(name)))
    }

    /// Locals of this frame in allocation order
    pub fn locals(&self) -> Vec<Local> {
        self.locals.borrow().clone()
    }
}

impl fmt::Debug for LocalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFrame")
            .field("locals", &self.locals.borrow())
            .field("nested", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let root = LocalFrame::root();
        let x = root.allocate("x", TypeWidget::int32());
        let inner = root.child();
        let shadow = inner.allocate("x", TypeWidget::string());
        assert!(Rc::ptr_eq(&inner.get("x").unwrap(), &shadow));
        assert!(Rc::ptr_eq(&root.get("x").unwrap(), &x));
        assert!(inner.get("y").is_none());
    }

    #[test]
    fn test_temps_are_unique_across_frames() {
        let root = LocalFrame::root();
        let a = root.temp("item", TypeWidget::any());
        let b = root.child().temp("item", TypeWidget::any());
        assert_ne!(a.name(), b.name());
        assert_eq!(root.locals().len(), 1);
    }
}
