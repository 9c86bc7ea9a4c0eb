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

// Open records
//
// A record is an insertion-ordered bag of named values. Lookups ignore
// ASCII case; the name first written is the one reported back.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::core::Value;

/// Sink for named values
pub trait FieldWriter {
    fn put(&self, name: &str, value: Value);
}

#[derive(Default)]
struct Fields {
    // lowercased name -> (original name, value)
    entries: IndexMap<Arc<str>, (Arc<str>, Value), ahash::RandomState>,
}

/// A shared, mutable open record
#[derive(Clone, Default)]
pub struct Record {
    fields: Arc<RwLock<Fields>>,
}

fn fold(name: &str) -> Arc<str> {
    Arc::from(name.to_ascii_lowercase())
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from name/value pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        let record = Record::new();
        for (name, value) in pairs {
            record.put(name, value);
        }
        record
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields
            .read()
            .entries
            .get(&*name.to_ascii_lowercase())
            .map(|(_, v)| v.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields
            .read()
            .entries
            .contains_key(&*name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.fields.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field names in insertion order
    pub fn names(&self) -> Vec<Arc<str>> {
        self.fields
            .read()
            .entries
            .values()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<(Arc<str>, Value)> {
        self.fields
            .read()
            .entries
            .values()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect()
    }

    pub fn equals(&self, other: &Record) -> bool {
        if Arc::ptr_eq(&self.fields, &other.fields) {
            return true;
        }
        let (a, b) = (self.fields.read(), other.fields.read());
        a.entries.len() == b.entries.len()
            && a.entries.iter().all(|(k, (_, v))| {
                b.entries
                    .get(k)
                    .map(|(_, w)| v.equals(w))
                    .unwrap_or(false)
            })
    }
}

impl FieldWriter for Record {
    fn put(&self, name: &str, value: Value) {
        let mut fields = self.fields.write();
        match fields.entries.get_mut(&*name.to_ascii_lowercase()) {
            Some(slot) => slot.1 = value,
            None => {
                fields
                    .entries
                    .insert(fold(name), (Arc::from(name), value));
            }
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields.read();
        f.debug_map()
            .entries(fields.entries.values().map(|(n, v)| (n, v)))
            .finish()
    }
}
