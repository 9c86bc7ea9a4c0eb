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

// Runtime for compiled programs
//
// The stack machine, the loaded-unit registry and the small library of
// runtime collaborators (records, outcomes, promises, timeouts, host
// objects) that generated code calls into.

pub mod dynamic;
pub mod fault;
pub mod host;
pub mod loader;
pub mod machine;
mod natives;
pub mod outcome;
pub mod promise;
pub mod record;
pub mod timeout;

pub use dynamic::{CallSite, DynOp, DynamicLinker, RuntimeAdapter};
pub use fault::{java_hash, Fault, FaultKind};
pub use host::HostObject;
pub use loader::{default_value, ClassLoader, Instance, LoadedClass};
pub use machine::{BoundMethod, Machine};
pub use outcome::Outcome;
pub use promise::Promise;
pub use record::{FieldWriter, Record};
pub use timeout::Timeout;
