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

// Bytecode for the tessera stack machine
//
// Generated methods are plain op arrays over slot-sized values. The emitter
// builds them from IR, the verifier proves their stack discipline and the
// runtime machine executes them.
//
//   ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//   │  IR (Expr,  │ ──► │ CodeEmitter  │ ──► │  verify()   │
//   │    Seq)     │     │              │     │             │
//   └─────────────┘     └──────────────┘     └─────────────┘
//                                                   │
//                                                   ▼
//                                            ┌─────────────┐
//                                            │ MethodBody  │
//                                            └─────────────┘

mod conversions;
mod emitter;
mod method;
mod ops;
mod verify;

pub use conversions::conversion;
pub use emitter::{CodeEmitter, EmittedCode, Unification};
pub(crate) use method::render_ops;
pub use method::MethodBody;
pub use ops::{ArithOp, CatchType, Cond, FieldRef, Handler, Label, MethodRef, Native, Op};
pub use verify::{verify, VerifyError};
