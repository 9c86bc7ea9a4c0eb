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

// Completable promises
//
// Generated code resolves a promise either by blocking up to the ambient
// timeout or by chaining a continuation that runs once the value arrives.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::core::Value;

use super::fault::Fault;
use super::timeout::Timeout;

type Continuation = Box<dyn FnOnce(Result<Value, Fault>) + Send>;

#[derive(Default)]
struct State {
    result: Option<Result<Value, Fault>>,
    continuations: Vec<Continuation>,
}

struct Shared {
    state: Mutex<State>,
    ready: Condvar,
}

/// A value that becomes available later
#[derive(Clone)]
pub struct Promise {
    shared: Arc<Shared>,
}

impl Default for Promise {
    fn default() -> Self {
        Self::new()
    }
}

impl Promise {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                ready: Condvar::new(),
            }),
        }
    }

    pub fn completed(value: Value) -> Self {
        let p = Promise::new();
        p.complete(value);
        p
    }

    pub fn failed(fault: Fault) -> Self {
        let p = Promise::new();
        p.fail(fault);
        p
    }

    pub fn complete(&self, value: Value) -> bool {
        self.settle(Ok(value))
    }

    pub fn fail(&self, fault: Fault) -> bool {
        self.settle(Err(fault))
    }

    /// Record the result; returns false when already settled
    fn settle(&self, result: Result<Value, Fault>) -> bool {
        let continuations = {
            let mut state = self.shared.state.lock();
            if state.result.is_some() {
                return false;
            }
            state.result = Some(result.clone());
            std::mem::take(&mut state.continuations)
        };
        self.shared.ready.notify_all();
        for continuation in continuations {
            continuation(result.clone());
        }
        true
    }

    pub fn is_done(&self) -> bool {
        self.shared.state.lock().result.is_some()
    }

    /// Wait for the result, at most until `timeout` expires
    pub fn get(&self, timeout: &Timeout) -> Result<Value, Fault> {
        let mut state = self.shared.state.lock();
        while state.result.is_none() {
            let remaining = timeout.remaining();
            if remaining.is_zero() {
                return Err(Fault::Timeout);
            }
            if remaining == std::time::Duration::MAX {
                self.shared.ready.wait(&mut state);
            } else if self
                .shared
                .ready
                .wait_for(&mut state, remaining)
                .timed_out()
                && state.result.is_none()
            {
                return Err(Fault::Timeout);
            }
        }
        state.result.clone().unwrap_or(Err(Fault::Timeout))
    }

    /// Promise of `f` applied to this promise's value
    ///
    /// Runs `f` inline when the value is already available.
    pub fn then<F>(&self, f: F) -> Promise
    where
        F: FnOnce(Value) -> Result<Value, Fault> + Send + 'static,
    {
        let next = Promise::new();
        let target = next.clone();
        let continuation: Continuation = Box::new(move |result| {
            let _ = target.settle(result.and_then(f));
        });
        let ready = {
            let mut state = self.shared.state.lock();
            match &state.result {
                Some(result) => Some((continuation, result.clone())),
                None => {
                    state.continuations.push(continuation);
                    None
                }
            }
        };
        if let Some((continuation, result)) = ready {
            continuation(result);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_get_completed() {
        let p = Promise::completed(Value::Int(4));
        assert_eq!(p.get(&Timeout::unbounded()), Ok(Value::Int(4)));
        assert!(!p.complete(Value::Int(5)));
    }

    #[test]
    fn test_get_times_out() {
        let p = Promise::new();
        let t = Timeout::new(Duration::from_millis(10));
        assert_eq!(p.get(&t), Err(Fault::Timeout));
    }

    #[test]
    fn test_completion_from_other_thread() {
        let p = Promise::new();
        let q = p.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            q.complete(Value::string("done"));
        });
        let v = p.get(&Timeout::new(Duration::from_secs(5))).unwrap();
        assert_eq!(v.as_str(), Some("done"));
        handle.join().unwrap();
    }

    #[test]
    fn test_then_chains() {
        let p = Promise::new();
        let doubled = p.then(|v| Ok(Value::Int(v.as_i64().unwrap_or(0) as i32 * 2)));
        assert!(!doubled.is_done());
        p.complete(Value::Int(21));
        assert_eq!(doubled.get(&Timeout::unbounded()), Ok(Value::Int(42)));

        let failed = Promise::failed(Fault::DivideByZero).then(Ok);
        assert_eq!(failed.get(&Timeout::unbounded()), Err(Fault::DivideByZero));
    }
}
