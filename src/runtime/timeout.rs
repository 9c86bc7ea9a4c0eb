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

// Ambient execution deadline

use std::fmt;
use std::time::{Duration, Instant};

use super::fault::Fault;

/// Deadline handed to every entry point
///
/// Blocking operations in generated code (promise resolution) wait at most
/// [`Timeout::remaining`]; `check` raises [`Fault::Timeout`] once the
/// deadline has passed.
#[derive(Clone, Copy)]
pub struct Timeout {
    deadline: Option<Instant>,
}

impl Timeout {
    pub fn new(budget: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(budget),
        }
    }

    /// A timeout that never expires
    pub fn unbounded() -> Self {
        Self { deadline: None }
    }

    /// Time left before the deadline; `Duration::MAX` when unbounded
    pub fn remaining(&self) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    pub fn check(&self) -> Result<(), Fault> {
        if self.is_expired() {
            return Err(Fault::Timeout);
        }
        Ok(())
    }
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.deadline {
            Some(_) => write!(f, "Timeout({:?} left)", self.remaining()),
            None => write!(f, "Timeout(unbounded)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired() {
        let t = Timeout::new(Duration::ZERO);
        assert!(t.is_expired());
        assert_eq!(t.check(), Err(Fault::Timeout));
        assert_eq!(t.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_unbounded() {
        let t = Timeout::unbounded();
        assert!(t.check().is_ok());
        assert_eq!(t.remaining(), Duration::MAX);
    }
}
