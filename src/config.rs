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

//! Compiler configuration
//!

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Environment variable overriding [`CompilerConfig::dump_directory`]
pub const DUMP_DIR_ENV: &str = "TESSERA_DUMP_DIR";

/// Configuration options for one compilation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Timeout handed to entry points invoked without one, in milliseconds
    /// Default: 30000 (30s); 0 means unbounded
    pub statement_timeout_ms: u64,

    /// Run the verifier on every generated method
    /// Default: true
    pub verify: bool,

    /// Directory receiving disassembly dumps of units that fail to build
    /// Default: None (dumps go to the log only)
    pub dump_directory: Option<PathBuf>,

    /// Maximum number of units one class source may generate
    /// Default: 4096
    pub max_units: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            statement_timeout_ms: 30_000, // 30s
            verify: true,
            dump_directory: None,
            max_units: 4096,
        }
    }
}

impl CompilerConfig {
    /// Creates a new CompilerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_dump_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.dump_directory = Some(dir.into());
        self
    }

    pub fn with_max_units(mut self, max_units: usize) -> Self {
        self.max_units = max_units;
        self
    }

    /// Statement timeout; `None` when unbounded
    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.statement_timeout_ms > 0).then(|| Duration::from_millis(self.statement_timeout_ms))
    }

    /// Dump directory, the environment override winning
    pub fn resolved_dump_directory(&self) -> Option<PathBuf> {
        match std::env::var_os(DUMP_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
            _ => self.dump_directory.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = CompilerConfig::new()
            .with_statement_timeout(Duration::from_secs(2))
            .with_verify(false)
            .with_max_units(8);
        assert_eq!(config.statement_timeout(), Some(Duration::from_secs(2)));
        assert!(!config.verify);
        assert_eq!(config.max_units, 8);
        assert!(CompilerConfig::default().verify);
        assert_eq!(
            CompilerConfig::new().with_statement_timeout(Duration::ZERO).statement_timeout(),
            None
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let config: CompilerConfig =
            serde_json::from_str(r#"{"verify": false, "dump_directory": "/tmp/dumps"}"#).unwrap();
        assert!(!config.verify);
        assert_eq!(config.dump_directory, Some(PathBuf::from("/tmp/dumps")));
        assert_eq!(config.statement_timeout_ms, 30_000);
    }
}
