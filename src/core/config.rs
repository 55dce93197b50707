// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
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

//! Run configuration
//!
//! [`SimConfig`] collects the knobs of a simulation run and round-trips
//! through a TOML file, so a run can be reproduced without re-typing
//! command lines:
//!
//! ```toml
//! ram_bytes = 4194304
//! watchdog_cycles = 10000
//! image = "program.bin"
//! ```
//!
//! Every field has a default; a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::error::{Result, SimError};

/// Parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Backing RAM capacity in bytes (rounded up to a power of two).
    pub ram_bytes: usize,

    /// Cycle budget the blocking helpers wait before declaring a request
    /// stuck.
    pub watchdog_cycles: u64,

    /// Optional memory image loaded into RAM at address 0.
    pub image: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ram_bytes: 4 * 1024 * 1024,
            watchdog_cycles: 10_000,
            image: None,
        }
    }
}

impl SimConfig {
    /// Load a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// [`SimError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| SimError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Write the configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// [`SimError::Config`] if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SimError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)
            .map_err(|e| SimError::Config(format!("failed to write {}: {}", path.display(), e)))
    }
}
