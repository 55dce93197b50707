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

//! Error types for the cache subsystem model
//!
//! All fallible operations in this crate return [`Result<T>`], an alias for
//! `Result<T, SimError>`.
//!
//! The modeled hardware itself never reports errors: bus responses are
//! assumed OKAY and the only back-pressure signal a cache raises toward the
//! CPU is its stall line. Errors therefore arise only at the edges of the
//! model: loading images and configuration, rejecting requests the pipeline
//! contract forbids, parsing operation traces, and the watchdog that bounds
//! how long the harness will wait for a stall to deassert.

use std::fmt;
use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors produced by the simulation harness.
#[derive(Debug)]
pub enum SimError {
    /// A memory image file could not be found or opened.
    ImageNotFound(String),

    /// A memory image does not fit into the backing RAM.
    ImageTooLarge {
        /// RAM capacity in bytes.
        limit: usize,
        /// Image size (plus load offset) in bytes.
        got: usize,
    },

    /// The harness was asked to issue a request the pipeline contract
    /// forbids (misaligned half/word store, misaligned fetch).
    UnalignedAccess {
        /// Requested address.
        address: u32,
        /// Access size in bytes.
        size: u32,
    },

    /// A request did not complete within the watchdog cycle budget,
    /// indicating a stuck handshake.
    Watchdog {
        /// Number of cycles waited before giving up.
        cycles: u64,
    },

    /// A line of an operation trace could not be parsed.
    TraceParse {
        /// 1-based line number within the trace file.
        line: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// A configuration file could not be parsed or written.
    Config(String),

    /// Underlying I/O failure.
    Io(io::Error),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::ImageNotFound(path) => {
                write!(f, "memory image not found: {}", path)
            }
            SimError::ImageTooLarge { limit, got } => {
                write!(
                    f,
                    "memory image of {} bytes exceeds RAM capacity of {} bytes",
                    got, limit
                )
            }
            SimError::UnalignedAccess { address, size } => {
                write!(
                    f,
                    "unaligned {}-byte access at 0x{:08X}",
                    size, address
                )
            }
            SimError::Watchdog { cycles } => {
                write!(f, "request did not complete within {} cycles", cycles)
            }
            SimError::TraceParse { line, message } => {
                write!(f, "trace line {}: {}", line, message)
            }
            SimError::Config(message) => write!(f, "config error: {}", message),
            SimError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SimError {
    fn from(err: io::Error) -> Self {
        SimError::Io(err)
    }
}
