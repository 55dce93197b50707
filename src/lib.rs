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

//! rvcache: a cycle-accurate cache subsystem for a pipelined RV32I core
//!
//! This crate models, cycle by cycle, the two-level memory subsystem that
//! sits between an RV32I pipeline and a single-word memory bus: a
//! read-only, direct-mapped **instruction cache**, a write-through,
//! no-write-allocate **data cache**, a fixed-priority **bus arbiter**, and
//! a single-beat **memory slave** with memory-mapped peripherals.
//!
//! # Architecture
//!
//! ```text
//! CPU frontend --> I-Cache --\
//!                             >-- Arbiter --> Slave (RAM + MMIO devices)
//! CPU backend  --> D-Cache --/
//! ```
//!
//! Both caches hold 256 direct-mapped 16-byte lines and refill a line with
//! exactly four single-word bus reads. Addresses at and above
//! `0x2000_0000` are uncacheable MMIO space and bypass the arrays
//! entirely. Each cache independently stalls its half of the pipeline.
//!
//! # Example
//!
//! ```
//! use rvcache::core::cpu::MemWidth;
//! use rvcache::core::system::MemorySystem;
//!
//! let mut system = MemorySystem::new();
//! system.store(0x200, 0xDEAD_BEEF, MemWidth::Word)?;
//! assert_eq!(system.load(0x200)?, 0xDEAD_BEEF);
//! # Ok::<(), rvcache::SimError>(())
//! ```
//!
//! # Modules
//!
//! - [`core::cache`]: the two cache controllers and their shared geometry
//! - [`core::bus`]: the handshake protocol, memory slave and arbiter
//! - [`core::system`]: the integrated subsystem and its clock
//! - [`core::cpu`]: the request contract toward the pipeline
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`], an alias for
//! `Result<T, SimError>`.

pub mod core;

// Re-export commonly used types
pub use core::error::{Result, SimError};
