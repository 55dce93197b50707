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

//! Core model components
//!
//! - [`bus`]: the five-channel single-beat bus, its memory slave and the
//!   two-master arbiter
//! - [`cache`]: cache geometry plus the I-Cache and D-Cache controllers
//! - [`cpu`]: the request contract the pipeline presents to the caches
//! - [`mem`]: backing RAM and the memory-mapped device trait
//! - [`system`]: the integrated subsystem and its cycle stepper
//! - [`config`]: TOML run configuration
//! - [`trace`]: the operation trace format replayed by `rvcache-sim`
//! - [`error`]: the crate error type

pub mod bus;
pub mod cache;
pub mod config;
pub mod cpu;
pub mod error;
pub mod mem;
pub mod system;
pub mod trace;

pub use error::{Result, SimError};
pub use system::MemorySystem;
