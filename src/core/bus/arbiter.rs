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

//! Bus arbiter
//!
//! Two masters share the one memory slave: m0 is the I-Cache, m1 the
//! D-Cache. The arbiter is a fixed-priority multiplexer with m1 strictly
//! first.
//!
//! **Write channels** are wired straight through from m1. The I-Cache is
//! read-only, so m0's write side is tied off: it sees `AW.ready = 0`,
//! `W.ready = 0` and `B.valid = 0` forever.
//!
//! **Read channels** are arbitrated by a three-state machine. An AR is
//! forwarded only while idle; the handshake locks the R channel to the
//! master that issued it, guaranteeing the response is delivered to the
//! right requester. Each cache keeps at most one read outstanding, so no
//! queue is needed:
//!
//! | State       | Meaning                     | Leaves on      |
//! |-------------|-----------------------------|----------------|
//! | `Idle`      | no read in flight           | AR handshake   |
//! | `DataRead`  | m1 owns the R channel       | R handshake    |
//! | `FetchRead` | m0 owns the R channel       | R handshake    |
//!
//! A D-Cache that is perpetually busy can therefore starve the I-Cache;
//! backend transactions are short-lived (one beat each), which bounds the
//! wait in practice.

use crate::core::bus::{transfer, MasterPort, PortEvents, SlavePort};

/// Read-channel ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ArbiterState {
    /// No read transaction is in flight downstream.
    #[default]
    Idle,
    /// The D-Cache (m1) owns the R channel.
    DataRead,
    /// The I-Cache (m0) owns the R channel.
    FetchRead,
}

/// Everything the arbiter resolves combinationally in one cycle.
///
/// `fetch` and `data` are the beats each master observed; `slave` is the
/// merged view the slave observed. The same value is handed back to
/// [`Arbiter::update`] to advance the state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArbiterWires {
    /// Beats seen by m0, the I-Cache.
    pub fetch: PortEvents,
    /// Beats seen by m1, the D-Cache.
    pub data: PortEvents,
    /// Beats seen by the downstream slave.
    pub slave: PortEvents,
}

/// Fixed-priority two-master read arbiter with pass-through writes.
pub struct Arbiter {
    state: ArbiterState,
}

impl Arbiter {
    /// Create an arbiter in the idle state.
    pub fn new() -> Self {
        Self {
            state: ArbiterState::Idle,
        }
    }

    /// Resolve one cycle of routing between the two masters and the slave.
    ///
    /// Purely combinational: reads only registered state and this cycle's
    /// sampled port signals.
    pub fn connect(&self, fetch: &MasterPort, data: &MasterPort, s: &SlavePort) -> ArbiterWires {
        let mut wires = ArbiterWires::default();

        // Write side: m1 only. m0's write channels are dead.
        wires.data.aw = transfer(data.aw_valid, s.aw_ready);
        wires.data.aw_addr = data.aw_addr;
        wires.data.w = transfer(data.w_valid, s.w_ready);
        wires.data.w_data = data.w_data;
        wires.data.w_strb = data.w_strb;
        wires.data.b = transfer(s.b_valid, data.b_ready);
        wires.data.b_resp = s.b_resp;

        // Read side: route AR while idle, with m1 first; lock R to the owner.
        match self.state {
            ArbiterState::Idle => {
                if data.ar_valid {
                    wires.data.ar = transfer(data.ar_valid, s.ar_ready);
                    wires.data.ar_addr = data.ar_addr;
                } else if fetch.ar_valid {
                    wires.fetch.ar = transfer(fetch.ar_valid, s.ar_ready);
                    wires.fetch.ar_addr = fetch.ar_addr;
                }
            }
            ArbiterState::DataRead => {
                wires.data.r = transfer(s.r_valid, data.r_ready);
                wires.data.r_data = s.r_data;
                wires.data.r_resp = s.r_resp;
            }
            ArbiterState::FetchRead => {
                wires.fetch.r = transfer(s.r_valid, fetch.r_ready);
                wires.fetch.r_data = s.r_data;
                wires.fetch.r_resp = s.r_resp;
            }
        }

        // The slave sees the union of whatever was routed.
        wires.slave = PortEvents {
            ar: wires.fetch.ar || wires.data.ar,
            ar_addr: if wires.data.ar {
                wires.data.ar_addr
            } else {
                wires.fetch.ar_addr
            },
            r: wires.fetch.r || wires.data.r,
            r_data: s.r_data,
            r_resp: s.r_resp,
            aw: wires.data.aw,
            aw_addr: wires.data.aw_addr,
            w: wires.data.w,
            w_data: wires.data.w_data,
            w_strb: wires.data.w_strb,
            b: wires.data.b,
            b_resp: wires.data.b_resp,
        };

        wires
    }

    /// Commit the read-ownership transition for this cycle.
    pub fn update(&mut self, wires: &ArbiterWires) {
        self.state = match self.state {
            ArbiterState::Idle => {
                if wires.data.ar {
                    log::trace!("Arbiter: read granted to D-Cache @ 0x{:08X}", wires.data.ar_addr);
                    ArbiterState::DataRead
                } else if wires.fetch.ar {
                    log::trace!(
                        "Arbiter: read granted to I-Cache @ 0x{:08X}",
                        wires.fetch.ar_addr
                    );
                    ArbiterState::FetchRead
                } else {
                    ArbiterState::Idle
                }
            }
            ArbiterState::DataRead => {
                if wires.data.r {
                    ArbiterState::Idle
                } else {
                    ArbiterState::DataRead
                }
            }
            ArbiterState::FetchRead => {
                if wires.fetch.r {
                    ArbiterState::Idle
                } else {
                    ArbiterState::FetchRead
                }
            }
        };
    }

    /// Return to the idle state.
    pub fn reset(&mut self) {
        self.state = ArbiterState::Idle;
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}
