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

//! Single-beat memory bus
//!
//! The bus between a cache and its downstream slave is a five-channel
//! handshaked interface. Each channel carries a `valid` signal asserted by
//! its source and a `ready` signal asserted by its sink; a transfer (one
//! beat) occurs on a clock edge where both are high.
//!
//! | Channel | Direction      | Payload                       |
//! |---------|----------------|-------------------------------|
//! | AR      | master → slave | 32-bit read address           |
//! | R       | slave → master | 32-bit data, 2-bit response   |
//! | AW      | master → slave | 32-bit write address          |
//! | W       | master → slave | 32-bit data, 4-bit strobe     |
//! | B       | slave → master | 2-bit response                |
//!
//! Handshake rules, which every component in this crate preserves:
//!
//! - once `valid` is asserted it stays high, with a stable payload, until
//!   the transfer completes;
//! - `ready` may be asserted speculatively, before or after `valid`;
//! - `valid` never depends combinationally on the same cycle's `ready`;
//! - each transaction is exactly one beat: no bursts, no IDs, no `last`.
//!
//! `WSTRB` bit `i` high means byte `i` of `WDATA` is written; a low bit
//! preserves that byte at the destination.
//!
//! Because signals are sampled once per cycle, the channels are modeled as
//! plain value bundles: [`MasterPort`] holds everything a master drives,
//! [`SlavePort`] everything a slave drives, and [`PortEvents`] records which
//! beats completed on a port during the cycle, with their payloads.

pub mod arbiter;
pub mod slave;

pub use arbiter::Arbiter;
pub use slave::MemorySlave;

/// Response code carried on the R and B channels (2 bits on the wire).
///
/// The slaves in this crate always answer [`BusResp::Okay`]; the other
/// codes exist so the channel payload is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusResp {
    /// Normal completion.
    #[default]
    Okay,
    /// Exclusive-access success.
    ExOkay,
    /// Slave error.
    SlvErr,
    /// Decode error.
    DecErr,
}

impl BusResp {
    /// Wire encoding of the response.
    pub fn bits(self) -> u8 {
        match self {
            BusResp::Okay => 0b00,
            BusResp::ExOkay => 0b01,
            BusResp::SlvErr => 0b10,
            BusResp::DecErr => 0b11,
        }
    }
}

/// One-beat handshake: a transfer completes on a cycle where both `valid`
/// and `ready` are high.
#[inline]
pub fn transfer(valid: bool, ready: bool) -> bool {
    valid && ready
}

/// Everything a bus master drives, sampled once per cycle.
///
/// A cache controller produces this bundle purely from its registered
/// state, which is what keeps `valid` independent of the same cycle's
/// `ready`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MasterPort {
    /// AR channel valid.
    pub ar_valid: bool,
    /// AR channel address.
    pub ar_addr: u32,
    /// R channel ready.
    pub r_ready: bool,
    /// AW channel valid.
    pub aw_valid: bool,
    /// AW channel address.
    pub aw_addr: u32,
    /// W channel valid.
    pub w_valid: bool,
    /// W channel data.
    pub w_data: u32,
    /// W channel byte strobe.
    pub w_strb: u8,
    /// B channel ready.
    pub b_ready: bool,
}

/// Everything a bus slave drives, sampled once per cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlavePort {
    /// AR channel ready.
    pub ar_ready: bool,
    /// R channel valid.
    pub r_valid: bool,
    /// R channel data.
    pub r_data: u32,
    /// R channel response.
    pub r_resp: BusResp,
    /// AW channel ready.
    pub aw_ready: bool,
    /// W channel ready.
    pub w_ready: bool,
    /// B channel valid.
    pub b_valid: bool,
    /// B channel response.
    pub b_resp: BusResp,
}

/// The beats that completed on one bus port during one cycle, with their
/// payloads.
///
/// Both sides of a port observe the same beats, so the same bundle is fed
/// back into the master and the slave when committing next-cycle state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortEvents {
    /// An AR beat completed.
    pub ar: bool,
    /// Address carried by the AR beat.
    pub ar_addr: u32,
    /// An R beat completed.
    pub r: bool,
    /// Data carried by the R beat.
    pub r_data: u32,
    /// Response carried by the R beat.
    pub r_resp: BusResp,
    /// An AW beat completed.
    pub aw: bool,
    /// Address carried by the AW beat.
    pub aw_addr: u32,
    /// A W beat completed.
    pub w: bool,
    /// Data carried by the W beat.
    pub w_data: u32,
    /// Strobe carried by the W beat.
    pub w_strb: u8,
    /// A B beat completed.
    pub b: bool,
    /// Response carried by the B beat.
    pub b_resp: BusResp,
}

impl PortEvents {
    /// Compute the beats on a port whose master and slave are wired
    /// point-to-point, with no arbiter in between.
    pub fn connect(m: &MasterPort, s: &SlavePort) -> Self {
        PortEvents {
            ar: transfer(m.ar_valid, s.ar_ready),
            ar_addr: m.ar_addr,
            r: transfer(s.r_valid, m.r_ready),
            r_data: s.r_data,
            r_resp: s.r_resp,
            aw: transfer(m.aw_valid, s.aw_ready),
            aw_addr: m.aw_addr,
            w: transfer(m.w_valid, s.w_ready),
            w_data: m.w_data,
            w_strb: m.w_strb,
            b: transfer(s.b_valid, m.b_ready),
            b_resp: s.b_resp,
        }
    }
}
