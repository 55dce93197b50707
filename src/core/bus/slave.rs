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

//! Memory slave
//!
//! [`MemorySlave`] is the single downstream target of the bus: a
//! word-addressed backing store behind the five-channel handshake. Its
//! contract:
//!
//! - **Reads**: one cycle of latency. `R.valid` rises the cycle after the
//!   AR handshake and holds, with stable data, until the master takes the
//!   beat. At most one read is in flight; `AR.ready` is low while one is.
//! - **Writes**: AW and W are accepted independently, in either order or
//!   together. Once both halves have arrived the write commits (data masked
//!   by the strobe) and `B.valid` rises the following cycle. No new AW/W is
//!   accepted until the B response is taken.
//! - **Responses**: always OKAY, on both R and B.
//!
//! Addresses are routed to the first attached [`MmioDevice`] whose range
//! contains them, and otherwise to [`Ram`]. Devices normally claim ranges
//! in the uncacheable region at and above `0x2000_0000`; the slave itself
//! does not care where a range sits. Device reads happen once, at the AR
//! handshake, so side-effect-bearing registers fire exactly once per beat.

use crate::core::bus::{BusResp, PortEvents, SlavePort};
use crate::core::mem::{MmioDevice, Ram};

/// The single-beat memory slave backing both caches.
pub struct MemorySlave {
    ram: Ram,
    devices: Vec<Box<dyn MmioDevice>>,

    /// Read data captured at the AR handshake, presented on R until taken.
    read_pending: Option<u32>,
    /// Accepted write address, awaiting its W half (or the commit).
    aw_pending: Option<u32>,
    /// Accepted write data and strobe, awaiting its AW half (or the commit).
    w_pending: Option<(u32, u8)>,
    /// A committed write whose B response has not been taken yet.
    b_pending: bool,

    reads: u64,
    writes: u64,
}

impl MemorySlave {
    /// Create a slave over the given backing RAM, with no devices attached.
    pub fn new(ram: Ram) -> Self {
        Self {
            ram,
            devices: Vec::new(),
            read_pending: None,
            aw_pending: None,
            w_pending: None,
            b_pending: false,
            reads: 0,
            writes: 0,
        }
    }

    /// Attach a memory-mapped device. Earlier devices win on overlap.
    pub fn add_device(&mut self, device: Box<dyn MmioDevice>) {
        let (start, end) = device.address_range();
        log::debug!("Mapped device at 0x{:08X}..=0x{:08X}", start, end);
        self.devices.push(device);
    }

    /// Backing RAM, for preloading images.
    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    /// Mutable backing RAM, for preloading images.
    pub fn ram_mut(&mut self) -> &mut Ram {
        &mut self.ram
    }

    /// Read beats served so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Write transactions completed (B responses issued) so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Signals driven this cycle, computed from registered state only.
    pub fn outputs(&self) -> SlavePort {
        SlavePort {
            ar_ready: self.read_pending.is_none(),
            r_valid: self.read_pending.is_some(),
            r_data: self.read_pending.unwrap_or(0),
            r_resp: BusResp::Okay,
            aw_ready: self.aw_pending.is_none() && !self.b_pending,
            w_ready: self.w_pending.is_none() && !self.b_pending,
            b_valid: self.b_pending,
            b_resp: BusResp::Okay,
        }
    }

    /// Commit next-cycle state from the beats observed this cycle.
    pub fn update(&mut self, ev: &PortEvents) {
        if ev.r {
            self.read_pending = None;
        }
        if ev.ar {
            // The target is consulted exactly once, at the handshake.
            let data = self.read_target(ev.ar_addr);
            log::trace!("Slave read  0x{:08X} -> 0x{:08X}", ev.ar_addr, data);
            self.read_pending = Some(data);
            self.reads += 1;
        }

        if ev.b {
            self.b_pending = false;
        }
        if ev.aw {
            self.aw_pending = Some(ev.aw_addr);
        }
        if ev.w {
            self.w_pending = Some((ev.w_data, ev.w_strb));
        }
        if let (Some(addr), Some((data, strb))) = (self.aw_pending, self.w_pending) {
            log::trace!(
                "Slave write 0x{:08X} <- 0x{:08X} strb=0b{:04b}",
                addr,
                data,
                strb
            );
            self.write_target(addr, data, strb);
            self.aw_pending = None;
            self.w_pending = None;
            self.b_pending = true;
            self.writes += 1;
        }
    }

    /// Restore the post-reset state: no transaction in flight, RAM zeroed.
    pub fn reset(&mut self) {
        self.ram.reset();
        self.read_pending = None;
        self.aw_pending = None;
        self.w_pending = None;
        self.b_pending = false;
        self.reads = 0;
        self.writes = 0;
    }

    fn read_target(&mut self, addr: u32) -> u32 {
        for device in &mut self.devices {
            if device.contains(addr) {
                let (start, _) = device.address_range();
                return device.read_word(addr - start);
            }
        }
        self.ram.read_word(addr)
    }

    fn write_target(&mut self, addr: u32, data: u32, strb: u8) {
        for device in &mut self.devices {
            if device.contains(addr) {
                let (start, _) = device.address_range();
                device.write_word(addr - start, data, strb);
                return;
            }
        }
        self.ram.write_word(addr, data, strb);
    }
}
