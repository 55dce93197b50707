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

//! Data cache controller
//!
//! A direct-mapped write-through cache in front of the memory stage. Reads
//! of cacheable addresses behave exactly like the instruction cache:
//! combinational hit, four-beat refill on miss. Three more paths make up
//! the eight states:
//!
//! | State           | Purpose                                          |
//! |-----------------|--------------------------------------------------|
//! | `IdleCompare`   | decision hub: fork on write / MMIO / hit / miss  |
//! | `RefillRequest` | AR phase of a cacheable read miss                |
//! | `RefillWait`    | R phase of the refill, loops four times          |
//! | `UpdateTag`     | atomic tag + valid commit                        |
//! | `ReadMmio`      | single AR at the exact (unaligned-to-line) addr  |
//! | `ReadMmioWait`  | single R, forwarded straight to the CPU          |
//! | `WriteBus`      | drive AW and W together, each with a done flag   |
//! | `WaitBValid`    | hold until the write response arrives            |
//!
//! **Stores** are write-through with no write-allocate: a write hit updates
//! the line's bytes under the strobe mask *and* goes to the bus; a write
//! miss goes to the bus without fetching the line. AW and W are driven
//! simultaneously; a latched done flag per channel absorbs slaves that
//! accept them in either order. The stall toward the pipeline is released
//! in the `IdleCompare` cycle after the B handshake; a registered
//! completion flag keeps the still-presented store from dispatching twice,
//! so every store costs exactly one AW/W/B triple.
//!
//! **MMIO** (`addr >= 0x2000_0000`) bypasses the arrays in both directions.
//! An MMIO read issues one AR at the request address and forwards the R
//! payload combinationally to the CPU, so a side-effect-bearing peripheral
//! register is read exactly once per CPU request. MMIO stores take the
//! plain write path; the hit update is suppressed.

use crate::core::bus::{MasterPort, PortEvents};
use crate::core::cache::{is_mmio, CacheStats, LineAddress, LineStore, WORDS_PER_LINE};
use crate::core::cpu::{CpuReply, DataRequest, MemWidth};

/// Byte strobe for a store of `width` at byte offset `byte` within a word.
///
/// | width | offset | strobe |
/// |-------|--------|--------|
/// | byte  | 0..=3  | one-hot at the offset |
/// | half  | 0, 2   | `0b0011`, `0b1100`    |
/// | word  | 0      | `0b1111`              |
///
/// Misaligned half/word stores are undefined; the pipeline must not issue
/// them. In debug builds they are caught here.
pub fn write_strobe(width: MemWidth, byte: usize) -> u8 {
    match (width, byte) {
        (MemWidth::Byte, 0..=3) => 1 << byte,
        (MemWidth::Half, 0) => 0b0011,
        (MemWidth::Half, 2) => 0b1100,
        (MemWidth::Word, 0) => 0b1111,
        _ => {
            debug_assert!(false, "misaligned {:?} store at byte offset {}", width, byte);
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DcacheState {
    #[default]
    IdleCompare,
    RefillRequest,
    RefillWait,
    UpdateTag,
    ReadMmio,
    ReadMmioWait,
    WriteBus,
    WaitBValid,
}

/// Write-through, no-write-allocate data cache with MMIO bypass.
pub struct DCache {
    store: LineStore,
    state: DcacheState,

    /// 16-byte-aligned base of the line being refilled.
    miss_base: u32,
    /// Next word of the line to request (0-3).
    refill_cnt: usize,
    /// The next idle-state read hit completes a miss already counted.
    fresh_fill: bool,

    /// Exact address of an in-flight MMIO read.
    mmio_addr: u32,

    /// Latched store: address, raw data, strobe.
    waddr: u32,
    wdata: u32,
    wstrb: u8,
    /// Per-channel acceptance flags for the concurrent AW/W drive.
    aw_done: bool,
    w_done: bool,
    /// B handshake seen; release the stall next `IdleCompare` cycle.
    write_done: bool,

    stats: CacheStats,
}

impl DCache {
    /// Create a data cache with every set invalid.
    pub fn new() -> Self {
        Self {
            store: LineStore::new(),
            state: DcacheState::IdleCompare,
            miss_base: 0,
            refill_cnt: 0,
            fresh_fill: false,
            mmio_addr: 0,
            waddr: 0,
            wdata: 0,
            wstrb: 0,
            aw_done: false,
            w_done: false,
            write_done: false,
            stats: CacheStats::default(),
        }
    }

    /// Combinational reply to the memory stage for this cycle.
    ///
    /// `ev` carries this cycle's bus beats as routed to this cache; it is
    /// needed only by the MMIO read path, which forwards the R payload
    /// straight through instead of going via the data array.
    pub fn cpu_out(&self, req: Option<DataRequest>, ev: &PortEvents) -> CpuReply {
        match self.state {
            DcacheState::IdleCompare => {
                if self.write_done {
                    // Completion cycle of a store: stall released, no data.
                    return CpuReply::default();
                }
                match req {
                    Some(DataRequest::Read { addr }) if !is_mmio(addr) => {
                        let at = LineAddress::split(addr);
                        if self.store.is_hit(&at) {
                            CpuReply {
                                data: self.store.word(at.index, at.word),
                                stall: false,
                            }
                        } else {
                            CpuReply {
                                data: 0,
                                stall: true,
                            }
                        }
                    }
                    Some(_) => CpuReply {
                        data: 0,
                        stall: true,
                    },
                    None => CpuReply::default(),
                }
            }
            DcacheState::ReadMmioWait => CpuReply {
                data: ev.r_data,
                stall: !ev.r,
            },
            _ => CpuReply {
                data: 0,
                stall: true,
            },
        }
    }

    /// Bus signals driven this cycle, from registered state only.
    pub fn bus_out(&self) -> MasterPort {
        match self.state {
            DcacheState::RefillRequest => MasterPort {
                ar_valid: true,
                ar_addr: self.miss_base + (self.refill_cnt as u32) * 4,
                ..Default::default()
            },
            DcacheState::RefillWait => MasterPort {
                r_ready: true,
                ..Default::default()
            },
            DcacheState::ReadMmio => MasterPort {
                ar_valid: true,
                ar_addr: self.mmio_addr,
                ..Default::default()
            },
            DcacheState::ReadMmioWait => MasterPort {
                r_ready: true,
                ..Default::default()
            },
            DcacheState::WriteBus => MasterPort {
                aw_valid: !self.aw_done,
                aw_addr: self.waddr,
                w_valid: !self.w_done,
                w_data: self.wdata,
                w_strb: self.wstrb,
                ..Default::default()
            },
            DcacheState::WaitBValid => MasterPort {
                b_ready: true,
                ..Default::default()
            },
            _ => MasterPort::default(),
        }
    }

    /// Commit next-cycle state from this cycle's request and bus beats.
    pub fn update(&mut self, req: Option<DataRequest>, ev: &PortEvents) {
        match self.state {
            DcacheState::IdleCompare => self.decide(req),
            DcacheState::RefillRequest => {
                if ev.ar {
                    self.state = DcacheState::RefillWait;
                }
            }
            DcacheState::RefillWait => {
                if ev.r {
                    let index = LineAddress::split(self.miss_base).index;
                    self.store.set_word(index, self.refill_cnt, ev.r_data);
                    if self.refill_cnt == WORDS_PER_LINE - 1 {
                        self.state = DcacheState::UpdateTag;
                    } else {
                        self.refill_cnt += 1;
                        self.state = DcacheState::RefillRequest;
                    }
                }
            }
            DcacheState::UpdateTag => {
                let at = LineAddress::split(self.miss_base);
                self.store.commit_tag(at.index, at.tag);
                self.fresh_fill = true;
                self.state = DcacheState::IdleCompare;
                log::trace!("D-Cache line 0x{:08X} valid", self.miss_base);
            }
            DcacheState::ReadMmio => {
                if ev.ar {
                    self.state = DcacheState::ReadMmioWait;
                }
            }
            DcacheState::ReadMmioWait => {
                if ev.r {
                    self.state = DcacheState::IdleCompare;
                }
            }
            DcacheState::WriteBus => {
                let aw_now = self.aw_done || ev.aw;
                let w_now = self.w_done || ev.w;
                self.aw_done = aw_now;
                self.w_done = w_now;
                if aw_now && w_now {
                    self.state = DcacheState::WaitBValid;
                }
            }
            DcacheState::WaitBValid => {
                if ev.b {
                    self.write_done = true;
                    self.state = DcacheState::IdleCompare;
                }
            }
        }
    }

    /// The `IdleCompare` fork on write / MMIO / hit / miss.
    fn decide(&mut self, req: Option<DataRequest>) {
        if self.write_done {
            // The store whose stall was just released is still presented;
            // consume the flag instead of dispatching it again.
            self.write_done = false;
            return;
        }
        let was_fresh = self.fresh_fill;
        self.fresh_fill = false;

        let Some(req) = req else { return };
        match req {
            DataRequest::Write { addr, value, width } => {
                let at = LineAddress::split(addr);
                let strb = write_strobe(width, at.byte);
                if !is_mmio(addr) {
                    if self.store.is_hit(&at) {
                        // Write-through: the array copy is updated in
                        // place under the strobe mask.
                        self.store.write_word(at.index, at.word, value, strb);
                        self.stats.record(true);
                    } else {
                        // No write-allocate: the line is not fetched.
                        self.stats.record(false);
                    }
                }
                self.waddr = addr;
                self.wdata = value;
                self.wstrb = strb;
                self.aw_done = false;
                self.w_done = false;
                self.state = DcacheState::WriteBus;
                log::trace!(
                    "D-Cache store 0x{:08X} <- 0x{:08X} strb=0b{:04b}",
                    addr,
                    value,
                    strb
                );
            }
            DataRequest::Read { addr } if is_mmio(addr) => {
                self.mmio_addr = addr;
                self.state = DcacheState::ReadMmio;
                log::trace!("D-Cache MMIO read @ 0x{:08X}", addr);
            }
            DataRequest::Read { addr } => {
                let at = LineAddress::split(addr);
                if self.store.is_hit(&at) {
                    if !was_fresh {
                        self.stats.record(true);
                    }
                } else {
                    self.stats.record(false);
                    self.miss_base = LineAddress::line_base(addr);
                    self.refill_cnt = 0;
                    self.state = DcacheState::RefillRequest;
                    log::trace!(
                        "D-Cache miss @ 0x{:08X}, refilling line 0x{:08X}",
                        addr,
                        self.miss_base
                    );
                }
            }
        }
    }

    /// Hit/miss counters. MMIO accesses are not counted; they never touch
    /// the arrays.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Whether the set holding `addr` currently has a valid line. Exposed
    /// for the harness and tests; the pipeline never sees this.
    pub fn line_valid(&self, addr: u32) -> bool {
        self.store.is_valid(LineAddress::split(addr).index)
    }

    /// Number of valid sets, for observing that MMIO traffic leaves the
    /// arrays untouched.
    pub fn valid_lines(&self) -> usize {
        self.store.valid_count()
    }

    /// Restore the post-reset state: all sets invalid, sequencer idle.
    pub fn reset(&mut self) {
        self.store.reset();
        self.state = DcacheState::IdleCompare;
        self.refill_cnt = 0;
        self.fresh_fill = false;
        self.aw_done = false;
        self.w_done = false;
        self.write_done = false;
        self.stats = CacheStats::default();
    }
}

impl Default for DCache {
    fn default() -> Self {
        Self::new()
    }
}
