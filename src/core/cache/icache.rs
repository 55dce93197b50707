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

//! Instruction cache controller
//!
//! A direct-mapped, read-only cache in front of the fetch stage. Hits are
//! combinational: with the controller idle, a fetch whose set is valid and
//! tag matches is answered in the same cycle with no stall. A miss raises
//! the frontend stall and walks a four-state refill sequence that emulates
//! a line burst over the single-beat bus:
//!
//! | State           | Action                                       |
//! |-----------------|----------------------------------------------|
//! | `IdleCompare`   | compare; on miss latch line base, count = 0  |
//! | `RefillRequest` | drive one AR at `base + count * 4`           |
//! | `RefillWait`    | take one R beat into word `count`            |
//! | `UpdateTag`     | commit tag + valid, return to idle           |
//!
//! `RefillRequest` and `RefillWait` alternate four times. AR is driven only
//! in `RefillRequest`, so it deasserts the cycle after its handshake and is
//! never re-issued. The tag is committed only in `UpdateTag`, after all
//! four words are stored, so a partially filled line can never hit. The
//! cycle after `UpdateTag` the still-presented fetch hits from the array.
//!
//! Nothing but the refill sequencer ever writes the data array.

use crate::core::bus::{MasterPort, PortEvents};
use crate::core::cache::{CacheStats, LineAddress, LineStore, WORDS_PER_LINE};
use crate::core::cpu::{CpuReply, FetchRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum IcacheState {
    #[default]
    IdleCompare,
    RefillRequest,
    RefillWait,
    UpdateTag,
}

/// Read-only instruction cache with a 4-beat refill sequencer.
pub struct ICache {
    store: LineStore,
    state: IcacheState,
    /// 16-byte-aligned base of the line being refilled.
    miss_base: u32,
    /// Next word of the line to request (0-3).
    refill_cnt: usize,
    /// The next idle-state hit completes a miss already counted.
    fresh_fill: bool,
    stats: CacheStats,
}

impl ICache {
    /// Create an instruction cache with every set invalid.
    pub fn new() -> Self {
        Self {
            store: LineStore::new(),
            state: IcacheState::IdleCompare,
            miss_base: 0,
            refill_cnt: 0,
            fresh_fill: false,
            stats: CacheStats::default(),
        }
    }

    /// Combinational reply to the fetch stage for this cycle.
    pub fn cpu_out(&self, req: Option<FetchRequest>) -> CpuReply {
        match self.state {
            IcacheState::IdleCompare => match req {
                Some(fetch) => {
                    let at = LineAddress::split(fetch.addr);
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
                None => CpuReply::default(),
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
            IcacheState::RefillRequest => MasterPort {
                ar_valid: true,
                ar_addr: self.miss_base + (self.refill_cnt as u32) * 4,
                ..Default::default()
            },
            IcacheState::RefillWait => MasterPort {
                r_ready: true,
                ..Default::default()
            },
            _ => MasterPort::default(),
        }
    }

    /// Commit next-cycle state from this cycle's request and bus beats.
    pub fn update(&mut self, req: Option<FetchRequest>, ev: &PortEvents) {
        match self.state {
            IcacheState::IdleCompare => {
                let was_fresh = self.fresh_fill;
                self.fresh_fill = false;
                if let Some(fetch) = req {
                    let at = LineAddress::split(fetch.addr);
                    if self.store.is_hit(&at) {
                        if !was_fresh {
                            self.stats.record(true);
                        }
                    } else {
                        self.stats.record(false);
                        self.miss_base = LineAddress::line_base(fetch.addr);
                        self.refill_cnt = 0;
                        self.state = IcacheState::RefillRequest;
                        log::trace!(
                            "I-Cache miss @ 0x{:08X}, refilling line 0x{:08X}",
                            fetch.addr,
                            self.miss_base
                        );
                    }
                }
            }
            IcacheState::RefillRequest => {
                if ev.ar {
                    self.state = IcacheState::RefillWait;
                }
            }
            IcacheState::RefillWait => {
                if ev.r {
                    let index = LineAddress::split(self.miss_base).index;
                    self.store.set_word(index, self.refill_cnt, ev.r_data);
                    if self.refill_cnt == WORDS_PER_LINE - 1 {
                        self.state = IcacheState::UpdateTag;
                    } else {
                        self.refill_cnt += 1;
                        self.state = IcacheState::RefillRequest;
                    }
                }
            }
            IcacheState::UpdateTag => {
                let at = LineAddress::split(self.miss_base);
                self.store.commit_tag(at.index, at.tag);
                self.fresh_fill = true;
                self.state = IcacheState::IdleCompare;
                log::trace!("I-Cache line 0x{:08X} valid", self.miss_base);
            }
        }
    }

    /// Hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Whether the set holding `addr` currently has a valid line. Exposed
    /// for the harness and tests; the pipeline never sees this.
    pub fn line_valid(&self, addr: u32) -> bool {
        self.store.is_valid(LineAddress::split(addr).index)
    }

    /// Restore the post-reset state: all sets invalid, sequencer idle.
    pub fn reset(&mut self) {
        self.store.reset();
        self.state = IcacheState::IdleCompare;
        self.refill_cnt = 0;
        self.fresh_fill = false;
        self.stats = CacheStats::default();
    }
}

impl Default for ICache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch(addr: u32) -> Option<FetchRequest> {
        Some(FetchRequest { addr })
    }

    fn r_beat(data: u32) -> PortEvents {
        PortEvents {
            r: true,
            r_data: data,
            ..Default::default()
        }
    }

    fn ar_beat() -> PortEvents {
        PortEvents {
            ar: true,
            ..Default::default()
        }
    }

    /// Drive a full refill of the line at `base` with the given words.
    fn refill(cache: &mut ICache, base: u32, words: [u32; 4]) {
        let req = fetch(base);
        cache.update(req, &PortEvents::default()); // IdleCompare -> RefillRequest
        for word in words {
            assert!(cache.bus_out().ar_valid);
            cache.update(req, &ar_beat()); // -> RefillWait
            assert!(cache.bus_out().r_ready);
            cache.update(req, &r_beat(word)); // -> RefillRequest or UpdateTag
        }
        cache.update(req, &PortEvents::default()); // UpdateTag -> IdleCompare
    }

    #[test]
    fn test_no_request_no_stall() {
        let cache = ICache::new();
        let reply = cache.cpu_out(None);
        assert!(!reply.stall);
    }

    #[test]
    fn test_cold_cache_misses() {
        let cache = ICache::new();
        assert!(cache.cpu_out(fetch(0x100)).stall);
    }

    #[test]
    fn test_idle_bus_is_quiet() {
        let cache = ICache::new();
        let port = cache.bus_out();
        assert!(!port.ar_valid && !port.r_ready);
        assert!(!port.aw_valid && !port.w_valid && !port.b_ready);
    }

    #[test]
    fn test_refill_ar_addresses_ascend_by_word() {
        let mut cache = ICache::new();
        let req = fetch(0x108); // middle of the line: base must still be 0x100
        cache.update(req, &PortEvents::default());

        for i in 0..4u32 {
            let port = cache.bus_out();
            assert!(port.ar_valid);
            assert_eq!(port.ar_addr, 0x100 + i * 4);
            cache.update(req, &ar_beat());

            // AR must be deasserted the cycle after its handshake.
            assert!(!cache.bus_out().ar_valid);
            cache.update(req, &r_beat(i));
        }
    }

    #[test]
    fn test_tag_commits_only_after_last_word() {
        let mut cache = ICache::new();
        let req = fetch(0x100);
        cache.update(req, &PortEvents::default());

        // Three of four words stored: still not a hit, still stalling.
        for i in 0..3 {
            cache.update(req, &ar_beat());
            cache.update(req, &r_beat(i));
            assert!(!cache.line_valid(0x100));
            assert!(cache.cpu_out(req).stall);
        }

        cache.update(req, &ar_beat());
        cache.update(req, &r_beat(3));
        // Last word stored, but the tag commit is a separate cycle.
        assert!(!cache.line_valid(0x100));
        cache.update(req, &PortEvents::default());
        assert!(cache.line_valid(0x100));
        assert!(!cache.cpu_out(req).stall);
    }

    #[test]
    fn test_hit_after_refill_returns_each_word() {
        let mut cache = ICache::new();
        refill(&mut cache, 0x100, [0xAA, 0xBB, 0xCC, 0xDD]);

        for (i, expect) in [0xAA, 0xBB, 0xCC, 0xDD].iter().enumerate() {
            let reply = cache.cpu_out(fetch(0x100 + (i as u32) * 4));
            assert!(!reply.stall);
            assert_eq!(reply.data, *expect);
        }
    }

    #[test]
    fn test_aliasing_line_replaces_previous() {
        let mut cache = ICache::new();
        refill(&mut cache, 0x0000_0100, [1, 2, 3, 4]);
        refill(&mut cache, 0x0001_0100, [5, 6, 7, 8]);

        assert!(cache.cpu_out(fetch(0x0000_0100)).stall);
        let reply = cache.cpu_out(fetch(0x0001_0100));
        assert!(!reply.stall);
        assert_eq!(reply.data, 5);
    }

    #[test]
    fn test_miss_counts_once_per_access() {
        let mut cache = ICache::new();
        refill(&mut cache, 0x100, [1, 2, 3, 4]);
        // The post-refill hit cycle belongs to the miss already recorded.
        cache.update(fetch(0x100), &PortEvents::default());
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 1 });

        // A genuinely new access to the line is a hit.
        cache.update(fetch(0x104), &PortEvents::default());
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_stall_high_throughout_refill() {
        let mut cache = ICache::new();
        let req = fetch(0x200);
        assert!(cache.cpu_out(req).stall);
        cache.update(req, &PortEvents::default());
        for _ in 0..4 {
            assert!(cache.cpu_out(req).stall);
            cache.update(req, &ar_beat());
            assert!(cache.cpu_out(req).stall);
            cache.update(req, &r_beat(0));
        }
        // UpdateTag cycle still stalls; the following idle cycle hits.
        assert!(cache.cpu_out(req).stall);
        cache.update(req, &PortEvents::default());
        assert!(!cache.cpu_out(req).stall);
    }

    #[test]
    fn test_reset_invalidates_lines() {
        let mut cache = ICache::new();
        refill(&mut cache, 0x100, [1, 2, 3, 4]);
        cache.reset();
        assert!(!cache.line_valid(0x100));
        assert!(cache.cpu_out(fetch(0x100)).stall);
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
