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

//! System integration
//!
//! [`MemorySystem`] owns the four components of the subsystem and wires
//! them the way the SoC does:
//!
//! ```text
//! CPU frontend --> I-Cache --\
//!                             >-- Arbiter --> Memory slave (RAM + MMIO)
//! CPU backend  --> D-Cache --/
//! ```
//!
//! One call to [`MemorySystem::step`] advances the whole subsystem by one
//! clock cycle, in two phases. First every component's outputs are computed
//! from its registered state (and the cycle's sampled wires); then every
//! component commits its next state. Nothing is mutated mid-evaluation, so
//! the step is faithful to synchronous hardware regardless of call order.
//!
//! On top of the cycle interface sit blocking helpers: [`fetch`],
//! [`load`] and [`store`], which present one request per the pipeline
//! contract (inputs held stable while stalled) and run the clock until the
//! stall deasserts. A watchdog bounds the wait so a stuck handshake
//! surfaces as [`SimError::Watchdog`] instead of a hang.
//!
//! [`fetch`]: MemorySystem::fetch
//! [`load`]: MemorySystem::load
//! [`store`]: MemorySystem::store

use std::fmt;

use crate::core::bus::{Arbiter, MemorySlave};
use crate::core::cache::{CacheStats, DCache, ICache};
use crate::core::config::SimConfig;
use crate::core::cpu::{CpuReply, DataRequest, FetchRequest, MemWidth};
use crate::core::error::{Result, SimError};
use crate::core::mem::{MmioDevice, Ram};

/// The combinational replies of one clock cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepOutput {
    /// I-Cache reply to the frontend.
    pub fetch: CpuReply,
    /// D-Cache reply to the backend.
    pub data: CpuReply,
}

/// Aggregate statistics over a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimStats {
    /// Clock cycles stepped.
    pub cycles: u64,
    /// I-Cache hit/miss counters.
    pub fetch: CacheStats,
    /// D-Cache hit/miss counters.
    pub data: CacheStats,
    /// Read beats served by the memory slave.
    pub bus_reads: u64,
    /// Write transactions completed by the memory slave.
    pub bus_writes: u64,
}

impl fmt::Display for SimStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cycles:      {}", self.cycles)?;
        writeln!(
            f,
            "I-Cache:     {:.2}% hit rate ({} / {})",
            self.fetch.hit_rate() * 100.0,
            self.fetch.hits,
            self.fetch.hits + self.fetch.misses
        )?;
        writeln!(
            f,
            "D-Cache:     {:.2}% hit rate ({} / {})",
            self.data.hit_rate() * 100.0,
            self.data.hits,
            self.data.hits + self.data.misses
        )?;
        write!(
            f,
            "Bus:         {} read beats, {} writes",
            self.bus_reads, self.bus_writes
        )
    }
}

/// The complete two-cache memory subsystem.
///
/// # Example
///
/// ```
/// use rvcache::core::system::MemorySystem;
/// use rvcache::core::cpu::MemWidth;
///
/// let mut system = MemorySystem::new();
/// system.store(0x200, 0xDEAD_BEEF, MemWidth::Word).unwrap();
/// assert_eq!(system.load(0x200).unwrap(), 0xDEAD_BEEF);
/// ```
pub struct MemorySystem {
    icache: ICache,
    dcache: DCache,
    arbiter: Arbiter,
    slave: MemorySlave,
    cycles: u64,
    watchdog: u64,
}

impl MemorySystem {
    /// Create a system with default-sized RAM and watchdog.
    pub fn new() -> Self {
        Self::with_config(&SimConfig::default()).expect("default config is valid")
    }

    /// Create a system from a configuration, loading its memory image if
    /// one is named.
    pub fn with_config(config: &SimConfig) -> Result<Self> {
        let mut slave = MemorySlave::new(Ram::with_size(config.ram_bytes));
        if let Some(path) = &config.image {
            let data = std::fs::read(path)
                .map_err(|_| SimError::ImageNotFound(path.display().to_string()))?;
            slave.ram_mut().load(&data, 0)?;
            log::info!("Loaded memory image {}", path.display());
        }
        Ok(Self {
            icache: ICache::new(),
            dcache: DCache::new(),
            arbiter: Arbiter::new(),
            slave,
            cycles: 0,
            watchdog: config.watchdog_cycles,
        })
    }

    /// Copy an image into backing RAM at `offset`.
    pub fn load_image(&mut self, data: &[u8], offset: usize) -> Result<()> {
        self.slave.ram_mut().load(data, offset)
    }

    /// Attach a memory-mapped device to the slave.
    pub fn add_device(&mut self, device: Box<dyn MmioDevice>) {
        self.slave.add_device(device);
    }

    /// Advance the whole subsystem by one clock cycle.
    ///
    /// `fetch` and `data` are the requests the two pipeline halves present
    /// this cycle; either may be absent. Returns the combinational replies
    /// for the same cycle.
    pub fn step(&mut self, fetch: Option<FetchRequest>, data: Option<DataRequest>) -> StepOutput {
        // Phase 1: evaluate every output from current registered state.
        let i_bus = self.icache.bus_out();
        let d_bus = self.dcache.bus_out();
        let s_out = self.slave.outputs();
        let wires = self.arbiter.connect(&i_bus, &d_bus, &s_out);

        let out = StepOutput {
            fetch: self.icache.cpu_out(fetch),
            data: self.dcache.cpu_out(data, &wires.data),
        };

        // Phase 2: commit next state everywhere at the cycle boundary.
        self.slave.update(&wires.slave);
        self.arbiter.update(&wires);
        self.icache.update(fetch, &wires.fetch);
        self.dcache.update(data, &wires.data);
        self.cycles += 1;

        out
    }

    /// Fetch the instruction word at `addr`, running the clock until the
    /// frontend stall deasserts.
    ///
    /// # Errors
    ///
    /// [`SimError::UnalignedAccess`] for a non-word-aligned address;
    /// [`SimError::Watchdog`] if the request never completes.
    pub fn fetch(&mut self, addr: u32) -> Result<u32> {
        if addr & 0x3 != 0 {
            return Err(SimError::UnalignedAccess {
                address: addr,
                size: 4,
            });
        }
        let req = Some(FetchRequest { addr });
        for _ in 0..self.watchdog {
            let out = self.step(req, None);
            if !out.fetch.stall {
                return Ok(out.fetch.data);
            }
        }
        Err(SimError::Watchdog {
            cycles: self.watchdog,
        })
    }

    /// Load the word containing `addr` through the D-Cache. The pipeline
    /// extracts narrower loads from the returned word, so no alignment is
    /// required here; MMIO loads go downstream with the exact address.
    pub fn load(&mut self, addr: u32) -> Result<u32> {
        let req = Some(DataRequest::Read { addr });
        for _ in 0..self.watchdog {
            let out = self.step(None, req);
            if !out.data.stall {
                return Ok(out.data.data);
            }
        }
        Err(SimError::Watchdog {
            cycles: self.watchdog,
        })
    }

    /// Store `width` bytes of `value` at `addr` through the D-Cache.
    ///
    /// # Errors
    ///
    /// [`SimError::UnalignedAccess`] for a misaligned half/word store,
    /// which the pipeline contract forbids; [`SimError::Watchdog`] if the
    /// write never completes.
    pub fn store(&mut self, addr: u32, value: u32, width: MemWidth) -> Result<()> {
        if addr & (width.bytes() - 1) != 0 {
            return Err(SimError::UnalignedAccess {
                address: addr,
                size: width.bytes(),
            });
        }
        let req = Some(DataRequest::Write { addr, value, width });
        for _ in 0..self.watchdog {
            let out = self.step(None, req);
            if !out.data.stall {
                return Ok(());
            }
        }
        Err(SimError::Watchdog {
            cycles: self.watchdog,
        })
    }

    /// Aggregate statistics so far.
    pub fn stats(&self) -> SimStats {
        SimStats {
            cycles: self.cycles,
            fetch: self.icache.stats(),
            data: self.dcache.stats(),
            bus_reads: self.slave.reads(),
            bus_writes: self.slave.writes(),
        }
    }

    /// The instruction cache, for inspection.
    pub fn icache(&self) -> &ICache {
        &self.icache
    }

    /// The data cache, for inspection.
    pub fn dcache(&self) -> &DCache {
        &self.dcache
    }

    /// The memory slave, for inspection.
    pub fn slave(&self) -> &MemorySlave {
        &self.slave
    }

    /// Mutable memory slave, for preloading RAM.
    pub fn slave_mut(&mut self) -> &mut MemorySlave {
        &mut self.slave
    }

    /// Power-cycle the subsystem: caches cold, RAM zeroed, counters clear.
    pub fn reset(&mut self) {
        self.icache.reset();
        self.dcache.reset();
        self.arbiter.reset();
        self.slave.reset();
        self.cycles = 0;
        log::info!("System reset");
    }
}

impl Default for MemorySystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::MMIO_BASE;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn system_with_words(words: &[(u32, u32)]) -> MemorySystem {
        let mut system = MemorySystem::new();
        for &(addr, value) in words {
            system.slave_mut().ram_mut().write_word(addr, value, 0b1111);
        }
        system
    }

    #[test]
    fn test_icache_cold_miss_then_hit() {
        let mut system = system_with_words(&[
            (0x100, 0xAA),
            (0x104, 0xBB),
            (0x108, 0xCC),
            (0x10C, 0xDD),
        ]);

        // Cold miss: stalls, takes the refill, returns the word.
        let first = system.step(Some(FetchRequest { addr: 0x100 }), None);
        assert!(first.fetch.stall);
        assert_eq!(system.fetch(0x100).unwrap(), 0xAA);

        // Exactly 4 read beats for the line.
        assert_eq!(system.stats().bus_reads, 4);

        // Next word of the same line: zero-cycle hit.
        let out = system.step(Some(FetchRequest { addr: 0x104 }), None);
        assert!(!out.fetch.stall);
        assert_eq!(out.fetch.data, 0xBB);
        assert_eq!(system.stats().bus_reads, 4);
    }

    #[test]
    fn test_write_through_word_store() {
        let mut system = MemorySystem::new();
        system.store(0x200, 0xDEAD_BEEF, MemWidth::Word).unwrap();

        // The slave committed it.
        assert_eq!(system.slave().ram().read_word(0x200), 0xDEAD_BEEF);
        assert_eq!(system.stats().bus_writes, 1);

        // The store did not allocate: the following load refills.
        let before = system.stats().bus_reads;
        assert_eq!(system.load(0x200).unwrap(), 0xDEAD_BEEF);
        assert_eq!(system.stats().bus_reads, before + 4);
    }

    #[test]
    fn test_read_your_writes_all_widths() {
        let mut system = MemorySystem::new();

        // Word store, word load.
        system.store(0x400, 0x1122_3344, MemWidth::Word).unwrap();
        assert_eq!(system.load(0x400).unwrap(), 0x1122_3344);

        // Byte store into the now-cached line updates the array copy.
        system.store(0x403, 0xFF00_0000, MemWidth::Byte).unwrap();
        assert_eq!(system.load(0x400).unwrap(), 0xFF22_3344);

        // Half store at offset 2.
        system.store(0x402, 0xABCD_0000, MemWidth::Half).unwrap();
        assert_eq!(system.load(0x400).unwrap(), 0xABCD_3344);

        // And memory agrees: write-through kept it current.
        assert_eq!(system.slave().ram().read_word(0x400), 0xABCD_3344);
    }

    #[test]
    fn test_store_to_uncached_line_then_load() {
        let mut system = MemorySystem::new();
        // sb to a line that was never fetched: goes to memory only.
        system.store(0x503, 0x4400_0000, MemWidth::Byte).unwrap();
        assert!(!system.dcache().line_valid(0x500));
        // The later load refills and sees the byte.
        assert_eq!(system.load(0x500).unwrap(), 0x4400_0000);
    }

    #[test]
    fn test_misaligned_stores_rejected() {
        let mut system = MemorySystem::new();
        assert!(matches!(
            system.store(0x401, 0, MemWidth::Half),
            Err(SimError::UnalignedAccess {
                address: 0x401,
                size: 2
            })
        ));
        assert!(matches!(
            system.store(0x402, 0, MemWidth::Word),
            Err(SimError::UnalignedAccess {
                address: 0x402,
                size: 4
            })
        ));
        assert!(matches!(
            system.fetch(0x102),
            Err(SimError::UnalignedAccess {
                address: 0x102,
                size: 4
            })
        ));
    }

    /// MMIO register that pops a fresh value on every read.
    struct Popper {
        values: Rc<RefCell<Vec<u32>>>,
    }

    impl MmioDevice for Popper {
        fn address_range(&self) -> (u32, u32) {
            (MMIO_BASE, MMIO_BASE + 0xF)
        }
        fn read_word(&mut self, _offset: u32) -> u32 {
            self.values.borrow_mut().pop().unwrap_or(0)
        }
        fn write_word(&mut self, _offset: u32, _value: u32, _strobe: u8) {}
    }

    #[test]
    fn test_mmio_read_bypasses_cache() {
        let values = Rc::new(RefCell::new(vec![0x0000_0000, 0xCAFE_BABE]));
        let mut system = MemorySystem::new();
        system.add_device(Box::new(Popper {
            values: values.clone(),
        }));

        assert_eq!(system.load(MMIO_BASE + 4).unwrap(), 0xCAFE_BABE);
        // One AR, exact address semantics: one value consumed, no refill.
        assert_eq!(system.stats().bus_reads, 1);
        assert_eq!(system.dcache().valid_lines(), 0);

        // A second identical request reaches the device again.
        assert_eq!(system.load(MMIO_BASE + 4).unwrap(), 0x0000_0000);
        assert_eq!(system.stats().bus_reads, 2);
        assert!(values.borrow().is_empty());
    }

    #[test]
    fn test_mmio_leaves_dcache_arrays_untouched() {
        let mut system = system_with_words(&[(0x600, 0x77)]);
        system.add_device(Box::new(Popper {
            values: Rc::new(RefCell::new(vec![1, 2, 3])),
        }));

        // Warm one line, snapshot the cache state.
        assert_eq!(system.load(0x600).unwrap(), 0x77);
        assert_eq!(system.dcache().valid_lines(), 1);

        system.load(MMIO_BASE).unwrap();
        system.store(MMIO_BASE + 8, 0xAB, MemWidth::Word).unwrap();

        assert_eq!(system.dcache().valid_lines(), 1);
        assert!(system.dcache().line_valid(0x600));
        // The warmed line still hits with no extra bus traffic.
        let reads = system.stats().bus_reads;
        assert_eq!(system.load(0x600).unwrap(), 0x77);
        assert_eq!(system.stats().bus_reads, reads);
    }

    /// Records the order of read addresses arriving at the slave.
    struct Recorder {
        base: u32,
        log: Rc<RefCell<Vec<u32>>>,
    }

    impl MmioDevice for Recorder {
        fn address_range(&self) -> (u32, u32) {
            (self.base, self.base + 0xF)
        }
        fn read_word(&mut self, offset: u32) -> u32 {
            self.log.borrow_mut().push(self.base + offset);
            0
        }
        fn write_word(&mut self, _offset: u32, _value: u32, _strobe: u8) {}
    }

    #[test]
    fn test_refill_reads_line_in_ascending_order() {
        // A recorder parked under a cacheable line observes the refill
        // sequence the D-Cache emits.
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut system = MemorySystem::new();
        system.add_device(Box::new(Recorder {
            base: 0x1000,
            log: log.clone(),
        }));

        system.load(0x1008).unwrap();
        assert_eq!(*log.borrow(), vec![0x1000, 0x1004, 0x1008, 0x100C]);
    }

    #[test]
    fn test_arbiter_gives_dcache_priority() {
        let mut system = system_with_words(&[(0x100, 0xAA), (0x700, 0xBB)]);

        // Present a fetch miss and a data miss in the same cycle and keep
        // both presented until each completes.
        let fetch = Some(FetchRequest { addr: 0x100 });
        let data = Some(DataRequest::Read { addr: 0x700 });
        let mut fetch_done_at = None;
        let mut data_done_at = None;
        for cycle in 0..100u32 {
            let out = system.step(fetch, data);
            if data_done_at.is_none() && !out.data.stall {
                data_done_at = Some(cycle);
                assert_eq!(out.data.data, 0xBB);
            }
            if fetch_done_at.is_none() && !out.fetch.stall {
                fetch_done_at = Some(cycle);
                assert_eq!(out.fetch.data, 0xAA);
            }
            if fetch_done_at.is_some() && data_done_at.is_some() {
                break;
            }
        }

        // The backend wins the bus; the frontend finishes strictly later.
        let fetch_done_at = fetch_done_at.expect("fetch completed");
        let data_done_at = data_done_at.expect("load completed");
        assert!(data_done_at < fetch_done_at);
        // Both lines refilled: 8 beats total.
        assert_eq!(system.stats().bus_reads, 8);
    }

    #[test]
    fn test_store_costs_exactly_one_write_transaction() {
        let mut system = MemorySystem::new();
        system.store(0x200, 1, MemWidth::Word).unwrap();
        system.store(0x204, 2, MemWidth::Word).unwrap();
        assert_eq!(system.stats().bus_writes, 2);
        assert_eq!(system.stats().bus_reads, 0);
    }

    #[test]
    fn test_hit_rate_accounting() {
        let mut system = system_with_words(&[(0x100, 1)]);
        system.load(0x100).unwrap(); // miss
        system.load(0x104).unwrap(); // hit
        system.load(0x108).unwrap(); // hit
        let stats = system.stats();
        assert_eq!(stats.data.misses, 1);
        assert_eq!(stats.data.hits, 2);
    }

    #[test]
    fn test_watchdog_bounds_the_wait() {
        let config = SimConfig {
            watchdog_cycles: 0,
            ..Default::default()
        };
        let mut system = MemorySystem::with_config(&config).unwrap();
        assert!(matches!(
            system.load(0x100),
            Err(SimError::Watchdog { cycles: 0 })
        ));
    }

    #[test]
    fn test_reset_returns_to_cold_state() {
        let mut system = system_with_words(&[(0x100, 0x11)]);
        system.load(0x100).unwrap();
        system.reset();
        assert_eq!(system.stats().cycles, 0);
        assert_eq!(system.dcache().valid_lines(), 0);
        // RAM was cleared too.
        assert_eq!(system.load(0x100).unwrap(), 0);
    }

    #[test]
    fn test_fetch_and_load_of_same_line_are_independent() {
        // No coherence machinery: each cache refills its own copy from the
        // same memory.
        let mut system = system_with_words(&[(0x800, 0x1234)]);
        assert_eq!(system.fetch(0x800).unwrap(), 0x1234);
        assert_eq!(system.load(0x800).unwrap(), 0x1234);
        assert_eq!(system.stats().bus_reads, 8);
    }
}
