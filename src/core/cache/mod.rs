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

//! Cache geometry and storage
//!
//! Both caches share the same direct-mapped organization:
//!
//! - **Line size**: 16 bytes (4 words). One refill is exactly 4 bus reads.
//! - **Sets**: 256, so the whole array covers 4 KiB.
//! - **Address split** (32 bits):
//!
//! ```text
//! [31:12] Tag (20 bits)   - which of the aliasing addresses is cached
//! [11:4]  Index (8 bits)  - selects the set (0-255)
//! [3:2]   Word (2 bits)   - word within the line
//! [1:0]   Byte (2 bits)   - byte within the word
//! ```
//!
//! A set hits iff its valid bit is set and its stored tag equals the
//! request tag. After reset every valid bit is clear and tags and data are
//! don't-care. Lines never leave the valid state; overwriting a set's tag
//! atomically supersedes the previous line.
//!
//! Line data is stored as bytes, which makes the D-Cache's strobe-masked
//! partial stores a straight per-byte copy.
//!
//! Addresses at and above [`MMIO_BASE`] are uncacheable: requests there
//! bypass the arrays entirely.

pub mod dcache;
pub mod icache;

pub use dcache::DCache;
pub use icache::ICache;

/// Bytes per cache line.
pub const LINE_BYTES: usize = 16;

/// Words per cache line.
pub const WORDS_PER_LINE: usize = 4;

/// Number of sets in each cache.
pub const NUM_SETS: usize = 256;

/// First uncacheable address. Everything at and above this is MMIO space
/// and must bypass the cache arrays.
pub const MMIO_BASE: u32 = 0x2000_0000;

/// Bit position where the set index starts.
const INDEX_SHIFT: u32 = 4;

/// Mask for the 8-bit set index.
const INDEX_MASK: u32 = (NUM_SETS as u32) - 1;

/// Bit position where the tag starts.
const TAG_SHIFT: u32 = 12;

/// Whether an address lies in the uncacheable MMIO region.
#[inline]
pub fn is_mmio(addr: u32) -> bool {
    addr >= MMIO_BASE
}

/// A 32-bit address decomposed into the cache's view of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAddress {
    /// Upper 20 address bits.
    pub tag: u32,
    /// Set index (0-255).
    pub index: usize,
    /// Word within the line (0-3).
    pub word: usize,
    /// Byte within the word (0-3).
    pub byte: usize,
}

impl LineAddress {
    /// Decompose an address.
    #[inline]
    pub fn split(addr: u32) -> Self {
        Self {
            tag: addr >> TAG_SHIFT,
            index: ((addr >> INDEX_SHIFT) & INDEX_MASK) as usize,
            word: ((addr >> 2) & 0x3) as usize,
            byte: (addr & 0x3) as usize,
        }
    }

    /// The 16-byte-aligned base of the line containing `addr`.
    #[inline]
    pub fn line_base(addr: u32) -> u32 {
        addr & !((LINE_BYTES as u32) - 1)
    }
}

/// Tag, valid and data arrays of one direct-mapped cache.
///
/// Three parallel tables indexed by set number. The owning controller is
/// the only writer.
pub struct LineStore {
    tags: Vec<u32>,
    valid: Vec<bool>,
    data: Vec<[u8; LINE_BYTES]>,
}

impl LineStore {
    /// Create a store with every set invalid.
    pub fn new() -> Self {
        Self {
            tags: vec![0; NUM_SETS],
            valid: vec![false; NUM_SETS],
            data: vec![[0u8; LINE_BYTES]; NUM_SETS],
        }
    }

    /// Whether `addr` hits: the indexed set is valid and its tag matches.
    #[inline]
    pub fn is_hit(&self, at: &LineAddress) -> bool {
        self.valid[at.index] && self.tags[at.index] == at.tag
    }

    /// Read word `word` of set `index`.
    pub fn word(&self, index: usize, word: usize) -> u32 {
        let base = word * 4;
        u32::from_le_bytes(self.data[index][base..base + 4].try_into().unwrap())
    }

    /// Overwrite word `word` of set `index`. Used by the refill path.
    pub fn set_word(&mut self, index: usize, word: usize, value: u32) {
        let base = word * 4;
        self.data[index][base..base + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Update the bytes of word `word` in set `index` selected by `strobe`.
    /// Used by the D-Cache write-hit path.
    pub fn write_word(&mut self, index: usize, word: usize, value: u32, strobe: u8) {
        let base = word * 4;
        let bytes = value.to_le_bytes();
        for (i, byte) in bytes.iter().enumerate() {
            if strobe & (1 << i) != 0 {
                self.data[index][base + i] = *byte;
            }
        }
    }

    /// Commit a refilled line: store the tag and mark the set valid.
    ///
    /// Called only after all four data words are in place, so a line is
    /// never observable as a hit while partially filled.
    pub fn commit_tag(&mut self, index: usize, tag: u32) {
        self.tags[index] = tag;
        self.valid[index] = true;
    }

    /// Whether set `index` currently holds a valid line.
    pub fn is_valid(&self, index: usize) -> bool {
        self.valid[index]
    }

    /// Number of valid sets.
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }

    /// Invalidate every set, as reset does.
    pub fn reset(&mut self) {
        self.valid.fill(false);
    }
}

impl Default for LineStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Hit/miss counters for one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests that completed from the array.
    pub hits: u64,
    /// Requests that needed the bus.
    pub misses: u64,
}

impl CacheStats {
    /// Record the outcome of one access.
    pub fn record(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    /// Fraction of accesses that hit, or 0.0 before any access.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_split() {
        let at = LineAddress::split(0x1234_5678);
        assert_eq!(at.tag, 0x12345);
        assert_eq!(at.index, 0x67);
        assert_eq!(at.word, 2);
        assert_eq!(at.byte, 0);

        let at = LineAddress::split(0x0000_0103);
        assert_eq!(at.tag, 0);
        assert_eq!(at.index, 0x10);
        assert_eq!(at.word, 0);
        assert_eq!(at.byte, 3);
    }

    #[test]
    fn test_aliasing_addresses_share_an_index() {
        // Same lower 12 bits, different tags.
        let a = LineAddress::split(0x0000_0100);
        let b = LineAddress::split(0x0001_0100);
        assert_eq!(a.index, b.index);
        assert_ne!(a.tag, b.tag);
    }

    #[test]
    fn test_line_base() {
        assert_eq!(LineAddress::line_base(0x100), 0x100);
        assert_eq!(LineAddress::line_base(0x10C), 0x100);
        assert_eq!(LineAddress::line_base(0x1FF), 0x1F0);
    }

    #[test]
    fn test_mmio_boundary() {
        assert!(!is_mmio(0x0000_0000));
        assert!(!is_mmio(0x1FFF_FFFF));
        assert!(is_mmio(0x2000_0000));
        assert!(is_mmio(0xFFFF_FFFF));
    }

    #[test]
    fn test_new_store_is_all_invalid() {
        let store = LineStore::new();
        assert_eq!(store.valid_count(), 0);
        assert!(!store.is_hit(&LineAddress::split(0x100)));
    }

    #[test]
    fn test_hit_needs_valid_and_matching_tag() {
        let mut store = LineStore::new();
        let at = LineAddress::split(0x0000_0100);
        store.commit_tag(at.index, at.tag);
        assert!(store.is_hit(&at));

        // Same index, different tag: miss.
        let alias = LineAddress::split(0x0001_0100);
        assert!(!store.is_hit(&alias));
    }

    #[test]
    fn test_commit_tag_supersedes_previous_line() {
        let mut store = LineStore::new();
        let old = LineAddress::split(0x0000_0100);
        let new = LineAddress::split(0x0001_0100);
        store.commit_tag(old.index, old.tag);
        store.commit_tag(new.index, new.tag);
        assert!(!store.is_hit(&old));
        assert!(store.is_hit(&new));
        assert_eq!(store.valid_count(), 1);
    }

    #[test]
    fn test_word_round_trip() {
        let mut store = LineStore::new();
        store.set_word(5, 0, 0x1111_1111);
        store.set_word(5, 3, 0x4444_4444);
        assert_eq!(store.word(5, 0), 0x1111_1111);
        assert_eq!(store.word(5, 3), 0x4444_4444);
    }

    #[test]
    fn test_strobed_write_updates_selected_bytes() {
        let mut store = LineStore::new();
        store.set_word(9, 1, 0xAAAA_AAAA);
        store.write_word(9, 1, 0x0000_00FF, 0b0001);
        assert_eq!(store.word(9, 1), 0xAAAA_AAFF);
        store.write_word(9, 1, 0xBEEF_0000, 0b1100);
        assert_eq!(store.word(9, 1), 0xBEEF_AAFF);
    }

    #[test]
    fn test_reset_invalidates_everything() {
        let mut store = LineStore::new();
        for addr in [0x100u32, 0x200, 0x300] {
            let at = LineAddress::split(addr);
            store.commit_tag(at.index, at.tag);
        }
        assert_eq!(store.valid_count(), 3);
        store.reset();
        assert_eq!(store.valid_count(), 0);
    }

    #[test]
    fn test_stats_hit_rate() {
        let mut stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        stats.record(true);
        stats.record(true);
        stats.record(false);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }
}
