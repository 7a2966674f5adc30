use std::sync::atomic::{AtomicU64, Ordering};

use axp_types::{PhysAddr, CACHE_LINE_SHIFT, CACHE_LINE_SIZE};

use crate::backend::CacheBackend;
use crate::line::CoherencyState;
use crate::set::CacheSet;

/// Bus operation driving a `snoop` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnoopOp {
    Read,
    WriteRfo,
    Invalidate,
    Flush,
}

fn line_base(paddr: PhysAddr) -> PhysAddr {
    paddr & !(CACHE_LINE_SIZE as u64 - 1)
}

/// N-way set-associative write-back cache. Generic
/// over its next-level backend so `L1D -> L2 -> L3 -> PhysicalMemory` chains
/// are just nested `DataCache<DataCache<DataCache<MemoryBus>>>` values, each
/// wrapped in an `Arc` to be shared as the next level's backend.
pub struct DataCache<B: CacheBackend> {
    sets: Vec<CacheSet>,
    num_sets: usize,
    set_shift: u32,
    ways: usize,
    next: B,
    clock: AtomicU64,
}

impl<B: CacheBackend> DataCache<B> {
    pub fn new(num_sets: usize, ways: usize, next: B) -> Self {
        assert!(num_sets.is_power_of_two(), "num_sets must be a power of two");
        assert!(ways > 0, "a cache needs at least one way");
        Self {
            sets: (0..num_sets).map(|_| CacheSet::new(ways)).collect(),
            num_sets,
            set_shift: num_sets.trailing_zeros(),
            ways,
            next,
            clock: AtomicU64::new(0),
        }
    }

    pub fn ways(&self) -> usize {
        self.ways
    }

    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    fn stamp(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn addr_parts(&self, paddr: PhysAddr) -> (u64, usize, usize) {
        let line_index = paddr >> CACHE_LINE_SHIFT;
        let set_index = (line_index & (self.num_sets as u64 - 1)) as usize;
        let tag = line_index >> self.set_shift;
        let offset = (paddr & (CACHE_LINE_SIZE as u64 - 1)) as usize;
        (tag, set_index, offset)
    }

    /// Fetches the full owning line for `paddr`, filling from the next level
    /// on miss, and returns a copy of its bytes. Shared by `read` and by this
    /// cache's own `CacheBackend::read_line` (used when a higher level misses
    /// into this one).
    fn read_line_through(&self, paddr: PhysAddr) -> [u8; CACHE_LINE_SIZE] {
        let (tag, set_index, _) = self.addr_parts(paddr);
        let base = line_base(paddr);
        let set = &self.sets[set_index];

        if let Some(way) = set.probe_hit(tag) {
            let stamp = self.stamp();
            return set.with_lines(|lines| {
                lines[way].touch(stamp);
                *lines[way].data()
            });
        }

        let fetched = self.next.read_line(base);
        let stamp = self.stamp();
        set.with_lines(|lines| {
            let way = CacheSet::select_lru(lines);
            if lines[way].is_valid() && lines[way].is_dirty() {
                let victim_base = (lines[way].tag() << self.set_shift | set_index as u64) << CACHE_LINE_SHIFT;
                self.next.write_line(victim_base, lines[way].data());
            }
            lines[way].fill(tag, fetched, CoherencyState::Shared, stamp);
            fetched
        })
    }

    /// Reads a sub-line span that must not cross a line boundary (the
    /// caller splits unaligned/oversized spans).
    pub fn read(&self, paddr: PhysAddr, out: &mut [u8]) {
        let (_, _, offset) = self.addr_parts(paddr);
        assert!(offset + out.len() <= CACHE_LINE_SIZE, "read crosses a cache line boundary");
        let line = self.read_line_through(paddr);
        out.copy_from_slice(&line[offset..offset + out.len()]);
    }

    /// Write: hit updates bytes and transitions coherency
    /// state toward Modified; miss allocates via read-for-ownership first.
    pub fn write(&self, paddr: PhysAddr, data: &[u8]) {
        let (tag, set_index, offset) = self.addr_parts(paddr);
        assert!(offset + data.len() <= CACHE_LINE_SIZE, "write crosses a cache line boundary");
        let base = line_base(paddr);
        let set = &self.sets[set_index];

        if set.probe_hit(tag).is_none() {
            // Read-for-ownership: pull the line in (possibly evicting/writing
            // back a dirty victim) before applying the write.
            self.read_line_through(paddr);
        }

        let stamp = self.stamp();
        set.with_lines(|lines| {
            let way = lines.iter().position(|l| l.is_valid() && l.tag() == tag).expect("just filled");
            lines[way].write_bytes(offset, data, stamp);
            lines[way].set_state(match lines[way].state() {
                CoherencyState::Modified => CoherencyState::Modified,
                _ => CoherencyState::Modified,
            });
        });
    }

    /// Invalidate.
    pub fn invalidate(&self, paddr: PhysAddr) {
        let (tag, set_index, _) = self.addr_parts(paddr);
        self.sets[set_index].with_lines(|lines| {
            if let Some(way) = lines.iter().position(|l| l.is_valid() && l.tag() == tag) {
                lines[way].invalidate();
            }
        });
    }

    /// Flush: write back if dirty, then invalidate.
    pub fn flush(&self, paddr: PhysAddr) {
        let (tag, set_index, _) = self.addr_parts(paddr);
        let base = line_base(paddr);
        let to_write_back = self.sets[set_index].with_lines(|lines| {
            lines.iter().position(|l| l.is_valid() && l.tag() == tag).and_then(|way| {
                if lines[way].is_dirty() {
                    let data = *lines[way].data();
                    lines[way].invalidate();
                    Some(data)
                } else {
                    lines[way].invalidate();
                    None
                }
            })
        });
        if let Some(data) = to_write_back {
            self.next.write_line(base, &data);
        }
    }

    /// Snoop: bus events raised by other CPUs' caches.
    pub fn snoop(&self, paddr: PhysAddr, op: SnoopOp) {
        let (tag, set_index, _) = self.addr_parts(paddr);
        let base = line_base(paddr);
        let writeback = self.sets[set_index].with_lines(|lines| {
            let Some(way) = lines.iter().position(|l| l.is_valid() && l.tag() == tag) else {
                return None;
            };
            match op {
                SnoopOp::Read => {
                    if lines[way].state() == CoherencyState::Modified {
                        let data = *lines[way].data();
                        lines[way].set_state(CoherencyState::Shared);
                        lines[way].mark_clean();
                        return Some(data);
                    }
                    if lines[way].state() == CoherencyState::Exclusive {
                        lines[way].set_state(CoherencyState::Shared);
                    }
                    None
                }
                SnoopOp::WriteRfo | SnoopOp::Invalidate => {
                    let data = lines[way].is_dirty().then(|| *lines[way].data());
                    lines[way].invalidate();
                    data
                }
                SnoopOp::Flush => {
                    let data = lines[way].is_dirty().then(|| *lines[way].data());
                    lines[way].invalidate();
                    data
                }
            }
        });
        if let Some(data) = writeback {
            self.next.write_line(base, &data);
        }
    }

    /// WriteBackAllDirty: for cache-line-flush PAL operations.
    pub fn write_back_all_dirty(&self) {
        for (set_index, set) in self.sets.iter().enumerate() {
            let dirty = set.with_lines(|lines| {
                let mut out = Vec::new();
                for line in lines.iter_mut() {
                    if line.is_valid() && line.is_dirty() {
                        let base = (line.tag() << self.set_shift | set_index as u64) << CACHE_LINE_SHIFT;
                        out.push((base, *line.data()));
                        line.mark_clean();
                    }
                }
                out
            });
            for (base, data) in dirty {
                self.next.write_line(base, &data);
            }
        }
    }
}

impl<B: CacheBackend> CacheBackend for DataCache<B> {
    fn read_line(&self, line_paddr: PhysAddr) -> [u8; CACHE_LINE_SIZE] {
        self.read_line_through(line_paddr)
    }

    fn write_line(&self, line_paddr: PhysAddr, data: &[u8; CACHE_LINE_SIZE]) {
        self.write(line_paddr, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axp_mem::{MemoryBus, PhysicalMemory};
    use std::sync::Arc;

    fn bus(size: u64) -> MemoryBus {
        MemoryBus::new(Arc::new(PhysicalMemory::new(size).unwrap()))
    }

    #[test]
    fn read_miss_fills_from_backend() {
        let b = bus(0x10000);
        b.ram().write_u64(0x100, 0x1122_3344_5566_7788);
        let cache = DataCache::new(4, 2, b);

        let mut out = [0u8; 8];
        cache.read(0x100, &mut out);
        assert_eq!(u64::from_le_bytes(out), 0x1122_3344_5566_7788);
    }

    #[test]
    fn write_hit_marks_dirty_and_write_back_all_dirty_persists() {
        let b = bus(0x10000);
        let backend = b.clone();
        let cache = DataCache::new(4, 2, b);

        cache.write(0x200, &[0xAA; 8]);
        cache.write_back_all_dirty();

        // Bypass the cache entirely: the bus should now see the write.
        let mut raw = [0u8; 8];
        backend.ram().read_bytes(0x200, &mut raw);
        assert_eq!(raw, [0xAA; 8]);
    }

    #[test]
    fn invalidate_drops_line_without_writeback() {
        let b = bus(0x10000);
        let cache = DataCache::new(4, 2, b);
        cache.write(0x300, &[0xBB; 8]);
        cache.invalidate(0x300);

        // A fresh read must miss and refill from backend (still zero: never
        // written back).
        let mut out = [0u8; 8];
        cache.read(0x300, &mut out);
        assert_eq!(out, [0u8; 8]);
    }

    #[test]
    fn lru_tie_break_prefers_lowest_way_index() {
        let b = bus(0x10000);
        let cache = DataCache::new(1, 2, b);
        // Two distinct lines mapping to the same (only) set, same tag space.
        let mut out = [0u8; 8];
        cache.read(0x0, &mut out);
        cache.read(0x40, &mut out);
        // Both ways now occupied at identical timestamps only if untouched
        // again; a third distinct line must evict way 0 (lowest index, same
        // stamp ordering since `fill` advances the clock monotonically and
        // way 0 was filled first, so it carries the smaller stamp).
        cache.read(0x80, &mut out);
        let (tag0, set0, _) = cache.addr_parts(0x0);
        assert_eq!(set0, 0);
        let still_present = cache.sets[0].probe_hit(tag0).is_some();
        assert!(!still_present, "line 0 should have been evicted as LRU");
    }
}
