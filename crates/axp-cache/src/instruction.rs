use axp_types::PhysAddr;

use crate::backend::CacheBackend;
use crate::cache::DataCache;

/// Read-only instruction cache: fetches share the same set/line/LRU
/// machinery as the data cache, but there is no write path — a write
/// observed anywhere in the memory system invalidates the overlapping
/// line here instead (self-modifying code).
pub struct InstructionCache<B: CacheBackend> {
    inner: DataCache<B>,
}

impl<B: CacheBackend> InstructionCache<B> {
    pub fn new(num_sets: usize, ways: usize, next: B) -> Self {
        Self { inner: DataCache::new(num_sets, ways, next) }
    }

    pub fn fetch(&self, paddr: PhysAddr, out: &mut [u8]) {
        self.inner.read(paddr, out);
    }

    /// Invalidates the line overlapping `paddr` without writing it back —
    /// I-cache lines are never dirty, but a write elsewhere in the system
    /// may still overlap a line this cache has fetched.
    pub fn invalidate(&self, paddr: PhysAddr) {
        self.inner.invalidate(paddr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axp_mem::{MemoryBus, PhysicalMemory};
    use std::sync::Arc;

    #[test]
    fn fetch_after_invalidate_refetches_from_backend() {
        let ram = Arc::new(PhysicalMemory::new(0x10000).unwrap());
        let bus = MemoryBus::new(ram);
        bus.ram().write_u32(0x400, 0x47FF_041F); // NOP
        let icache = InstructionCache::new(4, 2, bus.clone());

        let mut out = [0u8; 4];
        icache.fetch(0x400, &mut out);
        assert_eq!(u32::from_le_bytes(out), 0x47FF_041F);

        bus.ram().write_u32(0x400, 0x0000_0000); // self-modifying write
        icache.invalidate(0x400);

        icache.fetch(0x400, &mut out);
        assert_eq!(u32::from_le_bytes(out), 0);
    }
}
