use std::sync::Arc;

use axp_mem::MemoryBus;
use axp_types::{PhysAddr, CACHE_LINE_SIZE};

/// What a cache talks to on a miss: either the next cache level, or the
/// physical-memory bus at the bottom of the hierarchy.
pub trait CacheBackend: Send + Sync {
    fn read_line(&self, line_paddr: PhysAddr) -> [u8; CACHE_LINE_SIZE];
    fn write_line(&self, line_paddr: PhysAddr, data: &[u8; CACHE_LINE_SIZE]);
}

impl CacheBackend for MemoryBus {
    fn read_line(&self, line_paddr: PhysAddr) -> [u8; CACHE_LINE_SIZE] {
        let mut buf = [0u8; CACHE_LINE_SIZE];
        self.ram().read_bytes(line_paddr, &mut buf);
        buf
    }

    fn write_line(&self, line_paddr: PhysAddr, data: &[u8; CACHE_LINE_SIZE]) {
        self.ram().write_bytes(line_paddr, data);
    }
}

impl<B: CacheBackend> CacheBackend for Arc<B> {
    fn read_line(&self, line_paddr: PhysAddr) -> [u8; CACHE_LINE_SIZE] {
        (**self).read_line(line_paddr)
    }

    fn write_line(&self, line_paddr: PhysAddr, data: &[u8; CACHE_LINE_SIZE]) {
        (**self).write_line(line_paddr, data)
    }
}
