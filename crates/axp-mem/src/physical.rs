use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use axp_types::{PhysAddr, PAGE_SHIFT};

use crate::MemError;

/// Tuning knobs for [`PhysicalMemory`].
#[derive(Debug, Clone, Copy)]
pub struct PhysicalMemoryOptions {
    /// Granularity of lazy allocation. Must be a power of two.
    pub chunk_size: usize,
}

impl Default for PhysicalMemoryOptions {
    fn default() -> Self {
        Self { chunk_size: 4096 }
    }
}

/// Backing RAM for a `System`: a flat byte array addressed by physical
/// address, allocated lazily in chunks so a large, mostly-untouched guest
/// address space doesn't cost a matching amount of host memory up front
///.
///
/// Reads and writes take `&self`: multiple CPUs and cache levels share one
/// `PhysicalMemory` (typically behind an `Arc`), so interior mutability is
/// required. The lock only ever guards the sparse chunk table, not the
/// read/write hot path's data copy.
pub struct PhysicalMemory {
    size: u64,
    chunk_size: usize,
    chunk_shift: u32,
    chunks: Mutex<Vec<Option<Box<[u8]>>>>,
    /// Per-physical-page write counters, bumped on every write that touches
    /// the page. The JIT runtime compares these against the values recorded
    /// at compile time to detect self-modifying code without rescanning.
    page_versions: Vec<AtomicU64>,
}

impl PhysicalMemory {
    pub fn new(size: u64) -> Result<Self, MemError> {
        Self::with_options(size, PhysicalMemoryOptions::default())
    }

    pub fn with_options(size: u64, options: PhysicalMemoryOptions) -> Result<Self, MemError> {
        if !options.chunk_size.is_power_of_two() {
            return Err(MemError::InvalidChunkSize(options.chunk_size));
        }
        let chunk_shift = options.chunk_size.trailing_zeros();
        let chunk_count = (size as usize).div_ceil(options.chunk_size).max(1);
        let page_count = (size >> PAGE_SHIFT).saturating_add(1) as usize;
        Ok(Self {
            size,
            chunk_size: options.chunk_size,
            chunk_shift,
            chunks: Mutex::new(vec![None; chunk_count]),
            page_versions: (0..page_count).map(|_| AtomicU64::new(0)).collect(),
        })
    }

    /// Current write-version of the physical page containing `addr`. Starts
    /// at 0 and increments once per write that touches the page, regardless
    /// of how many bytes of the write land in it.
    pub fn page_version(&self, addr: PhysAddr) -> u64 {
        let page = (addr >> PAGE_SHIFT) as usize;
        self.page_versions.get(page).map_or(0, |v| v.load(Ordering::Acquire))
    }

    fn bump_page_versions(&self, addr: PhysAddr, len: usize) {
        if len == 0 {
            return;
        }
        let first_page = (addr >> PAGE_SHIFT) as usize;
        let last_page = ((addr + (len as u64 - 1)) >> PAGE_SHIFT) as usize;
        for page in first_page..=last_page {
            if let Some(v) = self.page_versions.get(page) {
                v.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of chunks that have actually been allocated (touched by at
    /// least one write). Exposed for tests and for memory-pressure metrics.
    pub fn allocated_chunks(&self) -> usize {
        self.chunks.lock().unwrap().iter().filter(|c| c.is_some()).count()
    }

    fn in_range(&self, addr: PhysAddr, len: usize) -> bool {
        let end = addr.saturating_add(len as u64);
        len == 0 || (addr < self.size && end <= self.size)
    }

    /// Fallible bulk read: errors if the span falls outside backing RAM.
    pub fn try_read_bytes(&self, addr: PhysAddr, out: &mut [u8]) -> Result<(), MemError> {
        if !self.in_range(addr, out.len()) {
            return Err(MemError::OutOfRange { addr, len: out.len() as u64, size: self.size });
        }
        let chunks = self.chunks.lock().unwrap();
        self.copy_from_chunks(&chunks, addr, out);
        Ok(())
    }

    /// Fallible bulk write: errors if the span falls outside backing RAM.
    pub fn try_write_bytes(&self, addr: PhysAddr, data: &[u8]) -> Result<(), MemError> {
        if !self.in_range(addr, data.len()) {
            return Err(MemError::OutOfRange { addr, len: data.len() as u64, size: self.size });
        }
        let mut chunks = self.chunks.lock().unwrap();
        self.copy_into_chunks(&mut chunks, addr, data);
        drop(chunks);
        self.bump_page_versions(addr, data.len());
        Ok(())
    }

    /// Open-bus read: out-of-range bytes read as all-ones.
    pub fn read_bytes(&self, addr: PhysAddr, out: &mut [u8]) {
        if self.try_read_bytes(addr, out).is_err() {
            out.fill(0xFF);
        }
    }

    /// Open-bus write: out-of-range writes are silently dropped.
    pub fn write_bytes(&self, addr: PhysAddr, data: &[u8]) {
        let _ = self.try_write_bytes(addr, data);
    }

    pub fn read_u8(&self, addr: PhysAddr) -> u8 {
        let mut b = [0u8; 1];
        self.read_bytes(addr, &mut b);
        b[0]
    }

    pub fn read_u16(&self, addr: PhysAddr) -> u16 {
        let mut b = [0u8; 2];
        self.read_bytes(addr, &mut b);
        u16::from_le_bytes(b)
    }

    pub fn read_u32(&self, addr: PhysAddr) -> u32 {
        let mut b = [0u8; 4];
        self.read_bytes(addr, &mut b);
        u32::from_le_bytes(b)
    }

    pub fn read_u64(&self, addr: PhysAddr) -> u64 {
        let mut b = [0u8; 8];
        self.read_bytes(addr, &mut b);
        u64::from_le_bytes(b)
    }

    pub fn write_u8(&self, addr: PhysAddr, v: u8) {
        self.write_bytes(addr, &[v]);
    }

    pub fn write_u16(&self, addr: PhysAddr, v: u16) {
        self.write_bytes(addr, &v.to_le_bytes());
    }

    pub fn write_u32(&self, addr: PhysAddr, v: u32) {
        self.write_bytes(addr, &v.to_le_bytes());
    }

    pub fn write_u64(&self, addr: PhysAddr, v: u64) {
        self.write_bytes(addr, &v.to_le_bytes());
    }

    fn copy_from_chunks(&self, chunks: &[Option<Box<[u8]>>], addr: PhysAddr, out: &mut [u8]) {
        let mut done = 0usize;
        while done < out.len() {
            let cur = addr + done as u64;
            let chunk_idx = (cur >> self.chunk_shift) as usize;
            let chunk_off = (cur as usize) & (self.chunk_size - 1);
            let take = (self.chunk_size - chunk_off).min(out.len() - done);
            match chunks.get(chunk_idx).and_then(|c| c.as_ref()) {
                Some(chunk) => out[done..done + take].copy_from_slice(&chunk[chunk_off..chunk_off + take]),
                None => out[done..done + take].fill(0),
            }
            done += take;
        }
    }

    fn copy_into_chunks(&self, chunks: &mut [Option<Box<[u8]>>], addr: PhysAddr, data: &[u8]) {
        let mut done = 0usize;
        while done < data.len() {
            let cur = addr + done as u64;
            let chunk_idx = (cur >> self.chunk_shift) as usize;
            let chunk_off = (cur as usize) & (self.chunk_size - 1);
            let take = (self.chunk_size - chunk_off).min(data.len() - done);
            let chunk = chunks[chunk_idx].get_or_insert_with(|| vec![0u8; self.chunk_size].into_boxed_slice());
            chunk[chunk_off..chunk_off + take].copy_from_slice(&data[done..done + take]);
            done += take;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_bytes_read_as_zero_within_range() {
        let mem = PhysicalMemory::new(0x1000).unwrap();
        let mut buf = [0xAAu8; 8];
        mem.read_bytes(0x10, &mut buf);
        assert_eq!(buf, [0u8; 8]);
    }

    #[test]
    fn out_of_range_read_is_open_bus() {
        let mem = PhysicalMemory::new(0x1000).unwrap();
        let mut buf = [0u8; 4];
        mem.read_bytes(0x2000, &mut buf);
        assert_eq!(buf, [0xFF; 4]);
    }

    #[test]
    fn out_of_range_write_is_dropped_not_panicking() {
        let mem = PhysicalMemory::new(0x1000).unwrap();
        mem.write_bytes(0x5000, &[1, 2, 3]);
        assert_eq!(mem.allocated_chunks(), 0);
    }

    #[test]
    fn write_bumps_page_version_of_every_touched_page() {
        let mem = PhysicalMemory::new(0x10000).unwrap();
        assert_eq!(mem.page_version(0x2000), 0);
        mem.write_bytes(0x2000, &[1]);
        assert_eq!(mem.page_version(0x2000), 1);
        mem.write_bytes(0x1FFC, &[1, 2, 3, 4, 5, 6]); // crosses into page 2
        assert_eq!(mem.page_version(0x2000), 2);
        assert_eq!(mem.page_version(0x1000), 1);
        assert_eq!(mem.page_version(0x4000), 0);
    }

    #[test]
    fn write_spanning_chunk_boundary_lands_in_both_chunks() {
        let mem =
            PhysicalMemory::with_options(0x4000, PhysicalMemoryOptions { chunk_size: 0x1000 })
                .unwrap();
        mem.write_bytes(0xFFE, &[1, 2, 3, 4]);
        assert_eq!(mem.allocated_chunks(), 2);
        assert_eq!(mem.read_u8(0xFFE), 1);
        assert_eq!(mem.read_u8(0x1000), 3);
        assert_eq!(mem.read_u8(0x1001), 4);
    }
}
