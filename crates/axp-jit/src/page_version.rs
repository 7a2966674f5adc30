/// Bits of guest physical address covered by one version-tracked page.
/// Matches `axp-mmu`/`axp-cache`'s page size.
pub const PAGE_SHIFT: u32 = 13;

/// One page's recorded version, as captured in a `CompiledBlockMeta`
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageVersionSnapshot {
    pub page: u64,
    pub version: u32,
}

/// Per-physical-page write counters the JIT runtime consults to detect
/// self-modifying code. Independent of
/// `axp-mem::PhysicalMemory`'s own page-version counters: this table only
/// has to agree with itself across a `snapshot`/`compare` pair, not with
/// any other subsystem.
///
/// `reset` bumps a generation counter rather than rewriting every slot, so
/// a snapshot taken before a reset is rejected even if its raw per-page
/// version happens to coincide with the post-reset value.
pub struct PageVersionTable {
    versions: Vec<u32>,
    generation: u64,
}

impl PageVersionTable {
    pub fn new(max_pages: usize) -> Self {
        Self { versions: vec![0u32; max_pages.max(1)], generation: 0 }
    }

    fn page_index(&self, paddr: u64) -> usize {
        ((paddr >> PAGE_SHIFT) as usize) % self.versions.len()
    }

    pub fn version(&self, page: u64) -> u32 {
        self.versions[(page as usize) % self.versions.len()]
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records a guest write touching `[paddr, paddr+len)`, bumping every
    /// page's counter in that span.
    pub fn record_write(&mut self, paddr: u64, len: usize) {
        if len == 0 {
            return;
        }
        let first = self.page_index(paddr);
        let last = self.page_index(paddr + (len as u64 - 1));
        if first <= last {
            for idx in first..=last {
                self.versions[idx] = self.versions[idx].wrapping_add(1);
            }
        } else {
            // Wrapped around the table's modular indexing; bump everything
            // touched on both sides of the wrap.
            for idx in first..self.versions.len() {
                self.versions[idx] = self.versions[idx].wrapping_add(1);
            }
            for idx in 0..=last {
                self.versions[idx] = self.versions[idx].wrapping_add(1);
            }
        }
    }

    /// Snapshots the per-page versions covering `[paddr, paddr+len)`, tagged
    /// with the table's current generation.
    pub fn snapshot(&self, paddr: u64, len: usize) -> (u64, Vec<PageVersionSnapshot>) {
        if len == 0 {
            return (self.generation, Vec::new());
        }
        let first_page = paddr >> PAGE_SHIFT;
        let last_page = (paddr + (len as u64 - 1)) >> PAGE_SHIFT;
        let mut out = Vec::with_capacity((last_page - first_page + 1) as usize);
        for page in first_page..=last_page {
            out.push(PageVersionSnapshot { page, version: self.version(page) });
        }
        (self.generation, out)
    }

    /// Whether a previously captured snapshot still matches current state.
    pub fn snapshot_is_current(&self, generation: u64, snapshot: &[PageVersionSnapshot]) -> bool {
        generation == self.generation
            && snapshot.iter().all(|s| self.version(s.page) == s.version)
    }

    /// Invalidates all outstanding snapshots without rewriting every slot.
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.versions.iter_mut().for_each(|v| *v = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_bumps_version_and_invalidates_snapshot() {
        let mut table = PageVersionTable::new(8);
        let (gen, snap) = table.snapshot(3u64 << PAGE_SHIFT, 1);
        assert!(table.snapshot_is_current(gen, &snap));
        table.record_write(3u64 << PAGE_SHIFT, 1);
        assert!(!table.snapshot_is_current(gen, &snap));
    }

    #[test]
    fn reset_rejects_snapshots_even_with_coincidental_version_match() {
        let mut table = PageVersionTable::new(8);
        let (gen, snap) = table.snapshot(0, 1);
        table.reset();
        assert_eq!(table.version(0), 0);
        assert!(!table.snapshot_is_current(gen, &snap));
    }
}
