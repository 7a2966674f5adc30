use std::collections::HashMap;

use crate::page_version::PageVersionSnapshot;

/// Everything needed to validate a compiled block and account for its
/// retirement without re-deriving it from the code itself.
#[derive(Debug, Clone)]
pub struct CompiledBlockMeta {
    pub code_paddr: u64,
    pub byte_len: u32,
    pub page_versions_generation: u64,
    pub page_versions: Vec<PageVersionSnapshot>,
    pub instruction_count: u32,
    pub inhibit_interrupts_after_block: bool,
}

/// A `CodeCache` slot: which dispatch table index the backend should
/// execute for `entry_pc`, plus its validation metadata.
#[derive(Debug, Clone)]
pub struct CompiledBlockHandle {
    pub entry_pc: u64,
    pub table_index: u32,
    pub meta: CompiledBlockMeta,
}

struct Slot {
    handle: CompiledBlockHandle,
    last_touch: u64,
}

/// LRU- and byte-budget-bounded table of compiled blocks, keyed by
/// entry-pc. `insert` evicts oldest-touched entries
/// until both the block-count and byte-budget constraints hold, and
/// reports which entries were evicted so the runtime can drop any cached
/// dispatch-table references to them.
pub struct CodeCache {
    max_blocks: usize,
    max_bytes: u64,
    slots: HashMap<u64, Slot>,
    current_bytes: u64,
    tick: u64,
}

impl CodeCache {
    pub fn new(max_blocks: usize, max_bytes: u64) -> Self {
        Self {
            max_blocks: max_blocks.max(1),
            max_bytes,
            slots: HashMap::new(),
            current_bytes: 0,
            tick: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn current_bytes(&self) -> u64 {
        self.current_bytes
    }

    pub fn contains(&self, entry_pc: u64) -> bool {
        self.slots.contains_key(&entry_pc)
    }

    pub fn get_cloned(&mut self, entry_pc: u64) -> Option<CompiledBlockHandle> {
        self.tick += 1;
        let tick = self.tick;
        let slot = self.slots.get_mut(&entry_pc)?;
        slot.last_touch = tick;
        Some(slot.handle.clone())
    }

    pub fn meta(&self, entry_pc: u64) -> Option<&CompiledBlockMeta> {
        self.slots.get(&entry_pc).map(|s| &s.handle.meta)
    }

    /// Inserts (or replaces) the block for `handle.entry_pc`, evicting
    /// least-recently-touched entries as needed. Returns the `table_index`
    /// of every entry evicted to make room.
    pub fn insert(&mut self, handle: CompiledBlockHandle) -> Vec<u32> {
        self.tick += 1;
        let tick = self.tick;

        let mut evicted = Vec::new();
        if let Some(old) = self.slots.remove(&handle.entry_pc) {
            self.current_bytes -= old.handle.meta.byte_len as u64;
        }

        let incoming_bytes = handle.meta.byte_len as u64;
        while self.slots.len() >= self.max_blocks
            || (self.max_bytes > 0 && self.current_bytes + incoming_bytes > self.max_bytes)
        {
            match self.evict_lru() {
                Some(idx) => evicted.push(idx),
                None => break,
            }
        }

        self.current_bytes += incoming_bytes;
        self.slots.insert(handle.entry_pc, Slot { handle, last_touch: tick });
        evicted
    }

    pub fn remove(&mut self, entry_pc: u64) -> Option<CompiledBlockHandle> {
        let slot = self.slots.remove(&entry_pc)?;
        self.current_bytes -= slot.handle.meta.byte_len as u64;
        Some(slot.handle)
    }

    fn evict_lru(&mut self) -> Option<u32> {
        let victim = self.slots.iter().min_by_key(|(_, s)| s.last_touch).map(|(pc, _)| *pc)?;
        let slot = self.slots.remove(&victim)?;
        self.current_bytes -= slot.handle.meta.byte_len as u64;
        Some(slot.handle.table_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(entry_pc: u64, byte_len: u32) -> CompiledBlockHandle {
        CompiledBlockHandle {
            entry_pc,
            table_index: entry_pc as u32,
            meta: CompiledBlockMeta {
                code_paddr: entry_pc,
                byte_len,
                page_versions_generation: 0,
                page_versions: Vec::new(),
                instruction_count: 1,
                inhibit_interrupts_after_block: false,
            },
        }
    }

    #[test]
    fn eviction_is_lru_and_block_count_capped() {
        let mut cache = CodeCache::new(2, 0);
        assert!(cache.insert(handle(0, 10)).is_empty());
        assert!(cache.insert(handle(1, 10)).is_empty());
        cache.get_cloned(0);
        let evicted = cache.insert(handle(2, 10));
        assert_eq!(evicted, vec![1]);
        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
    }

    #[test]
    fn eviction_respects_byte_budget() {
        let mut cache = CodeCache::new(10, 15);
        assert!(cache.insert(handle(10, 10)).is_empty());
        let evicted = cache.insert(handle(11, 10));
        assert_eq!(evicted, vec![10]);
        assert!(!cache.contains(10));
        assert!(cache.contains(11));
        assert!(cache.current_bytes() <= 15);
    }
}
