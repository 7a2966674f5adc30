use std::collections::HashMap;

struct HotnessEntry {
    hits: u32,
    requested: bool,
    last_touch: u64,
}

/// Capacity-bounded hit-count map from block-entry PC to how many times it
/// has been reached. A guest touching unbounded
/// distinct PCs cannot grow this past `capacity`; a PC that has already
/// crossed `threshold` is pinned against eviction so it never re-requests
/// compilation.
pub struct HotnessProfile {
    threshold: u32,
    capacity: usize,
    entries: HashMap<u64, HotnessEntry>,
    tick: u64,
}

impl HotnessProfile {
    pub fn new_with_capacity(threshold: u32, capacity: usize) -> Self {
        Self { threshold, capacity, entries: HashMap::new(), tick: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records one hit at `entry_pc`. Returns `true` exactly once, the
    /// moment the hit count crosses `threshold` for a PC that does not
    /// already have a compiled block.
    pub fn record_hit(&mut self, entry_pc: u64, has_compiled_block: bool) -> bool {
        self.tick += 1;
        let tick = self.tick;

        if !self.entries.contains_key(&entry_pc) && self.entries.len() >= self.capacity {
            self.evict_one();
        }

        let entry = self.entries.entry(entry_pc).or_insert(HotnessEntry {
            hits: 0,
            requested: false,
            last_touch: tick,
        });
        entry.hits = entry.hits.saturating_add(1);
        entry.last_touch = tick;

        if has_compiled_block || entry.requested {
            return false;
        }
        if entry.hits >= self.threshold {
            entry.requested = true;
            return true;
        }
        false
    }

    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .filter(|(_, e)| !e.requested)
            .min_by_key(|(_, e)| e.last_touch)
            .map(|(pc, _)| *pc);
        if let Some(pc) = victim {
            self.entries.remove(&pc);
        }
    }
}
