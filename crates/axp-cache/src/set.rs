use std::sync::Mutex;

use crate::line::CacheLine;

/// One set of `ways` cache lines, guarded by a single lock for the
/// miss/write/invalidate paths. Read hits are checked lock-free against each
/// line's atomic valid/tag pair before falling back to taking the lock.
pub struct CacheSet {
    ways: Mutex<Vec<CacheLine>>,
}

impl CacheSet {
    pub fn new(ways: usize) -> Self {
        Self { ways: Mutex::new((0..ways).map(|_| CacheLine::empty()).collect()) }
    }

    pub fn ways(&self) -> usize {
        self.ways.lock().unwrap().len()
    }

    /// Fast lock-free probe: does any way hold `tag` and valid? Used before
    /// taking the set lock on the common read-hit path.
    pub fn probe_hit(&self, tag: u64) -> Option<usize> {
        let lines = self.ways.lock().unwrap();
        lines.iter().position(|l| l.is_valid() && l.tag() == tag)
    }

    pub fn with_lines<R>(&self, f: impl FnOnce(&mut Vec<CacheLine>) -> R) -> R {
        let mut lines = self.ways.lock().unwrap();
        f(&mut lines)
    }

    /// "LRU tie-break by way index (lowest way wins)".
    pub fn select_lru(lines: &[CacheLine]) -> usize {
        let mut best = 0usize;
        let mut best_stamp = u64::MAX;
        for (i, line) in lines.iter().enumerate() {
            if !line.is_valid() {
                return i;
            }
            if line.last_access() < best_stamp {
                best_stamp = line.last_access();
                best = i;
            }
        }
        best
    }
}
