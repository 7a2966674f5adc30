use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use axp_types::CACHE_LINE_SIZE;

/// MESI coherency state for one cache line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoherencyState {
    Invalid,
    Shared,
    Exclusive,
    Modified,
}

/// One cache line: tag, data, and atomically-readable valid/dirty flags so a
/// read hit never needs the set lock.
///
/// Coherency state and the line's bytes still require the set lock to
/// mutate; only the fast hit-check path is lock-free.
pub struct CacheLine {
    tag: AtomicU64,
    valid: AtomicBool,
    dirty: AtomicBool,
    state: CoherencyState,
    data: [u8; CACHE_LINE_SIZE],
    last_access: u64,
}

impl CacheLine {
    pub fn empty() -> Self {
        Self {
            tag: AtomicU64::new(0),
            valid: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            state: CoherencyState::Invalid,
            data: [0u8; CACHE_LINE_SIZE],
            last_access: 0,
        }
    }

    pub fn tag(&self) -> u64 {
        self.tag.load(Ordering::Acquire)
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn state(&self) -> CoherencyState {
        self.state
    }

    pub fn data(&self) -> &[u8; CACHE_LINE_SIZE] {
        &self.data
    }

    pub fn last_access(&self) -> u64 {
        self.last_access
    }

    /// Requires the set lock: replaces the whole line (a fill or a
    /// reallocation to a new tag).
    pub fn fill(&mut self, tag: u64, data: [u8; CACHE_LINE_SIZE], state: CoherencyState, stamp: u64) {
        self.tag.store(tag, Ordering::Release);
        self.data = data;
        self.state = state;
        self.dirty.store(false, Ordering::Release);
        self.valid.store(true, Ordering::Release);
        self.last_access = stamp;
    }

    /// Requires the set lock: in-place byte update on a write hit.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8], stamp: u64) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.dirty.store(true, Ordering::Release);
        self.last_access = stamp;
    }

    pub fn touch(&mut self, stamp: u64) {
        self.last_access = stamp;
    }

    pub fn set_state(&mut self, state: CoherencyState) {
        self.state = state;
    }

    /// "set valid=false, do not write back".
    pub fn invalidate(&mut self) {
        self.valid.store(false, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.state = CoherencyState::Invalid;
    }

    pub fn mark_clean(&mut self) {
        self.dirty.store(false, Ordering::Release);
    }
}
