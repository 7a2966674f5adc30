use axp_types::VirtAddr;

/// Default StackManager capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Hardware-saved exception frame: fixed-layout, pushed on
/// fault and popped on REI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExceptionFrame {
    pub faulting_pc: VirtAddr,
    pub ps_at_fault: u64,
    pub exception_summary: u64,
    /// R16-R21 snapshot, in register-index order.
    pub r16_r21: [u64; 6],
    pub r26: u64,
    pub r27: u64,
    pub r30: u64,
    pub fpcr: u64,
}

/// Full architectural state, attached to a frame only when a context switch
/// happens at that depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavedContext {
    pub integer: [u64; 32],
    pub float: [u64; 32],
    pub fpcr: u64,
    pub asn: u16,
    pub ptbr: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("exception stack overflow at capacity {capacity}")]
pub struct StackOverflow {
    pub capacity: usize,
}

struct Slot {
    frame: ExceptionFrame,
    saved_context: Option<SavedContext>,
}

/// Bounded per-CPU stack of exception frames.
pub struct StackManager {
    capacity: usize,
    frames: Vec<Slot>,
}

impl StackManager {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, frames: Vec::with_capacity(capacity.min(64)) }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Pushes a frame, returning the new depth, or `Err` at capacity with
    /// no mutation.
    pub fn push(&mut self, frame: ExceptionFrame) -> Result<usize, StackOverflow> {
        if self.frames.len() >= self.capacity {
            return Err(StackOverflow { capacity: self.capacity });
        }
        self.frames.push(Slot { frame, saved_context: None });
        Ok(self.frames.len())
    }

    pub fn pop(&mut self) -> Option<ExceptionFrame> {
        self.frames.pop().map(|slot| slot.frame)
    }

    pub fn top(&self) -> Option<&ExceptionFrame> {
        self.frames.last().map(|slot| &slot.frame)
    }

    /// Attaches a full-context spill to the current top frame (called on a
    /// context switch at that depth).
    pub fn attach_saved_context(&mut self, context: SavedContext) {
        if let Some(slot) = self.frames.last_mut() {
            slot.saved_context = Some(context);
        }
    }

    pub fn top_saved_context(&self) -> Option<&SavedContext> {
        self.frames.last().and_then(|slot| slot.saved_context.as_ref())
    }

    /// Deep copy for debugger inspection, holding no lock past return
    /// — trivially satisfied here since `StackManager` owns
    /// its frames outright rather than behind a lock this method could
    /// hold onto.
    pub fn snapshot(&self) -> Vec<ExceptionFrame> {
        self.frames.iter().map(|slot| slot.frame).collect()
    }
}
