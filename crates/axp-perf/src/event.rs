use serde::{Deserialize, Serialize};

/// The eight logical event slots backing the IPR performance-counter bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PerfEvent {
    Cycles = 0,
    InstructionsRetired = 1,
    MemoryReferences = 2,
    ICacheMiss = 3,
    DCacheMiss = 4,
    TlbMiss = 5,
    BranchMispredict = 6,
    /// The one user-configurable slot left open for callers.
    Custom = 7,
}

pub const EVENT_COUNT: usize = 8;

impl PerfEvent {
    pub const ALL: [PerfEvent; EVENT_COUNT] = [
        PerfEvent::Cycles,
        PerfEvent::InstructionsRetired,
        PerfEvent::MemoryReferences,
        PerfEvent::ICacheMiss,
        PerfEvent::DCacheMiss,
        PerfEvent::TlbMiss,
        PerfEvent::BranchMispredict,
        PerfEvent::Custom,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Which privilege modes a counter accumulates in, and what happens when it
/// overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterConfig {
    pub count_kernel: bool,
    pub count_user: bool,
    pub overflow_action: OverflowAction,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self { count_kernel: true, count_user: true, overflow_action: OverflowAction::Saturate }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowAction {
    Saturate,
    Wrap,
    RaiseInterrupt,
}
