use std::sync::Arc;

use crate::counters::PerfCounters;
use crate::event::{PerfEvent, EVENT_COUNT};

/// A delta of all eight counters since some reference point (frame start,
/// benchmark start). Grounded in `aero-perf`'s `begin_frame`/`benchmark_delta`
/// pattern (`tests/perf_worker_accessors.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfDelta {
    pub instructions_executed: u64,
    pub values: [u64; EVENT_COUNT],
}

/// Per-CPU performance-counter accumulator. Increments are buffered locally
/// and folded into the shared `PerfCounters` once `flush_threshold` retired
/// instructions have accumulated, avoiding a cross-CPU atomic RMW on every
/// one.
pub struct PerfWorker {
    shared: Arc<PerfCounters>,
    local: [u64; EVENT_COUNT],
    since_flush: u64,
    flush_threshold: u64,
    frame_start: [u64; EVENT_COUNT],
    benchmark_start: Option<[u64; EVENT_COUNT]>,
}

impl PerfWorker {
    pub fn new(shared: Arc<PerfCounters>) -> Self {
        Self::with_flush_threshold(shared, 4096)
    }

    pub fn with_flush_threshold(shared: Arc<PerfCounters>, flush_threshold: u64) -> Self {
        Self {
            shared,
            local: [0; EVENT_COUNT],
            since_flush: 0,
            flush_threshold,
            frame_start: [0; EVENT_COUNT],
            benchmark_start: None,
        }
    }

    fn totals(&self) -> [u64; EVENT_COUNT] {
        let mut out = [0u64; EVENT_COUNT];
        for event in PerfEvent::ALL {
            out[event.index()] = self.shared.value(event) + self.local[event.index()];
        }
        out
    }

    pub fn record_event(&mut self, event: PerfEvent, count: u64) {
        self.local[event.index()] += count;
        if event == PerfEvent::InstructionsRetired {
            self.since_flush += count;
            if self.since_flush >= self.flush_threshold {
                self.flush();
            }
        }
    }

    pub fn retire_instructions(&mut self, count: u64) {
        self.record_event(PerfEvent::InstructionsRetired, count);
    }

    pub fn add_cycles(&mut self, count: u64) {
        self.record_event(PerfEvent::Cycles, count);
    }

    pub fn flush(&mut self) {
        self.shared.fold(&self.local);
        self.local = [0; EVENT_COUNT];
        self.since_flush = 0;
    }

    /// Marks the start of frame `_index` and returns the delta since the
    /// previous call (zero on the very first call).
    pub fn begin_frame(&mut self, _index: u64) -> PerfDelta {
        let totals = self.totals();
        let mut values = [0u64; EVENT_COUNT];
        for i in 0..EVENT_COUNT {
            values[i] = totals[i] - self.frame_start[i];
        }
        self.frame_start = totals;
        PerfDelta { instructions_executed: values[PerfEvent::InstructionsRetired.index()], values }
    }

    pub fn begin_benchmark(&mut self) {
        self.benchmark_start = Some(self.totals());
    }

    pub fn benchmark_delta(&self) -> Option<PerfDelta> {
        let start = self.benchmark_start?;
        let totals = self.totals();
        let mut values = [0u64; EVENT_COUNT];
        for i in 0..EVENT_COUNT {
            values[i] = totals[i] - start[i];
        }
        Some(PerfDelta { instructions_executed: values[PerfEvent::InstructionsRetired.index()], values })
    }

    pub fn end_benchmark(&mut self) -> Option<PerfDelta> {
        let delta = self.benchmark_delta();
        self.benchmark_start = None;
        delta
    }
}
