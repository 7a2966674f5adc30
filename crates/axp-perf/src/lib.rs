//! `PerformanceCounters`: eight configurable event
//! counters shared across CPUs, each with a per-CPU buffering worker.

mod counters;
mod event;
mod worker;

pub use counters::{PerfCounters, PerfSnapshot};
pub use event::{CounterConfig, OverflowAction, PerfEvent, EVENT_COUNT};
pub use worker::{PerfDelta, PerfWorker};
