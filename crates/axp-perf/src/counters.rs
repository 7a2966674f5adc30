use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::event::{CounterConfig, OverflowAction, PerfEvent, EVENT_COUNT};

/// Lifetime-cumulative counters shared across every CPU. Workers buffer
/// locally and fold into these atomics periodically rather than doing a
/// cross-CPU RMW per retired instruction.
pub struct PerfCounters {
    values: [AtomicU64; EVENT_COUNT],
    configs: Mutex<[CounterConfig; EVENT_COUNT]>,
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            values: Default::default(),
            configs: Mutex::new([CounterConfig::default(); EVENT_COUNT]),
        }
    }

    pub fn configure(&self, event: PerfEvent, config: CounterConfig) {
        self.configs.lock().unwrap()[event.index()] = config;
    }

    pub fn config(&self, event: PerfEvent) -> CounterConfig {
        self.configs.lock().unwrap()[event.index()]
    }

    pub fn value(&self, event: PerfEvent) -> u64 {
        self.values[event.index()].load(Ordering::Relaxed)
    }

    /// Folds a worker's locally-buffered delta into the shared counters,
    /// honoring each counter's overflow action.
    pub fn fold(&self, deltas: &[u64; EVENT_COUNT]) {
        let configs = self.configs.lock().unwrap();
        for event in PerfEvent::ALL {
            let delta = deltas[event.index()];
            if delta == 0 {
                continue;
            }
            let slot = &self.values[event.index()];
            match configs[event.index()].overflow_action {
                OverflowAction::Wrap => {
                    slot.fetch_add(delta, Ordering::Relaxed);
                }
                OverflowAction::Saturate => {
                    let mut current = slot.load(Ordering::Relaxed);
                    loop {
                        let next = current.saturating_add(delta);
                        match slot.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                            Ok(_) => break,
                            Err(observed) => current = observed,
                        }
                    }
                }
                OverflowAction::RaiseInterrupt => {
                    slot.fetch_add(delta, Ordering::Relaxed);
                    tracing::event!(tracing::Level::WARN, event = ?event, "performance counter overflow-interrupt configured, delivery is the caller's responsibility");
                }
            }
        }
    }

    pub fn snapshot(&self) -> PerfSnapshot {
        let mut values = [0u64; EVENT_COUNT];
        for event in PerfEvent::ALL {
            values[event.index()] = self.value(event);
        }
        PerfSnapshot { values }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerfSnapshot {
    pub values: [u64; EVENT_COUNT],
}

impl PerfSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
