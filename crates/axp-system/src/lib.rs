//! Top-level arena wiring per-CPU cores, the shared memory/cache hierarchy,
//! and the `SMPCoordinator` into one runnable machine, plus the command-line harness that boots a flat binary image on
//! it.

mod cpu;
mod system;

pub use cpu::{CpuHalt, CpuUnit, DisabledJitBackend, NullCompileSink};
pub use system::{BootImage, RunOutcome, System, SystemConfig};
