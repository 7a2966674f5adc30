//! The top-level arena: shared RAM/cache hierarchy, one `CpuUnit` per
//! guest CPU, and the `SMPCoordinator` wiring them together.

use std::sync::Arc;

use axp_cache::{DataCache, InstructionCache};
use axp_cpu_core::{CpuState, Vcpu};
use axp_mem::{MemError, MemoryBus, PhysicalMemory};
use axp_perf::{PerfCounters, PerfWorker};
use axp_smp::SMPCoordinator;

use crate::cpu::{CpuHalt, CpuUnit};

/// Tuning knobs for a `System`: per-level cache geometry, TLB capacity,
/// and JIT thresholds, bundled for the CLI to populate from flags.
#[derive(Debug, Clone, Copy)]
pub struct SystemConfig {
    pub ram_bytes: u64,
    pub cpu_count: u32,
    pub max_insts_per_block: u32,
    pub tlb_capacity: usize,
    pub l1_sets: usize,
    pub l1_ways: usize,
    pub perf_flush_threshold: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            ram_bytes: 64 * 1024 * 1024,
            cpu_count: 1,
            max_insts_per_block: 64,
            tlb_capacity: 128,
            l1_sets: 256,
            l1_ways: 4,
            perf_flush_threshold: 4096,
        }
    }
}

/// A flat binary loaded directly into physical RAM at `load_addr`, with
/// every CPU's PC set to `entry`. There is no firmware/bootloader stage
/// modeled here; this is the harness equivalent of a "load image, jump to
/// reset vector" bring-up path.
#[derive(Debug, Clone, Copy)]
pub struct BootImage<'a> {
    pub bytes: &'a [u8],
    pub load_addr: u64,
    pub entry: u64,
}

/// What stopped a `System::run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub cpu_id: u32,
    pub halt: CpuHalt,
    pub instructions_retired: u64,
}

pub struct System {
    cpus: Vec<Arc<CpuUnit>>,
    bus: MemoryBus,
    coordinator: Arc<SMPCoordinator>,
    perf_counters: Arc<PerfCounters>,
}

impl System {
    pub fn new(config: SystemConfig) -> Result<Self, MemError> {
        let ram = Arc::new(PhysicalMemory::new(config.ram_bytes)?);
        let bus = MemoryBus::new(ram);
        let coordinator = Arc::new(SMPCoordinator::new());
        let perf_counters = Arc::new(PerfCounters::new());

        let mut cpus = Vec::with_capacity(config.cpu_count as usize);
        for cpu_id in 0..config.cpu_count {
            let l1d = DataCache::new(config.l1_sets, config.l1_ways, bus.clone());
            let icache = InstructionCache::new(config.l1_sets, config.l1_ways, bus.clone());
            let mem = axp_mmu::MemorySystem::new(config.tlb_capacity, l1d, icache, bus.clone());
            let vcpu = Vcpu::new(cpu_id, CpuState::new(), mem, coordinator.clone());
            let perf = PerfWorker::with_flush_threshold(perf_counters.clone(), config.perf_flush_threshold);
            let unit = Arc::new(CpuUnit::new(vcpu, config.max_insts_per_block, perf));
            coordinator.register_cpu(cpu_id, unit.clone());
            cpus.push(unit);
        }

        Ok(Self { cpus, bus, coordinator, perf_counters })
    }

    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    pub fn perf_counters(&self) -> &Arc<PerfCounters> {
        &self.perf_counters
    }

    pub fn coordinator(&self) -> &Arc<SMPCoordinator> {
        &self.coordinator
    }

    /// Writes `image.bytes` into physical RAM and sets every CPU's PC to
    /// `image.entry`. CPU 0 is the only one started; secondary-CPU start-up
    /// (console callback, INIT_PROCESSOR PALcode) is left out of scope, so
    /// additional CPUs sit registered with the coordinator but idle until a
    /// caller starts them explicitly.
    pub fn load_image(&self, image: BootImage<'_>) -> Result<(), MemError> {
        self.bus.try_write_bytes(image.load_addr, image.bytes)?;
        if let Some(boot_cpu) = self.cpus.first() {
            boot_cpu.set_entry_pc(image.entry);
        }
        Ok(())
    }

    /// Runs CPU 0 in round-robin time slices of `slice_insts` instructions
    /// each until it halts or `max_insts` total instructions have retired.
    /// Secondary CPUs never run on their own here; a caller that starts
    /// one via `cpu(id).set_entry_pc` is responsible for also driving it
    /// through `cpu(id).run`. A single-threaded harness is sufficient to
    /// demonstrate the tiered dispatch and SMP coordination plumbing
    /// without committing to a real multi-core scheduler.
    pub fn run_boot_cpu(&self, max_insts: u64, slice_insts: u64) -> RunOutcome {
        let boot_cpu = &self.cpus[0];
        let mut retired = 0u64;
        loop {
            let remaining = max_insts.saturating_sub(retired);
            if remaining == 0 {
                return RunOutcome { cpu_id: boot_cpu.id(), halt: CpuHalt::InstructionBudgetExhausted, instructions_retired: retired };
            }
            let slice = slice_insts.min(remaining).max(1);
            let before = boot_cpu.instructions_retired();
            match boot_cpu.run(slice) {
                Some(halt @ (CpuHalt::Halted | CpuHalt::NoForwardProgress)) => {
                    retired += boot_cpu.instructions_retired() - before;
                    return RunOutcome { cpu_id: boot_cpu.id(), halt, instructions_retired: retired };
                }
                Some(CpuHalt::InstructionBudgetExhausted) | None => {
                    retired += boot_cpu.instructions_retired() - before;
                }
            }
        }
    }

    pub fn cpu(&self, id: u32) -> Option<&Arc<CpuUnit>> {
        self.cpus.get(id as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_with_no_page_table_stalls_as_no_forward_progress_rather_than_spinning_forever() {
        // `ptbr` defaults to 0 and this harness installs no page table, so
        // the very first fetch re-faults forever: this exercises the
        // runaway-fault-loop guard rather than real guest execution, which
        // would need a hand-built page table this crate does not attempt
        // to construct.
        let system = System::new(SystemConfig { cpu_count: 1, ..SystemConfig::default() }).unwrap();
        system.load_image(BootImage { bytes: &[0u8; 4], load_addr: 0, entry: 0 }).unwrap();

        let outcome = system.run_boot_cpu(1_000_000, 4096);
        assert_eq!(outcome.cpu_id, 0);
        assert_eq!(outcome.halt, CpuHalt::NoForwardProgress);
        assert_eq!(outcome.instructions_retired, 0);
    }

    #[test]
    fn secondary_cpus_stay_registered_but_idle() {
        let system = System::new(SystemConfig { cpu_count: 2, ..SystemConfig::default() }).unwrap();
        assert_eq!(system.cpu_count(), 2);
        assert_eq!(system.coordinator().cpu_count(), 2);
        assert_eq!(system.cpu(1).unwrap().instructions_retired(), 0);
    }
}
