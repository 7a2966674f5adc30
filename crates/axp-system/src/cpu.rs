//! One arena slot: a `Vcpu`, its tiered dispatcher, and a per-CPU perf
//! worker, plus this crate's `CpuTarget` so `SMPCoordinator` broadcasts
//! land on the right TLB/cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use axp_cache::SnoopOp;
use axp_cpu_core::{ExecCpu, ExecDispatcher, StepOutcome, Tier0Interpreter, Vcpu};
use axp_jit::{CompileRequestSink, JitBackend, JitBlockExit};
use axp_mem::MemoryBus;
use axp_mmu::BarrierKind;
use axp_perf::PerfWorker;
use axp_smp::{CpuTarget, ShootdownOp};
use axp_types::PhysAddr;

/// The JIT tier is never enabled by the harness built here. `axp-cpu-core`
/// does have a real fused-micro-op backend (`MicroOpBackend`), but wiring
/// it in needs a `CompileRequestSink` that can call back into the block
/// builder with live CPU/memory access, and `CompileRequestSink` as it
/// stands only carries an `entry_pc`. This stands in for that backend so
/// `ExecDispatcher` still has something concrete to be generic over;
/// reaching it at all is a bug in the dispatch or JIT-enablement logic.
#[derive(Default)]
pub struct DisabledJitBackend;

impl JitBackend for DisabledJitBackend {
    type Cpu = Vcpu<MemoryBus>;

    fn execute(&mut self, _table_index: u32, _cpu: &mut Self::Cpu) -> JitBlockExit {
        unreachable!("JIT tier is disabled by SystemConfig; prepare_block should never report a hit")
    }
}

/// A compile-request sink that never compiles anything, matching
/// `DisabledJitBackend`.
#[derive(Default)]
pub struct NullCompileSink;

impl CompileRequestSink for NullCompileSink {
    fn request_compile(&mut self, _entry_pc: u64) {}
}

type Dispatcher = ExecDispatcher<Tier0Interpreter, DisabledJitBackend, NullCompileSink>;

/// Caps consecutive `step()` calls that deliver an event without retiring
/// any instruction, e.g. guest code that walks into an unmapped page:
/// every fetch re-faults into the same unmapped handler forever. Without
/// this, `CpuUnit::run` would spin the host CPU rather than return.
const MAX_CONSECUTIVE_EVENTS_WITHOUT_RETIREMENT: u32 = 4096;

/// Why a `CpuUnit::run` call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuHalt {
    InstructionBudgetExhausted,
    Halted,
    /// The guest made no retirement progress for
    /// `MAX_CONSECUTIVE_EVENTS_WITHOUT_RETIREMENT` consecutive delivered
    /// events (a fault-handler loop with no valid page table, most often).
    NoForwardProgress,
}

/// Owns one CPU's architectural state behind a `Mutex` so it can double as
/// an `Arc<dyn CpuTarget>` registered with `SMPCoordinator`: a shoot-down
/// or snoop arriving from another CPU's step loop takes the lock the same
/// way this CPU's own run loop does.
pub struct CpuUnit {
    id: u32,
    vcpu: Mutex<Vcpu<MemoryBus>>,
    dispatcher: Mutex<Dispatcher>,
    perf: Mutex<PerfWorker>,
    instructions_retired: AtomicU64,
}

impl CpuUnit {
    pub fn new(vcpu: Vcpu<MemoryBus>, max_insts_per_block: u32, perf: PerfWorker) -> Self {
        let dispatcher = ExecDispatcher::new(Tier0Interpreter::new(max_insts_per_block), axp_jit::JitRuntime::new(
            axp_jit::JitConfig { enabled: false, ..axp_jit::JitConfig::default() },
            DisabledJitBackend,
            NullCompileSink,
        ));
        Self {
            id: vcpu.cpu_id,
            vcpu: Mutex::new(vcpu),
            dispatcher: Mutex::new(dispatcher),
            perf: Mutex::new(perf),
            instructions_retired: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn instructions_retired(&self) -> u64 {
        self.instructions_retired.load(Ordering::Relaxed)
    }

    pub fn set_entry_pc(&self, pc: u64) {
        self.vcpu.lock().unwrap().set_pc(pc);
    }

    /// Runs until the CPU halts, `budget`
    /// instructions have retired since this call started, or the guest
    /// stalls in a fault loop with no retirement progress. Returns `None`
    /// if `budget` is zero.
    pub fn run(&self, budget: u64) -> Option<CpuHalt> {
        if budget == 0 {
            return None;
        }
        let mut vcpu = self.vcpu.lock().unwrap();
        let mut dispatcher = self.dispatcher.lock().unwrap();
        let mut perf = self.perf.lock().unwrap();
        let mut retired_this_call = 0u64;
        let mut events_without_retirement = 0u32;
        loop {
            match dispatcher.step_with_perf(&mut vcpu, &mut perf) {
                StepOutcome::Halted => {
                    perf.flush();
                    return Some(CpuHalt::Halted);
                }
                StepOutcome::EventDelivered => {
                    events_without_retirement += 1;
                    if events_without_retirement >= MAX_CONSECUTIVE_EVENTS_WITHOUT_RETIREMENT {
                        perf.flush();
                        return Some(CpuHalt::NoForwardProgress);
                    }
                }
                StepOutcome::Block { instructions_retired, .. } => {
                    if instructions_retired > 0 {
                        events_without_retirement = 0;
                    } else {
                        events_without_retirement += 1;
                        if events_without_retirement >= MAX_CONSECUTIVE_EVENTS_WITHOUT_RETIREMENT {
                            perf.flush();
                            return Some(CpuHalt::NoForwardProgress);
                        }
                    }
                    retired_this_call += instructions_retired;
                    self.instructions_retired.fetch_add(instructions_retired, Ordering::Relaxed);
                }
            }
            if retired_this_call >= budget {
                perf.flush();
                return Some(CpuHalt::InstructionBudgetExhausted);
            }
        }
    }
}

impl CpuTarget for CpuUnit {
    fn apply_tlb_shootdown(&self, op: ShootdownOp) {
        let mut vcpu = self.vcpu.lock().unwrap();
        let tlb = vcpu.mem.tlb_mut();
        match op {
            ShootdownOp::All => tlb.invalidate_all(),
            ShootdownOp::Asn(asn) => tlb.invalidate_by_asn(asn),
            ShootdownOp::Entry { vaddr, asn, scope } => match scope {
                axp_mmu::TlbScope::Instruction => tlb.invalidate_instruction_entry(vaddr, asn),
                axp_mmu::TlbScope::Data => tlb.invalidate_data_entry(vaddr, asn),
                axp_mmu::TlbScope::Unified => tlb.invalidate_entry(vaddr, asn),
            },
        }
    }

    fn apply_cache_snoop(&self, paddr: PhysAddr, op: SnoopOp) {
        let vcpu = self.vcpu.lock().unwrap();
        vcpu.mem.snoop_data_line(paddr, op);
        if matches!(op, SnoopOp::WriteRfo | SnoopOp::Invalidate) {
            vcpu.mem.invalidate_instruction_line(paddr);
        }
    }

    fn acknowledge_barrier(&self, kind: BarrierKind) {
        let vcpu = self.vcpu.lock().unwrap();
        vcpu.mem.execute_memory_barrier(kind);
    }
}
