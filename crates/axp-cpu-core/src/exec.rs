//! Ties the tier-0 instruction-at-a-time interpreter to the JIT tier
//! through one per-CPU dispatch loop: each call to
//! `ExecDispatcher::step` drains one pending exception/interrupt/AST first
//! (an instruction boundary is the only place one may be taken), then
//! either dispatches a hot compiled block or runs the tier-0 interpreter,
//! accounting for rollback/commit and the `exit_to_interpreter` flag a
//! block uses to force one precise interpreter step.
//!
//! Grounded in `aero_cpu_core::exec::ExecDispatcher`'s tiered-step shape
//! (`tests/tiered_runtime.rs`, `tests/exec_dispatcher_jit_commit_flag.rs`,
//! `tests/exec_dispatcher_perf_worker.rs`, `tests/jit_bookkeeping.rs`),
//! generalized from x86 IDT delivery to `ExceptionEngine`'s PAL-vector
//! model, and from a native-codegen JIT backend to the fused-micro-op
//! backend this engine uses in its place.

use std::sync::Arc;

use axp_cache::CacheBackend;
use axp_constants::pal;
use axp_decoder::decode;
use axp_interrupts::PendingEvents;
use axp_jit::{CompileRequestSink, JitBackend, JitRuntime};
use axp_mmu::{MemorySystem, ReservationTracker};
use axp_types::VirtAddr;

use crate::exception::{to_synchronous_fault, Delivery, ExceptionEngine};
use crate::fault::Fault;
use crate::interp::{StepOutcome as Tier0StepOutcome, Tier0};
use crate::state::CpuState;

/// What draining one pending event at an instruction boundary did to the
/// CPU: nothing was both queued and unmasked, something
/// was delivered and the PC redirected to PAL code, or delivery itself
/// could not proceed and the CPU must stop (a double machine check that
/// also failed to push a frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPoll {
    Idle,
    Delivered,
    Halted,
}

/// What `ExecDispatcher` needs from a concrete per-CPU type to drive the
/// dispatch loop.
pub trait ExecCpu {
    fn pc(&self) -> VirtAddr;
    fn set_pc(&mut self, pc: VirtAddr);
    fn poll_and_deliver_pending(&mut self) -> PendingPoll;
    /// Ages any open interrupt shadow by the instructions a committed block
    /// just retired.
    fn age_interrupt_shadow(&mut self, retired: u64);
    /// Opens an interrupt shadow lasting one more instruction boundary, per
    /// a committed block's `inhibit_interrupts_after_block`.
    fn begin_interrupt_shadow(&mut self);
}

/// What a block execution retired, block-at-a-time: the
/// JIT tier and the tier-0 interpreter both report through this shape so
/// `ExecDispatcher` can treat them uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterBlockExit {
    pub next_pc: VirtAddr,
    pub instructions_retired: u64,
}

/// A block-at-a-time execution engine `ExecDispatcher` can fall back to
/// when no compiled block covers the current PC.
pub trait Interpreter<Cpu> {
    fn exec_block(&mut self, cpu: &mut Cpu) -> InterpreterBlockExit;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutedTier {
    Interpreter,
    Jit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Block {
        tier: ExecutedTier,
        entry_pc: VirtAddr,
        next_pc: VirtAddr,
        instructions_retired: u64,
    },
    /// A pending exception/interrupt/AST was drained and delivered instead
    /// of dispatching a block this step.
    EventDelivered,
    /// Delivery itself could not proceed (double machine check with no
    /// room for a frame); the CPU is stopped.
    Halted,
}

/// Drives one CPU's fetch loop across both tiers.
pub struct ExecDispatcher<I, Backend, Sink> {
    interp: I,
    jit: JitRuntime<Backend, Sink>,
    /// Set by a block that exited with `exit_to_interpreter`: forces
    /// exactly one interpreter step before JIT dispatch is tried again,
    /// even if the target PC has a compiled block.
    force_interpreter_once: bool,
}

impl<I, Backend, Sink> ExecDispatcher<I, Backend, Sink>
where
    Backend: JitBackend,
    Sink: CompileRequestSink,
{
    pub fn new(interp: I, jit: JitRuntime<Backend, Sink>) -> Self {
        Self { interp, jit, force_interpreter_once: false }
    }

    pub fn jit_mut(&mut self) -> &mut JitRuntime<Backend, Sink> {
        &mut self.jit
    }

    pub fn step(&mut self, cpu: &mut Backend::Cpu) -> StepOutcome
    where
        I: Interpreter<Backend::Cpu>,
        Backend::Cpu: ExecCpu,
    {
        match cpu.poll_and_deliver_pending() {
            PendingPoll::Delivered => {
                self.force_interpreter_once = false;
                return StepOutcome::EventDelivered;
            }
            PendingPoll::Halted => return StepOutcome::Halted,
            PendingPoll::Idle => {}
        }

        let entry_pc = cpu.pc();

        if !self.force_interpreter_once && self.jit.config().enabled {
            if let Some(table_index) = self.jit.prepare_block(entry_pc) {
                let meta = self.jit.meta(entry_pc);
                let retirable = meta.map(|m| u64::from(m.instruction_count)).unwrap_or(0);
                let inhibit_after = meta.map(|m| m.inhibit_interrupts_after_block).unwrap_or(false);
                let exit = self.jit.execute(table_index, cpu);
                self.force_interpreter_once = exit.exit_to_interpreter;
                cpu.set_pc(exit.next_pc);
                let instructions_retired = if exit.committed { retirable } else { 0 };
                if exit.committed {
                    cpu.age_interrupt_shadow(instructions_retired);
                    if inhibit_after {
                        cpu.begin_interrupt_shadow();
                    }
                }
                return StepOutcome::Block {
                    tier: ExecutedTier::Jit,
                    entry_pc,
                    next_pc: exit.next_pc,
                    instructions_retired,
                };
            }
        }

        self.force_interpreter_once = false;
        let result = self.interp.exec_block(cpu);
        cpu.set_pc(result.next_pc);
        cpu.age_interrupt_shadow(result.instructions_retired);
        StepOutcome::Block {
            tier: ExecutedTier::Interpreter,
            entry_pc,
            next_pc: result.next_pc,
            instructions_retired: result.instructions_retired,
        }
    }

    /// As `step`, additionally folding any retired instructions into a
    /// per-CPU performance-counter worker.
    pub fn step_with_perf(&mut self, cpu: &mut Backend::Cpu, perf: &mut axp_perf::PerfWorker) -> StepOutcome
    where
        I: Interpreter<Backend::Cpu>,
        Backend::Cpu: ExecCpu,
    {
        let outcome = self.step(cpu);
        if let StepOutcome::Block { instructions_retired, .. } = outcome {
            if instructions_retired > 0 {
                perf.retire_instructions(instructions_retired);
            }
        }
        outcome
    }
}

/// A single CPU's dispatch-facing bundle: architectural state, the memory
/// system it fetches/loads/stores through, its pending-event queue, and
/// shared access to the SMP-wide LL/SC reservation table. What the
/// teacher's `Vcpu<Bus>` is to a flat x86 address space, this is to a
/// translated Alpha one.
pub struct Vcpu<Backend: CacheBackend + Clone> {
    pub cpu_id: u32,
    pub state: CpuState,
    pub mem: MemorySystem<Backend>,
    pub pending: PendingEvents,
    pub reservations: Arc<dyn ReservationTracker>,
    pc: VirtAddr,
}

impl<Backend: CacheBackend + Clone> Vcpu<Backend> {
    pub fn new(
        cpu_id: u32,
        state: CpuState,
        mem: MemorySystem<Backend>,
        reservations: Arc<dyn ReservationTracker>,
    ) -> Self {
        Self { cpu_id, state, mem, pending: PendingEvents::new(), reservations, pc: 0 }
    }
}

impl<Backend: CacheBackend + Clone> ExecCpu for Vcpu<Backend> {
    fn pc(&self) -> VirtAddr {
        self.pc
    }

    fn set_pc(&mut self, pc: VirtAddr) {
        self.pc = pc;
    }

    fn poll_and_deliver_pending(&mut self) -> PendingPoll {
        match ExceptionEngine::poll_and_deliver(&mut self.state, &mut self.pending, self.pc) {
            None => PendingPoll::Idle,
            Some(Delivery::Halt) => PendingPoll::Halted,
            Some(Delivery::EnteredPal { pc }) => {
                self.pc = pc;
                PendingPoll::Delivered
            }
            Some(Delivery::EscalatedMachineCheck { pc, .. }) => {
                self.pc = pc;
                PendingPoll::Delivered
            }
            // `ExceptionEngine::deliver` never produces `Resumed`; that
            // variant is REI's alone.
            Some(Delivery::Resumed { pc }) => {
                self.pc = pc;
                PendingPoll::Delivered
            }
        }
    }

    fn age_interrupt_shadow(&mut self, retired: u64) {
        self.pending.age_interrupt_shadow(retired);
    }

    fn begin_interrupt_shadow(&mut self) {
        self.pending.begin_interrupt_shadow(1);
    }
}

/// The reference, instruction-at-a-time execution tier:
/// fetches, decodes, and steps up to `max_insts_per_block` instructions,
/// stopping early on a branch/PAL-call/fault, or as soon as something
/// becomes pending so `ExceptionEngine` gets a chance to act on it at the
/// next instruction boundary rather than only at the end of a long
/// straight-line run. The JIT tier's fused-micro-op blocks must agree with
/// this tier byte-for-byte; it is not merely a slow-path fallback.
pub struct Tier0Interpreter {
    max_insts_per_block: u32,
}

impl Tier0Interpreter {
    pub fn new(max_insts_per_block: u32) -> Self {
        Self { max_insts_per_block: max_insts_per_block.max(1) }
    }

    /// CALL_PAL dispatch target. See `axp_constants::pal::CALL_PAL_TABLE`'s doc comment
    /// for why the exact stride is this crate's own convention rather than
    /// one pinned by `original_source`.
    fn pal_entry(state: &CpuState, function: u32) -> VirtAddr {
        state.pal_base() + pal::CALL_PAL_TABLE + (function as u64) * 0x40
    }
}

impl<Backend: CacheBackend + Clone> Interpreter<Vcpu<Backend>> for Tier0Interpreter {
    fn exec_block(&mut self, cpu: &mut Vcpu<Backend>) -> InterpreterBlockExit {
        let mut retired = 0u64;
        let mut pc = cpu.pc();

        for i in 0..self.max_insts_per_block {
            if i > 0 && !cpu.pending.is_empty() {
                break;
            }

            let word = match cpu.mem.fetch_instruction(cpu.state.asn(), pc, cpu.state.mode()) {
                Ok(word) => word,
                Err(tlb_fault) => {
                    cpu.pending.raise_synchronous_fault(to_synchronous_fault(Fault::from(tlb_fault), pc));
                    break;
                }
            };

            let instr = match decode(word) {
                Ok(instr) => instr,
                Err(_) => {
                    cpu.pending.raise_synchronous_fault(to_synchronous_fault(Fault::IllegalOpcode { pc }, pc));
                    break;
                }
            };

            let reservations = cpu.reservations.as_ref();
            match Tier0::step(&mut cpu.state, &mut cpu.mem, reservations, cpu.cpu_id, pc, instr) {
                Ok(Tier0StepOutcome::Next) => {
                    retired += 1;
                    pc += 4;
                }
                Ok(Tier0StepOutcome::Branch { target }) => {
                    retired += 1;
                    pc = target;
                    break;
                }
                Ok(Tier0StepOutcome::PalCall { function }) => {
                    retired += 1;
                    pc = Self::pal_entry(&cpu.state, function);
                    break;
                }
                Err(fault) => {
                    cpu.pending.raise_synchronous_fault(to_synchronous_fault(fault, pc));
                    break;
                }
            }
        }

        cpu.set_pc(pc);
        InterpreterBlockExit { next_pc: pc, instructions_retired: retired }
    }
}
