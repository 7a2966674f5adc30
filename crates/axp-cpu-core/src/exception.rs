//! Fault delivery and REI: builds and pushes exception
//! frames, switches to kernel mode and PAL code, and processes REI's
//! frame-pop-and-possibly-redispatch. Grounded in `aero_cpu_core::interrupts`'
//! `deliver_pending_event` shape, generalized from x86 IDT entry to the
//! Alpha PAL-vector-table model.

use axp_constants::{exc_sum, ipr, pal, ps, MachineCheckType};
use axp_types::VirtAddr;

use axp_interrupts::{PendingEvent, PendingEvents, SynchronousFault};

use crate::fault::Fault;
use crate::stack::ExceptionFrame;
use crate::state::CpuState;

/// What became of a fault/REI delivery attempt, for the caller (the not-yet-
/// built interpreter/`ExecDispatcher`) to apply to its own program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Entered PAL code at this entry-vector PC.
    EnteredPal { pc: VirtAddr },
    /// A frame push failed while already delivering a fault; forced straight to the machine-check
    /// vector with no new frame.
    EscalatedMachineCheck { pc: VirtAddr, kind: MachineCheckType },
    /// REI restored architectural state with nothing pending to redispatch;
    /// execution resumes here.
    Resumed { pc: VirtAddr },
    /// The machine-check vector itself could not take a frame. Nothing
    /// left to do but stop the CPU.
    Halt,
}

/// Converts a caught `Fault` into the form `PendingEvents` queues, the
/// boundary between this crate's fault taxonomy and the asynchronous-event
/// queue that also carries machine checks, interrupts, and ASTs.
pub fn to_synchronous_fault(fault: Fault, current_pc: VirtAddr) -> SynchronousFault {
    SynchronousFault {
        pal_offset: fault.pal_offset(),
        exc_sum: fault.exc_sum_bits(),
        pc: fault.pc_override().unwrap_or(current_pc),
    }
}

/// Stateless fault-delivery/REI logic over a `CpuState`.
pub struct ExceptionEngine;

impl ExceptionEngine {
    /// Delivers the highest-priority drained `PendingEvent`.
    pub fn deliver(state: &mut CpuState, event: PendingEvent, current_pc: VirtAddr) -> Delivery {
        match event {
            PendingEvent::Synchronous(f) => Self::enter(state, f.pal_offset, f.exc_sum, f.pc, None),
            PendingEvent::MachineCheck(kind) => {
                let delivery = Self::enter(state, pal::MACHINE_CHECK, exc_sum::MACHINE_CHECK, current_pc, None);
                match delivery {
                    Delivery::EnteredPal { pc } => Delivery::EscalatedMachineCheck { pc, kind },
                    other => other,
                }
            }
            PendingEvent::ExternalInterrupt { ipl } => {
                Self::enter(state, pal::INTERRUPT, exc_sum::INTERRUPT, current_pc, Some(ipl))
            }
            // ASTs have no dedicated exception-summary bit in `original_source`;
            // they are themselves a software-interrupt mechanism in the real
            // architecture, so they reuse the INTERRUPT bit.
            PendingEvent::Ast { .. } => Self::enter(state, pal::AST, exc_sum::INTERRUPT, current_pc, None),
        }
    }

    /// Drains and delivers the next pending event, if any is both queued
    /// and currently unmasked.
    pub fn poll_and_deliver(state: &mut CpuState, pending: &mut PendingEvents, current_pc: VirtAddr) -> Option<Delivery> {
        Self::poll_pending(state, pending).map(|event| Self::deliver(state, event, current_pc))
    }

    fn poll_pending(state: &CpuState, pending: &mut PendingEvents) -> Option<PendingEvent> {
        let ps_value = state.read_ipr(ipr::PS);
        let ast_mask = (state.read_ipr(ipr::ASTEN) & 0xF) as u8;
        pending.next_event(ps::interrupts_enabled(ps_value), ps::ipl(ps_value), ast_mask)
    }

    fn enter(state: &mut CpuState, pal_offset: u64, exc_sum_bits: u64, faulting_pc: VirtAddr, ipl_override: Option<u8>) -> Delivery {
        let frame = Self::build_frame(state, faulting_pc, exc_sum_bits);
        match state.stack.push(frame) {
            Ok(_) => Delivery::EnteredPal { pc: Self::switch_to_pal(state, pal_offset, ipl_override) },
            Err(_) if pal_offset == pal::MACHINE_CHECK => Delivery::Halt,
            Err(_) => Self::escalate_double_fault(state),
        }
    }

    /// On a double fault, no new frame (the stack already
    /// rejected one), just force kernel mode and the machine-check vector.
    fn escalate_double_fault(state: &mut CpuState) -> Delivery {
        let pc = Self::switch_to_pal(state, pal::MACHINE_CHECK, None);
        Delivery::EscalatedMachineCheck { pc, kind: MachineCheckType::DoubleMachineCheck }
    }

    fn build_frame(state: &CpuState, faulting_pc: VirtAddr, exc_sum_bits: u64) -> ExceptionFrame {
        let r = &state.registers;
        ExceptionFrame {
            faulting_pc,
            ps_at_fault: state.read_ipr(ipr::PS),
            exception_summary: exc_sum_bits,
            r16_r21: [
                r.read_int(16),
                r.read_int(17),
                r.read_int(18),
                r.read_int(19),
                r.read_int(20),
                r.read_int(21),
            ],
            r26: r.read_int(26),
            r27: r.read_int(27),
            r30: r.read_int(30),
            fpcr: r.fpcr().bits(),
        }
    }

    /// Switches to PAL mode at `pal_offset`: current-mode := kernel,
    /// IE := 0, exception-mode := 1, SP swapped via the same IPR-write
    /// mechanism already in force for any PS write.
    fn switch_to_pal(state: &mut CpuState, pal_offset: u64, ipl_override: Option<u8>) -> VirtAddr {
        let old_ps = state.read_ipr(ipr::PS);
        let mut new_ps = old_ps & !ps::MODE_MASK & !ps::IE;
        new_ps |= ps::EXCEPTION_MODE;
        if let Some(ipl) = ipl_override {
            new_ps = ps::with_ipl(new_ps, ipl);
        }
        state.write_ipr(ipr::PS, new_ps);
        state.pal_base() + pal_offset
    }

    /// REI: pop the frame, restore PS (swapping SP via the
    /// same mechanism as any PS write), then redispatch the highest-
    /// priority pending event the restored PS re-enables, if any.
    ///
    /// Only PS and PC are hardware-restored; R16-R21/R26/R27/FPCR are
    /// recorded in the frame for PALcode's own use as scratch space during
    /// entry and are not auto-restored here, matching the real
    /// architecture's division of labor between hardware entry/exit and
    /// PALcode-managed context save/restore.
    pub fn rei(state: &mut CpuState, pending: &mut PendingEvents) -> Delivery {
        let frame = match state.stack.pop() {
            Some(frame) => frame,
            None => return Self::escalate_double_fault(state),
        };
        state.write_ipr(ipr::PS, frame.ps_at_fault);
        match Self::poll_pending(state, pending) {
            Some(event) => Self::deliver(state, event, frame.faulting_pc),
            None => Delivery::Resumed { pc: frame.faulting_pc },
        }
    }
}
