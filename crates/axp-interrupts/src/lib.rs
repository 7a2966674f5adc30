//! Per-CPU pending-event queue feeding `ExceptionEngine`:
//! at most one outstanding synchronous fault, plus priority-ordered
//! asynchronous events (machine check, external interrupt by IPL, AST by
//! mode).

use axp_constants::MachineCheckType;
use axp_types::{PrivilegeMode, VirtAddr};

/// A fault raised by the instruction just executed: memory, FP, decode, or
/// an explicit raise. Built by the caller from
/// `axp_constants::pal`/`exc_sum` so this crate carries no fault taxonomy
/// of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynchronousFault {
    pub pal_offset: u64,
    pub exc_sum: u64,
    pub pc: VirtAddr,
}

/// One drained event, in the order `PendingEvents::next_event` produces
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingEvent {
    Synchronous(SynchronousFault),
    MachineCheck(MachineCheckType),
    ExternalInterrupt { ipl: u8 },
    Ast { mode: PrivilegeMode },
}

/// Accumulates events raised between instruction boundaries and drains them
/// in priority order on `ExceptionEngine::step`. IPL levels collapse into a
/// 32-bit pending mask (real Alpha hardware treats same-level interrupts as
/// a single pending condition, not a queue); AST requests collapse into a
/// 4-bit per-mode mask the same way.
#[derive(Debug, Default, Clone)]
pub struct PendingEvents {
    synchronous: Option<SynchronousFault>,
    machine_check: Option<MachineCheckType>,
    external_ipl_mask: u32,
    ast_mode_mask: u8,
    /// Instructions remaining during which external interrupts (not
    /// synchronous faults or machine checks) stay masked, set by a block
    /// whose `CompiledBlockMeta::inhibit_interrupts_after_block` asked for
    /// one more precise instruction boundary before the next interrupt can
    /// land.
    interrupt_shadow: u32,
}

fn mode_bit(mode: PrivilegeMode) -> u8 {
    1 << mode.bits() as u8
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any prior unconsumed fault. This models at most one
    /// outstanding synchronous fault per instruction boundary; a second
    /// raise before the first is drained indicates the caller failed to
    /// drain after the previous instruction, which this replaces rather
    /// than queues.
    pub fn raise_synchronous_fault(&mut self, fault: SynchronousFault) {
        self.synchronous = Some(fault);
    }

    pub fn has_synchronous_fault(&self) -> bool {
        self.synchronous.is_some()
    }

    /// Raises a machine check, escalating to the more severe of any
    /// already-pending one.
    pub fn raise_machine_check(&mut self, kind: MachineCheckType) {
        self.machine_check = Some(match self.machine_check {
            Some(existing) if existing.severity() >= kind.severity() => existing,
            _ => kind,
        });
    }

    pub fn has_machine_check(&self) -> bool {
        self.machine_check.is_some()
    }

    pub fn raise_external_interrupt(&mut self, ipl: u8) {
        debug_assert!(ipl < 32, "IPL is a 5-bit field");
        self.external_ipl_mask |= 1 << (ipl & 0x1F);
    }

    pub fn clear_external_interrupt(&mut self, ipl: u8) {
        self.external_ipl_mask &= !(1 << (ipl & 0x1F));
    }

    pub fn highest_pending_external_ipl(&self) -> Option<u8> {
        if self.external_ipl_mask == 0 {
            None
        } else {
            Some(31 - self.external_ipl_mask.leading_zeros() as u8)
        }
    }

    pub fn raise_ast(&mut self, mode: PrivilegeMode) {
        self.ast_mode_mask |= mode_bit(mode);
    }

    pub fn has_ast_for(&self, mode: PrivilegeMode) -> bool {
        self.ast_mode_mask & mode_bit(mode) != 0
    }

    /// Opens (or extends) an interrupt shadow lasting `instructions` more
    /// retirements.
    pub fn begin_interrupt_shadow(&mut self, instructions: u32) {
        self.interrupt_shadow = self.interrupt_shadow.max(instructions);
    }

    /// Ages the shadow by the instructions a block just retired. A no-op
    /// once the shadow has fully decayed.
    pub fn age_interrupt_shadow(&mut self, retired: u64) {
        self.interrupt_shadow = self.interrupt_shadow.saturating_sub(retired.min(u32::MAX as u64) as u32);
    }

    pub fn interrupt_shadow_active(&self) -> bool {
        self.interrupt_shadow > 0
    }

    pub fn is_empty(&self) -> bool {
        self.synchronous.is_none()
            && self.machine_check.is_none()
            && self.external_ipl_mask == 0
            && self.ast_mode_mask == 0
    }

    /// Drains the highest-priority outstanding event, or `None` if nothing
    /// is both pending and currently unmasked.
    ///
    /// Priority, highest first: synchronous fault from the instruction just
    /// retired, machine check, external interrupt above `current_ipl` (only
    /// when `ie_enabled`), AST for a mode set in `ast_enabled_mask` (only
    /// when `ie_enabled`). Kernel mode's AST bit is the low bit of
    /// `ast_enabled_mask`, matching `PrivilegeMode::Kernel as u64 == 0`, so
    /// a kernel-mode AST is serviced ahead of an outer-mode one when both
    /// are pending and enabled.
    pub fn next_event(&mut self, ie_enabled: bool, current_ipl: u8, ast_enabled_mask: u8) -> Option<PendingEvent> {
        if let Some(fault) = self.synchronous.take() {
            return Some(PendingEvent::Synchronous(fault));
        }
        if let Some(kind) = self.machine_check.take() {
            return Some(PendingEvent::MachineCheck(kind));
        }
        if !ie_enabled {
            return None;
        }
        if !self.interrupt_shadow_active() {
            if let Some(ipl) = self.highest_pending_external_ipl() {
                if ipl > current_ipl {
                    self.clear_external_interrupt(ipl);
                    return Some(PendingEvent::ExternalInterrupt { ipl });
                }
            }
        }
        let runnable = self.ast_mode_mask & ast_enabled_mask;
        if runnable != 0 {
            let bit = runnable.trailing_zeros() as u8;
            self.ast_mode_mask &= !(1 << bit);
            return Some(PendingEvent::Ast { mode: PrivilegeMode::from_bits(bit as u64) });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault(offset: u64) -> SynchronousFault {
        SynchronousFault { pal_offset: offset, exc_sum: 0, pc: 0 }
    }

    #[test]
    fn synchronous_fault_takes_priority_over_everything_else() {
        let mut pending = PendingEvents::new();
        pending.raise_external_interrupt(20);
        pending.raise_ast(PrivilegeMode::Kernel);
        pending.raise_machine_check(MachineCheckType::BusError);
        pending.raise_synchronous_fault(fault(0x600));

        assert_eq!(pending.next_event(true, 0, 0xF), Some(PendingEvent::Synchronous(fault(0x600))));
    }

    #[test]
    fn machine_check_outranks_external_interrupt_and_ast() {
        let mut pending = PendingEvents::new();
        pending.raise_external_interrupt(31);
        pending.raise_ast(PrivilegeMode::Kernel);
        pending.raise_machine_check(MachineCheckType::MemoryEccError);

        assert_eq!(
            pending.next_event(true, 0, 0xF),
            Some(PendingEvent::MachineCheck(MachineCheckType::MemoryEccError))
        );
    }

    #[test]
    fn machine_check_escalates_to_worse_severity_and_does_not_downgrade() {
        let mut pending = PendingEvents::new();
        pending.raise_machine_check(MachineCheckType::ThermalError);
        pending.raise_machine_check(MachineCheckType::DoubleMachineCheck);
        assert_eq!(pending.next_event(true, 0, 0), Some(PendingEvent::MachineCheck(MachineCheckType::DoubleMachineCheck)));

        pending.raise_machine_check(MachineCheckType::DoubleMachineCheck);
        pending.raise_machine_check(MachineCheckType::ThermalError);
        assert_eq!(pending.next_event(true, 0, 0), Some(PendingEvent::MachineCheck(MachineCheckType::DoubleMachineCheck)));
    }

    #[test]
    fn external_interrupt_only_fires_above_current_ipl_and_when_enabled() {
        let mut pending = PendingEvents::new();
        pending.raise_external_interrupt(10);

        assert_eq!(pending.next_event(true, 10, 0), None, "not above current IPL");
        assert_eq!(pending.next_event(false, 0, 0), None, "IE disabled");
        assert_eq!(pending.next_event(true, 0, 0), Some(PendingEvent::ExternalInterrupt { ipl: 10 }));
        assert!(pending.highest_pending_external_ipl().is_none());
    }

    #[test]
    fn interrupt_shadow_masks_external_interrupt_but_not_synchronous_fault() {
        let mut pending = PendingEvents::new();
        pending.begin_interrupt_shadow(2);
        pending.raise_external_interrupt(10);

        assert_eq!(pending.next_event(true, 0, 0), None, "shadow still active");
        pending.age_interrupt_shadow(1);
        assert_eq!(pending.next_event(true, 0, 0), None, "one instruction retired, still active");
        pending.age_interrupt_shadow(1);
        assert_eq!(pending.next_event(true, 0, 0), Some(PendingEvent::ExternalInterrupt { ipl: 10 }));

        pending.begin_interrupt_shadow(10);
        pending.raise_synchronous_fault(fault(0x300));
        assert_eq!(pending.next_event(true, 0, 0), Some(PendingEvent::Synchronous(fault(0x300))), "faults bypass the shadow");
    }

    #[test]
    fn higher_ipl_wins_when_multiple_levels_pending() {
        let mut pending = PendingEvents::new();
        pending.raise_external_interrupt(4);
        pending.raise_external_interrupt(19);
        assert_eq!(pending.next_event(true, 0, 0), Some(PendingEvent::ExternalInterrupt { ipl: 19 }));
        assert_eq!(pending.next_event(true, 0, 0), Some(PendingEvent::ExternalInterrupt { ipl: 4 }));
    }

    #[test]
    fn ast_only_fires_when_masked_in_and_kernel_mode_wins_ties() {
        let mut pending = PendingEvents::new();
        pending.raise_ast(PrivilegeMode::User);
        pending.raise_ast(PrivilegeMode::Kernel);

        assert_eq!(pending.next_event(true, 0, 0), None, "nothing enabled");
        assert_eq!(
            pending.next_event(true, 0, mode_bit(PrivilegeMode::Kernel) | mode_bit(PrivilegeMode::User)),
            Some(PendingEvent::Ast { mode: PrivilegeMode::Kernel })
        );
        assert_eq!(
            pending.next_event(true, 0, mode_bit(PrivilegeMode::Kernel) | mode_bit(PrivilegeMode::User)),
            Some(PendingEvent::Ast { mode: PrivilegeMode::User })
        );
    }

    #[test]
    fn is_empty_reflects_all_channels() {
        let mut pending = PendingEvents::new();
        assert!(pending.is_empty());
        pending.raise_ast(PrivilegeMode::Supervisor);
        assert!(!pending.is_empty());
    }
}
