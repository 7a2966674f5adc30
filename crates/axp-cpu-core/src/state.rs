use axp_constants::ipr;
use axp_types::{Asn, PhysAddr, PrivilegeMode};

use crate::ipr::{IprBank, IprWriteOutcome, TlbTrigger};
use crate::registers::RegisterFile;
use crate::stack::StackManager;

/// The IPR outcomes `CpuState` cannot fully apply itself, because they name
/// an operation on `MemorySystem` or `axp-perf` rather than CPU-local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalIprEffect {
    TlbTrigger { trigger: TlbTrigger, value: u64 },
    PtbrChanged { new: PhysAddr },
    PerfmonConfigChanged { slot: u16, value: u64 },
}

fn sp_slot(mode: PrivilegeMode) -> u16 {
    match mode {
        PrivilegeMode::Kernel => ipr::KSP,
        PrivilegeMode::Executive => ipr::ESP,
        PrivilegeMode::Supervisor => ipr::SSP,
        PrivilegeMode::User => ipr::USP,
    }
}

/// Per-CPU architectural state: registers, IPRs, exception stack, and the
/// handful of fields whose IPR slot doubles as the
/// authoritative storage (ASN, PAL_BASE, FEN) or mirrors it for convenience
/// (current mode, derived from PS).
pub struct CpuState {
    pub registers: RegisterFile,
    iprs: IprBank,
    pub stack: StackManager,
    mode: PrivilegeMode,
    asn: Asn,
    ptbr: PhysAddr,
    fp_enabled: bool,
    pal_base: u64,
}

impl Default for CpuState {
    fn default() -> Self {
        Self {
            registers: RegisterFile::new(),
            iprs: IprBank::new(),
            stack: StackManager::with_default_capacity(),
            mode: PrivilegeMode::Kernel,
            asn: Asn(0),
            ptbr: 0,
            fp_enabled: false,
            pal_base: 0,
        }
    }
}

impl CpuState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> PrivilegeMode {
        self.mode
    }

    pub fn asn(&self) -> Asn {
        self.asn
    }

    pub fn ptbr(&self) -> PhysAddr {
        self.ptbr
    }

    pub fn fp_enabled(&self) -> bool {
        self.fp_enabled
    }

    pub fn pal_base(&self) -> u64 {
        self.pal_base
    }

    pub fn read_ipr(&self, id: u16) -> u64 {
        self.iprs.read(id)
    }

    /// Applies the IPR write, handling mode-switch SP swap, ASN
    /// install, FEN/PAL_BASE storage locally, and returning whatever this
    /// struct alone cannot apply (TLB triggers, PTBR change, perfmon
    /// config) for the caller — which owns `MemorySystem`/`axp-perf` — to
    /// forward.
    pub fn write_ipr(&mut self, id: u16, value: u64) -> Option<ExternalIprEffect> {
        match self.iprs.write(id, value) {
            IprWriteOutcome::Stored | IprWriteOutcome::IplOrSirrChanged => None,
            IprWriteOutcome::TlbTrigger { trigger, value } => Some(ExternalIprEffect::TlbTrigger { trigger, value }),
            IprWriteOutcome::AsnChanged { new, .. } => {
                self.asn = Asn(new as u16);
                None
            }
            IprWriteOutcome::PsChanged { old, new } => {
                self.apply_mode_switch(old, new);
                None
            }
            IprWriteOutcome::FenChanged { enabled } => {
                self.fp_enabled = enabled;
                None
            }
            IprWriteOutcome::PalBaseChanged { new_base } => {
                self.pal_base = new_base;
                None
            }
            IprWriteOutcome::PtbrChanged { new } => {
                self.ptbr = new;
                Some(ExternalIprEffect::PtbrChanged { new })
            }
            IprWriteOutcome::PerfmonConfigChanged { slot, value } => {
                Some(ExternalIprEffect::PerfmonConfigChanged { slot, value })
            }
        }
    }

    /// after REI, the restored PS's mode determines
    /// which of USP/SSP/ESP/KSP becomes R30, and the outgoing mode's SP is
    /// saved to its own slot first.
    fn apply_mode_switch(&mut self, old_ps: u64, new_ps: u64) {
        let old_mode = PrivilegeMode::from_bits(old_ps);
        let new_mode = PrivilegeMode::from_bits(new_ps);
        if old_mode == new_mode {
            return;
        }
        self.iprs.write_raw(sp_slot(old_mode), self.registers.read_int(30));
        self.mode = new_mode;
        let new_sp = self.iprs.read(sp_slot(new_mode));
        self.registers.write_int(30, new_sp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ps_write_swaps_stack_pointer_between_modes() {
        let mut cpu = CpuState::new();
        cpu.write_ipr(ipr::KSP, 0x9000);
        cpu.registers.write_int(30, 0x9000);

        cpu.write_ipr(ipr::USP, 0x1000);
        let effect = cpu.write_ipr(ipr::PS, PrivilegeMode::User.bits());
        assert!(effect.is_none());

        assert_eq!(cpu.mode(), PrivilegeMode::User);
        assert_eq!(cpu.registers.read_int(30), 0x1000);
        assert_eq!(cpu.read_ipr(ipr::KSP), 0x9000, "outgoing kernel SP saved");
    }

    #[test]
    fn ptbr_write_is_stored_locally_and_surfaced_for_the_mmu() {
        let mut cpu = CpuState::new();
        let effect = cpu.write_ipr(ipr::PTBR, 0x4000);
        assert_eq!(effect, Some(ExternalIprEffect::PtbrChanged { new: 0x4000 }));
        assert_eq!(cpu.ptbr(), 0x4000);
    }

    #[test]
    fn tlb_trigger_is_surfaced_without_changing_local_state() {
        let mut cpu = CpuState::new();
        let effect = cpu.write_ipr(ipr::TBIA, 0);
        assert_eq!(
            effect,
            Some(ExternalIprEffect::TlbTrigger { trigger: TlbTrigger::InvalidateAll, value: 0 })
        );
    }

    #[test]
    fn asn_write_updates_asn_with_no_external_effect() {
        let mut cpu = CpuState::new();
        assert!(cpu.write_ipr(ipr::ASN, 42).is_none());
        assert_eq!(cpu.asn(), Asn(42));
    }
}
