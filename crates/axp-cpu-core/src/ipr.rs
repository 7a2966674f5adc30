use axp_constants::ipr;

/// Which local TLB operation a trigger-slot write invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlbTrigger {
    InvalidateAll,
    InvalidateByAsn,
    InvalidateEntry,
    InvalidateDataEntry,
    InvalidateInstructionEntry,
}

/// What a write produced, for the caller to act on. Plain
/// data rather than a callback: several of these (notably `PsChanged`)
/// require the caller to issue further IPR writes of its own (the SP swap),
/// which a callback invoked from inside `IprBank::write` could not do
/// without re-borrowing the bank it is already inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IprWriteOutcome {
    Stored,
    /// The value was not stored; trigger slots are pure side effect.
    TlbTrigger { trigger: TlbTrigger, value: u64 },
    AsnChanged { old: u64, new: u64 },
    PsChanged { old: u64, new: u64 },
    IplOrSirrChanged,
    FenChanged { enabled: bool },
    PalBaseChanged { new_base: u64 },
    /// Not one of the named fan-out triggers, but the walker
    /// needs to learn of a new page-table root somehow; routing it through
    /// the PTBR IPR write (rather than a side channel) keeps the single
    /// "OS writes an IPR, engine reacts" mechanism already established for
    /// everything else.
    PtbrChanged { new: u64 },
    PerfmonConfigChanged { slot: u16, value: u64 },
}

/// 512-slot internal-processor-register array.
pub struct IprBank {
    slots: Vec<u64>,
}

impl Default for IprBank {
    fn default() -> Self {
        Self { slots: vec![0; ipr::IPR_COUNT] }
    }
}

impl IprBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, id: u16) -> u64 {
        self.slots[id as usize]
    }

    /// Stores directly with no outcome dispatch, for callers (e.g. the
    /// mode-switch SP swap) that already know a slot is a plain named
    /// stack-pointer register with no side effect of its own.
    pub fn write_raw(&mut self, id: u16, value: u64) {
        self.slots[id as usize] = value;
    }

    /// Stores (no-op if equal to current), then reports the side effect the
    /// caller must apply. Trigger slots never store.
    pub fn write(&mut self, id: u16, value: u64) -> IprWriteOutcome {
        if ipr::is_tlb_trigger(id) {
            let trigger = match id {
                ipr::TBIA => TlbTrigger::InvalidateAll,
                ipr::TBIAP => TlbTrigger::InvalidateByAsn,
                ipr::TBIS => TlbTrigger::InvalidateEntry,
                ipr::TBISD => TlbTrigger::InvalidateDataEntry,
                ipr::TBISI => TlbTrigger::InvalidateInstructionEntry,
                _ => unreachable!(),
            };
            return IprWriteOutcome::TlbTrigger { trigger, value };
        }

        let old = self.slots[id as usize];
        if old == value {
            return IprWriteOutcome::Stored;
        }
        self.slots[id as usize] = value;

        match id {
            ipr::ASN => IprWriteOutcome::AsnChanged { old, new: value },
            ipr::PS => IprWriteOutcome::PsChanged { old, new: value },
            ipr::IPL | ipr::SIRR => IprWriteOutcome::IplOrSirrChanged,
            ipr::FEN => IprWriteOutcome::FenChanged { enabled: value & 1 != 0 },
            ipr::PAL_BASE => IprWriteOutcome::PalBaseChanged { new_base: value },
            ipr::PTBR => IprWriteOutcome::PtbrChanged { new: value },
            slot if (ipr::PERFMON_BASE..ipr::PERFMON_BASE + ipr::PERFMON_COUNT).contains(&slot) => {
                IprWriteOutcome::PerfmonConfigChanged { slot, value }
            }
            _ => IprWriteOutcome::Stored,
        }
    }
}
