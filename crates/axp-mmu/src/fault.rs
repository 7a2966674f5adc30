use axp_types::VirtAddr;

/// The nine translation fault kinds named here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TlbFault {
    #[error("no valid translation for {vaddr:#x}")]
    InvalidEntry { vaddr: VirtAddr },
    #[error("protection fault at {vaddr:#x}")]
    ProtectionFault { vaddr: VirtAddr },
    #[error("alignment fault at {vaddr:#x}")]
    AlignmentFault { vaddr: VirtAddr },
    #[error("page fault at {vaddr:#x}, level {level}")]
    PageFault { vaddr: VirtAddr, level: u8 },
    #[error("access violation at {vaddr:#x}")]
    AccessViolation { vaddr: VirtAddr },
    #[error("translation not valid at {vaddr:#x}")]
    TranslationNotValid { vaddr: VirtAddr },
    #[error("privilege violation at {vaddr:#x}")]
    PrivilegeViolation { vaddr: VirtAddr },
    #[error("write-protection fault at {vaddr:#x}")]
    WriteProtectionFault { vaddr: VirtAddr },
    #[error("execute-protection fault at {vaddr:#x}")]
    ExecuteProtectionFault { vaddr: VirtAddr },
}

impl TlbFault {
    pub fn vaddr(&self) -> VirtAddr {
        match *self {
            TlbFault::InvalidEntry { vaddr }
            | TlbFault::ProtectionFault { vaddr }
            | TlbFault::AlignmentFault { vaddr }
            | TlbFault::PageFault { vaddr, .. }
            | TlbFault::AccessViolation { vaddr }
            | TlbFault::TranslationNotValid { vaddr }
            | TlbFault::PrivilegeViolation { vaddr }
            | TlbFault::WriteProtectionFault { vaddr }
            | TlbFault::ExecuteProtectionFault { vaddr } => vaddr,
        }
    }
}

/// this crate's `TranslationResult`, grounded in
/// `original_source/AEJ/TranslationResult.h`'s hit/fault factory pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationOutcome {
    result: Result<u64, TlbFault>,
}

impl TranslationOutcome {
    pub fn hit(paddr: u64) -> Self {
        Self { result: Ok(paddr) }
    }

    pub fn fault(fault: TlbFault) -> Self {
        Self { result: Err(fault) }
    }

    pub fn into_result(self) -> Result<u64, TlbFault> {
        self.result
    }

    pub fn is_hit(&self) -> bool {
        self.result.is_ok()
    }
}
