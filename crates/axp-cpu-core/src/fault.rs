use axp_constants::{exc_sum, pal};
use axp_mmu::TlbFault;
use axp_types::VirtAddr;

/// A fault taxonomy unified across translation/arithmetic/FP/decode/PAL
/// faults so `ExecutionEngine`'s main loop has a single `Result<T,
/// Fault>` to match against before handing off to `ExceptionEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error(transparent)]
    Translation(#[from] TlbFault),
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("floating-point invalid operation")]
    FpInvalid,
    #[error("floating-point divide by zero")]
    FpDivideByZero,
    #[error("floating-point overflow")]
    FpOverflow,
    #[error("floating-point underflow")]
    FpUnderflow,
    #[error("floating-point inexact result")]
    FpInexact,
    #[error("illegal opcode at {pc:#x}")]
    IllegalOpcode { pc: VirtAddr },
    #[error("reserved operand at {pc:#x}")]
    ReservedOperand { pc: VirtAddr },
    #[error("CALL_PAL from insufficient privilege at {pc:#x}")]
    PalPrivilegeViolation { pc: VirtAddr },
}

impl Fault {
    /// Maps this fault to its PAL entry-vector offset via a fixed table.
    pub fn pal_offset(self) -> u64 {
        match self {
            Fault::Translation(t) => match t {
                TlbFault::AccessViolation { .. } => pal::ACCESS_VIOLATION,
                TlbFault::ProtectionFault { .. }
                | TlbFault::WriteProtectionFault { .. }
                | TlbFault::ExecuteProtectionFault { .. } => pal::ACCESS_VIOLATION,
                TlbFault::AlignmentFault { .. } => pal::ALIGNMENT_FAULT,
                TlbFault::PageFault { .. } => pal::PAGE_FAULT,
                TlbFault::InvalidEntry { .. } | TlbFault::TranslationNotValid { .. } => pal::PAGE_FAULT,
                TlbFault::PrivilegeViolation { .. } => pal::ACCESS_VIOLATION,
            },
            Fault::IntegerOverflow | Fault::IntegerDivideByZero => pal::ARITHMETIC_TRAP,
            Fault::FpInvalid | Fault::FpDivideByZero | Fault::FpOverflow | Fault::FpUnderflow | Fault::FpInexact => {
                pal::FP_EXCEPTION
            }
            Fault::IllegalOpcode { .. } | Fault::ReservedOperand { .. } => pal::ILLEGAL_INSTR,
            Fault::PalPrivilegeViolation { .. } => pal::ACCESS_VIOLATION,
        }
    }

    /// The exception-summary bitmap set in the pushed frame.
    pub fn exc_sum_bits(self) -> u64 {
        match self {
            Fault::Translation(t) => match t {
                TlbFault::AccessViolation { .. }
                | TlbFault::ProtectionFault { .. }
                | TlbFault::WriteProtectionFault { .. }
                | TlbFault::ExecuteProtectionFault { .. }
                | TlbFault::PrivilegeViolation { .. } => exc_sum::ACCESS_VIOLATION,
                TlbFault::AlignmentFault { .. } => exc_sum::ALIGNMENT,
                TlbFault::PageFault { .. } | TlbFault::InvalidEntry { .. } | TlbFault::TranslationNotValid { .. } => {
                    exc_sum::TRANS_NOT_VALID
                }
            },
            Fault::IntegerOverflow | Fault::IntegerDivideByZero => exc_sum::ARITH_TRAP,
            Fault::FpInvalid | Fault::FpDivideByZero | Fault::FpOverflow | Fault::FpUnderflow | Fault::FpInexact => {
                exc_sum::FP_EXCEPTION
            }
            Fault::IllegalOpcode { .. } | Fault::ReservedOperand { .. } => exc_sum::ILLEGAL_INSTR,
            Fault::PalPrivilegeViolation { .. } => exc_sum::ACCESS_VIOLATION,
        }
    }

    /// The faulting PC to record in the exception frame. Translation faults
    /// carry the virtual address, not the PC, so the caller supplies it
    /// separately for those.
    pub fn pc_override(self) -> Option<VirtAddr> {
        match self {
            Fault::IllegalOpcode { pc } | Fault::ReservedOperand { pc } | Fault::PalPrivilegeViolation { pc } => {
                Some(pc)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_fault_maps_to_page_fault_vector() {
        let fault = Fault::Translation(TlbFault::PageFault { vaddr: 0, level: 2 });
        assert_eq!(fault.pal_offset(), pal::PAGE_FAULT);
        assert_eq!(fault.exc_sum_bits(), exc_sum::TRANS_NOT_VALID);
    }

    #[test]
    fn illegal_opcode_carries_its_own_pc() {
        let fault = Fault::IllegalOpcode { pc: 0x5000 };
        assert_eq!(fault.pc_override(), Some(0x5000));
        assert_eq!(fault.pal_offset(), pal::ILLEGAL_INSTR);
    }
}
