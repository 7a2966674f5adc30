//! PAL entry-vector offsets, relative to `PAL_BASE`.

pub const MACHINE_CHECK: u64 = 0x200;
pub const ALIGNMENT_FAULT: u64 = 0x280;
pub const ILLEGAL_INSTR: u64 = 0x300;
pub const INTERRUPT: u64 = 0x400;
pub const AST: u64 = 0x480;
pub const ARITHMETIC_TRAP: u64 = 0x500;
pub const FP_EXCEPTION: u64 = 0x580;
pub const PAGE_FAULT: u64 = 0x600;
pub const ACCESS_VIOLATION: u64 = 0x680;
pub const UNKNOWN: u64 = 0x700;

/// Base of the CALL_PAL function-indexed dispatch region, entries spaced
/// `0x40` apart (`target = PAL_BASE + CALL_PAL_TABLE + function * 0x40`).
///
/// `original_source` emulates individual CALL_PAL functions (REI, MTPR,
/// MFPR, TBI*) as native handlers rather than jumping into loaded PALcode
/// for them, so no concrete function-to-offset formula is load-bearing
/// there either. This value just needs to sit past the fixed fault/
/// interrupt/AST vectors above so no CALL_PAL entry aliases one of them.
pub const CALL_PAL_TABLE: u64 = 0x2000;
