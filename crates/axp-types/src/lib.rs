//! Shared primitive types for the Alpha AXP execution engine.
//!
//! Kept dependency-free so every other crate in the workspace can sit on top
//! of it without pulling in unrelated machinery.

use std::fmt;

/// A physical (post-translation) address.
pub type PhysAddr = u64;

/// A virtual (program-visible) address.
pub type VirtAddr = u64;

/// Alpha pages are 8 KiB (2^13 bytes) on the canonical implementations this
/// engine targets. Some later implementations support larger page sizes, but
/// nothing in this crate depends on that, so it is left as a single constant
/// rather than a per-CPU knob.
pub const PAGE_SHIFT: u32 = 13;
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;
pub const PAGE_MASK: u64 = PAGE_SIZE - 1;

/// Default cache line size shared by the I-cache and the write-back data
/// cache hierarchy.
pub const CACHE_LINE_SIZE: usize = 64;
pub const CACHE_LINE_SHIFT: u32 = 6;

/// Extract the virtual page number from a virtual address.
#[inline]
pub const fn vpn(vaddr: VirtAddr) -> u64 {
    vaddr >> PAGE_SHIFT
}

/// Extract the in-page offset from a virtual (or physical) address.
#[inline]
pub const fn page_offset(addr: u64) -> u64 {
    addr & PAGE_MASK
}

/// Identifies one emulated CPU within a `System` (see `axp-system`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuId(pub u32);

impl CpuId {
    pub const BOOT: CpuId = CpuId(0);
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

impl From<u32> for CpuId {
    fn from(v: u32) -> Self {
        CpuId(v)
    }
}

/// Address Space Number tagging a TLB entry. `0` is reserved by convention
/// for kernel/PAL contexts that never get reused, but nothing in this crate
/// enforces that; it is purely an OS convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Asn(pub u16);

/// The four Alpha privilege modes, encoded in PS<CM> as a 2-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrivilegeMode {
    Kernel = 0,
    Executive = 1,
    Supervisor = 2,
    User = 3,
}

impl PrivilegeMode {
    pub const fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => PrivilegeMode::Kernel,
            1 => PrivilegeMode::Executive,
            2 => PrivilegeMode::Supervisor,
            _ => PrivilegeMode::User,
        }
    }

    pub const fn bits(self) -> u64 {
        self as u64
    }

    pub const fn is_kernel(self) -> bool {
        matches!(self, PrivilegeMode::Kernel)
    }
}

/// What kind of access a memory operation is performing; used both by the
/// TLB permission check and by cache coherency bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    Execute,
}

/// Access sizes the memory subsystem understands natively. Unaligned access
/// is handled a byte at a time by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSize {
    Byte = 1,
    Word = 2,
    Long = 4,
    Quad = 8,
}

impl AccessSize {
    pub const fn bytes(self) -> u64 {
        self as u64
    }

    pub const fn is_aligned(self, addr: VirtAddr) -> bool {
        addr & (self.bytes() - 1) == 0
    }
}
