//! `PhysicalMemory` and `MMIODispatch`.

mod bus;
mod mmio;
mod perm;
mod physical;

pub use bus::MemoryBus;
pub use mmio::{MmioDispatch, MmioHandler, MmioMapError};
pub use perm::{PagePerm, PermFault, PhysPermissions};
pub use physical::{PhysicalMemory, PhysicalMemoryOptions};

use axp_types::PhysAddr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MemError {
    #[error("invalid chunk size {0}: must be a power of two")]
    InvalidChunkSize(usize),
    #[error("access at {addr:#x} of length {len:#x} out of range for {size:#x}-byte memory")]
    OutOfRange { addr: PhysAddr, len: u64, size: u64 },
}
