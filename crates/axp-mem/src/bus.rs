use std::sync::{Arc, RwLock};

use axp_types::PhysAddr;

use crate::mmio::{MmioDispatch, MmioHandler, MmioMapError};
use crate::physical::PhysicalMemory;
use crate::MemError;

/// Physical-address-level bus combining backing RAM with the MMIO
/// dispatch table: "On access: find the unique containing
/// range...if none, fall through to the byte buffer."
///
/// Cheap to clone: RAM and the MMIO table are both shared, so every CPU
/// and every cache level in a `System` can hold its own `MemoryBus`.
#[derive(Clone)]
pub struct MemoryBus {
    ram: Arc<PhysicalMemory>,
    mmio: Arc<RwLock<MmioDispatch>>,
}

impl MemoryBus {
    pub fn new(ram: Arc<PhysicalMemory>) -> Self {
        Self { ram, mmio: Arc::new(RwLock::new(MmioDispatch::new())) }
    }

    pub fn ram(&self) -> &PhysicalMemory {
        &self.ram
    }

    pub fn map_mmio(
        &self,
        base: PhysAddr,
        len: u64,
        handler: Box<dyn MmioHandler>,
    ) -> Result<(), MmioMapError> {
        self.mmio.write().unwrap().map(base, len, handler)
    }

    pub fn unmap_mmio(&self, base: PhysAddr) {
        self.mmio.write().unwrap().unmap(base);
    }

    pub fn is_mmio(&self, addr: PhysAddr) -> bool {
        self.mmio.read().unwrap().contains(addr)
    }

    /// Bulk reads bypass the MMIO table: a caller doing a cache-line-sized
    /// or larger transfer is always talking to RAM (fills/writebacks), per
    /// the cache-to-backing-store path.
    pub fn try_read_bytes(&self, addr: PhysAddr, out: &mut [u8]) -> Result<(), MemError> {
        self.ram.try_read_bytes(addr, out)
    }

    pub fn try_write_bytes(&self, addr: PhysAddr, data: &[u8]) -> Result<(), MemError> {
        self.ram.try_write_bytes(addr, data)
    }
}

macro_rules! scalar_access {
    ($read:ident, $write:ident, $ty:ty) => {
        impl MemoryBus {
            pub fn $read(&self, addr: PhysAddr) -> $ty {
                if let Some(v) = self.mmio.read().unwrap().$read(addr) {
                    return v;
                }
                self.ram.$read(addr)
            }

            pub fn $write(&self, addr: PhysAddr, value: $ty) {
                if self.mmio.read().unwrap().$write(addr, value) {
                    return;
                }
                self.ram.$write(addr, value);
            }
        }
    };
}

scalar_access!(read_u8, write_u8, u8);
scalar_access!(read_u16, write_u16, u16);
scalar_access!(read_u32, write_u32, u32);
scalar_access!(read_u64, write_u64, u64);
