use axp_mem::{MemoryBus, PagePerm};
use axp_types::{AccessKind, PhysAddr, VirtAddr, PAGE_SHIFT};

use crate::fault::TlbFault;

/// Bits-per-level of the canonical 3-level Alpha PALcode page table: each
/// level is one 8-KiB page of 1024 8-byte PTEs (10 bits of index), for a
/// 43-bit virtual address space (`10 + 10 + 10 + 13`).
const LEVEL_BITS: u32 = 10;
const PTES_PER_LEVEL: u64 = 1 << LEVEL_BITS;
const LEVEL_MASK: u64 = PTES_PER_LEVEL - 1;

const PTE_VALID: u64 = 1 << 0;
const PTE_FOE: u64 = 1 << 5; // fault on execute
const PTE_FOW: u64 = 1 << 6; // fault on write
const PTE_FOR: u64 = 1 << 7; // fault on read
const PFN_SHIFT: u32 = 32;

/// A single page-table entry, decoded from its packed `u64` wire form.
#[derive(Debug, Clone, Copy)]
struct Pte {
    raw: u64,
}

impl Pte {
    fn is_valid(self) -> bool {
        self.raw & PTE_VALID != 0
    }

    fn pfn(self) -> u64 {
        self.raw >> PFN_SHIFT
    }

    fn perm(self) -> PagePerm {
        let mut perm = PagePerm::all();
        if self.raw & PTE_FOR != 0 {
            perm.remove(PagePerm::READ);
        }
        if self.raw & PTE_FOW != 0 {
            perm.remove(PagePerm::WRITE);
        }
        if self.raw & PTE_FOE != 0 {
            perm.remove(PagePerm::EXECUTE);
        }
        perm
    }
}

/// Walks the 3-level PALcode page table rooted at `ptbr`.
pub struct PageTableWalker;

impl PageTableWalker {
    /// Returns the resolved PPN and page permission, or the deepest fault
    /// encountered (with the 0-indexed level it occurred at).
    pub fn walk(
        bus: &MemoryBus,
        ptbr: PhysAddr,
        vaddr: VirtAddr,
        access: AccessKind,
    ) -> Result<(u64, PagePerm), TlbFault> {
        let vpn = vaddr >> PAGE_SHIFT;
        let l3_index = vpn & LEVEL_MASK;
        let l2_index = (vpn >> LEVEL_BITS) & LEVEL_MASK;
        let l1_index = (vpn >> (2 * LEVEL_BITS)) & LEVEL_MASK;

        let l1_entry = Self::fetch_pte(bus, ptbr, l1_index);
        if !l1_entry.is_valid() {
            return Err(TlbFault::PageFault { vaddr, level: 1 });
        }

        let l2_table = l1_entry.pfn() << PAGE_SHIFT;
        let l2_entry = Self::fetch_pte(bus, l2_table, l2_index);
        if !l2_entry.is_valid() {
            return Err(TlbFault::PageFault { vaddr, level: 2 });
        }

        let l3_table = l2_entry.pfn() << PAGE_SHIFT;
        let l3_entry = Self::fetch_pte(bus, l3_table, l3_index);
        if !l3_entry.is_valid() {
            return Err(TlbFault::PageFault { vaddr, level: 3 });
        }

        let perm = l3_entry.perm();
        let requested = match access {
            AccessKind::Read => PagePerm::READ,
            AccessKind::Write => PagePerm::WRITE,
            AccessKind::Execute => PagePerm::EXECUTE,
        };
        if !perm.contains(requested) {
            return Err(match access {
                AccessKind::Write => TlbFault::WriteProtectionFault { vaddr },
                AccessKind::Execute => TlbFault::ExecuteProtectionFault { vaddr },
                AccessKind::Read => TlbFault::ProtectionFault { vaddr },
            });
        }

        Ok((l3_entry.pfn(), perm))
    }

    fn fetch_pte(bus: &MemoryBus, table_base: PhysAddr, index: u64) -> Pte {
        let addr = table_base + index * 8;
        Pte { raw: bus.ram().read_u64(addr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axp_mem::PhysicalMemory;
    use std::sync::Arc;

    fn make_pte(pfn: u64, flags: u64) -> u64 {
        (pfn << PFN_SHIFT) | PTE_VALID | flags
    }

    #[test]
    fn three_level_walk_resolves_a_mapped_page() {
        let ram = Arc::new(PhysicalMemory::new(0x100000).unwrap());
        let bus = MemoryBus::new(ram);

        let l1_base = 0x2000u64;
        let l2_base = 0x4000u64;
        let l3_base = 0x6000u64;
        let data_pfn = 0x10u64;

        bus.ram().write_u64(l1_base, make_pte(l2_base >> PAGE_SHIFT, 0));
        bus.ram().write_u64(l2_base, make_pte(l3_base >> PAGE_SHIFT, 0));
        bus.ram().write_u64(l3_base, make_pte(data_pfn, 0));

        let (ppn, perm) = PageTableWalker::walk(&bus, l1_base, 0, AccessKind::Read).unwrap();
        assert_eq!(ppn, data_pfn);
        assert!(perm.contains(PagePerm::READ));
    }

    #[test]
    fn missing_level1_entry_faults_at_level_1() {
        let ram = Arc::new(PhysicalMemory::new(0x10000).unwrap());
        let bus = MemoryBus::new(ram);
        let err = PageTableWalker::walk(&bus, 0x1000, 0, AccessKind::Read).unwrap_err();
        assert_eq!(err, TlbFault::PageFault { vaddr: 0, level: 1 });
    }

    #[test]
    fn write_to_fault_on_write_page_is_rejected() {
        let ram = Arc::new(PhysicalMemory::new(0x100000).unwrap());
        let bus = MemoryBus::new(ram);
        let l1_base = 0x2000u64;
        let l2_base = 0x4000u64;
        let l3_base = 0x6000u64;

        bus.ram().write_u64(l1_base, make_pte(l2_base >> PAGE_SHIFT, 0));
        bus.ram().write_u64(l2_base, make_pte(l3_base >> PAGE_SHIFT, 0));
        bus.ram().write_u64(l3_base, make_pte(0x10, PTE_FOW));

        let err = PageTableWalker::walk(&bus, l1_base, 0, AccessKind::Write).unwrap_err();
        assert_eq!(err, TlbFault::WriteProtectionFault { vaddr: 0 });
    }
}
