use std::sync::Arc;

use axp_cache::{DataCache, InstructionCache};
use axp_mem::{MemoryBus, PhysicalMemory};
use axp_mmu::{MemorySystem, TlbFault};
use axp_types::{Asn, PrivilegeMode};

const PFN_SHIFT: u32 = 32;
const PTE_VALID: u64 = 1;

fn make_pte(pfn: u64) -> u64 {
    (pfn << PFN_SHIFT) | PTE_VALID
}

fn mapped_system() -> (MemorySystem<MemoryBus>, MemoryBus) {
    let ram = Arc::new(PhysicalMemory::new(0x10_0000).unwrap());
    let bus = MemoryBus::new(ram);

    // Map vaddr 0 -> paddr 0x8000 through a trivial 3-level table. Table
    // addresses must be page-aligned (8 KiB) since the walker reconstructs
    // them from a shifted PFN.
    let l1 = 0x2000u64;
    let l2 = 0x4000u64;
    let l3 = 0x6000u64;
    let data_pfn = 0x8000u64 >> 13;
    bus.ram().write_u64(l1, make_pte(l2 >> 13));
    bus.ram().write_u64(l2, make_pte(l3 >> 13));
    bus.ram().write_u64(l3, make_pte(data_pfn));

    let l1d = DataCache::new(8, 2, bus.clone());
    let icache = InstructionCache::new(8, 2, bus.clone());
    let mut sys = MemorySystem::new(16, l1d, icache, bus.clone());
    sys.set_ptbr(l1);
    (sys, bus)
}

#[test]
fn read_and_write_virtual_round_trip_through_translation() {
    let (mut sys, _bus) = mapped_system();

    sys.write_virtual(Asn(0), 0x10, 8, PrivilegeMode::Kernel, &[0x42; 8]).unwrap();
    let mut out = [0u8; 8];
    sys.read_virtual(Asn(0), 0x10, 8, PrivilegeMode::Kernel, &mut out).unwrap();
    assert_eq!(out, [0x42; 8]);
}

#[test]
fn misaligned_access_raises_alignment_fault() {
    let (mut sys, _bus) = mapped_system();
    let mut out = [0u8; 8];
    let err = sys.read_virtual(Asn(0), 0x11, 8, PrivilegeMode::Kernel, &mut out).unwrap_err();
    assert_eq!(err, TlbFault::AlignmentFault { vaddr: 0x11 });
}

#[test]
fn unmapped_page_raises_page_fault() {
    let (mut sys, _bus) = mapped_system();
    let mut out = [0u8; 8];
    let err = sys.read_virtual(Asn(0), 0x20_0000, 8, PrivilegeMode::Kernel, &mut out).unwrap_err();
    assert!(matches!(err, TlbFault::PageFault { level: 1, .. }));
}

#[test]
fn user_mode_cannot_reference_kernel_segment() {
    let (mut sys, _bus) = mapped_system();
    let mut out = [0u8; 8];
    let err = sys
        .read_virtual(Asn(0), 0xFFFF_FFFF_0000_0000, 8, PrivilegeMode::User, &mut out)
        .unwrap_err();
    assert_eq!(err, TlbFault::PrivilegeViolation { vaddr: 0xFFFF_FFFF_0000_0000 });
}

#[test]
fn fetch_instruction_resolves_through_icache() {
    let (mut sys, bus) = mapped_system();
    bus.ram().write_u32(0x8000, 0x47FF_041F);
    let word = sys.fetch_instruction(Asn(0), 0, PrivilegeMode::Kernel).unwrap();
    assert_eq!(word, 0x47FF_041F);
}
