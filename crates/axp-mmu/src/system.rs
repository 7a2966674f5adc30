use axp_cache::{CacheBackend, DataCache, InstructionCache};
use axp_mem::{MemoryBus, PagePerm};
use axp_types::{Asn, PhysAddr, PrivilegeMode, VirtAddr};

use crate::fault::TlbFault;
use crate::tlb::{Tlb, TlbScope};
use crate::walker::PageTableWalker;

/// Kind of memory barrier `executeMemoryBarrier` enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierKind {
    Full,
    Write,
    Read,
}

/// Tracks LL/SC reservations across CPUs. Implemented by `axp-smp`'s
/// `SMPCoordinator`; kept as a trait here so `axp-mmu` does not depend on
/// `axp-smp`.
/// `Send + Sync` so a `Vcpu` holding one behind `Arc<dyn ReservationTracker>`
/// can itself be shared across CPU threads.
pub trait ReservationTracker: Send + Sync {
    fn register_reservation(&self, cpu: u32, paddr: PhysAddr, size: u8);
    fn check_and_clear_reservation(&self, cpu: u32, paddr: PhysAddr) -> bool;
    fn clear_reservation(&self, cpu: u32);
    /// A write by `writer_cpu` to `[paddr, paddr+size)` clears any other
    /// CPU's reservation whose range overlaps it.
    fn invalidate_overlapping(&self, writer_cpu: u32, paddr: PhysAddr, size: u8);
}

/// this crate's `MemorySystem`: the vaddr-level contract the CPU
/// core talks to. Owns this CPU's TLB and the shared cache hierarchy.
pub struct MemorySystem<Backend: CacheBackend> {
    tlb: Tlb,
    l1d: DataCache<Backend>,
    icache: InstructionCache<Backend>,
    bus: MemoryBus,
    ptbr: PhysAddr,
}

pub struct TranslateArgs {
    pub vaddr: VirtAddr,
    pub asn: Asn,
    pub access: axp_types::AccessKind,
    pub mode: PrivilegeMode,
}

impl<Backend: CacheBackend + Clone> MemorySystem<Backend> {
    pub fn new(tlb_capacity: usize, l1d: DataCache<Backend>, icache: InstructionCache<Backend>, bus: MemoryBus) -> Self {
        Self { tlb: Tlb::new(tlb_capacity), l1d, icache, bus, ptbr: 0 }
    }

    pub fn set_ptbr(&mut self, ptbr: PhysAddr) {
        self.ptbr = ptbr;
    }

    /// `Translate`: TLB lookup, falling back to the page-table
    /// walker on miss and installing the result.
    pub fn translate(&mut self, args: &TranslateArgs) -> Result<PhysAddr, TlbFault> {
        // Canonical Alpha kseg addresses have the top bit set; only kernel
        // mode may reference them.
        if !args.mode.is_kernel() && (args.vaddr as i64) < 0 {
            return Err(TlbFault::PrivilegeViolation { vaddr: args.vaddr });
        }

        let vpn = axp_types::vpn(args.vaddr);
        let scope = match args.access {
            axp_types::AccessKind::Execute => TlbScope::Instruction,
            _ => TlbScope::Data,
        };

        if let Some(entry) = self.tlb.lookup(vpn, args.asn, scope) {
            let requested = match args.access {
                axp_types::AccessKind::Read => PagePerm::READ,
                axp_types::AccessKind::Write => PagePerm::WRITE,
                axp_types::AccessKind::Execute => PagePerm::EXECUTE,
            };
            if !entry.perm.contains(requested) {
                return Err(match args.access {
                    axp_types::AccessKind::Write => TlbFault::WriteProtectionFault { vaddr: args.vaddr },
                    axp_types::AccessKind::Execute => TlbFault::ExecuteProtectionFault { vaddr: args.vaddr },
                    axp_types::AccessKind::Read => TlbFault::ProtectionFault { vaddr: args.vaddr },
                });
            }
            return Ok((entry.ppn << axp_types::PAGE_SHIFT) | axp_types::page_offset(args.vaddr));
        }

        let (ppn, perm) = PageTableWalker::walk(&self.bus, self.ptbr, args.vaddr, args.access)?;
        self.tlb.install(
            crate::entry::TlbEntry { vpn, asn: args.asn, ppn, global: false, perm },
            scope,
        );
        Ok((ppn << axp_types::PAGE_SHIFT) | axp_types::page_offset(args.vaddr))
    }

    /// Step 1: alignment check, except for explicit unaligned
    /// opcodes which the caller handles separately.
    fn check_alignment(vaddr: VirtAddr, size: u64) -> Result<(), TlbFault> {
        if vaddr & (size - 1) != 0 {
            return Err(TlbFault::AlignmentFault { vaddr });
        }
        Ok(())
    }

    pub fn read_virtual(
        &mut self,
        asn: Asn,
        vaddr: VirtAddr,
        size: u64,
        mode: PrivilegeMode,
        out: &mut [u8],
    ) -> Result<(), TlbFault> {
        Self::check_alignment(vaddr, size)?;
        let paddr = self.translate(&TranslateArgs { vaddr, asn, access: axp_types::AccessKind::Read, mode })?;
        if self.bus.is_mmio(paddr) {
            for (i, byte) in out.iter_mut().enumerate() {
                *byte = self.bus.read_u8(paddr + i as u64);
            }
        } else {
            self.l1d.read(paddr, out);
        }
        Ok(())
    }

    pub fn write_virtual(
        &mut self,
        asn: Asn,
        vaddr: VirtAddr,
        size: u64,
        mode: PrivilegeMode,
        data: &[u8],
    ) -> Result<(), TlbFault> {
        Self::check_alignment(vaddr, size)?;
        let paddr = self.translate(&TranslateArgs { vaddr, asn, access: axp_types::AccessKind::Write, mode })?;
        if self.bus.is_mmio(paddr) {
            for (i, byte) in data.iter().enumerate() {
                self.bus.write_u8(paddr + i as u64, *byte);
            }
        } else {
            self.l1d.write(paddr, data);
        }
        Ok(())
    }

    pub fn fetch_instruction(&mut self, asn: Asn, vaddr: VirtAddr, mode: PrivilegeMode) -> Result<u32, TlbFault> {
        let paddr = self.translate(&TranslateArgs { vaddr, asn, access: axp_types::AccessKind::Execute, mode })?;
        let mut buf = [0u8; 4];
        self.icache.fetch(paddr, &mut buf);
        Ok(u32::from_le_bytes(buf))
    }

    /// No-op side effects; returns whether the access would succeed.
    pub fn probe(&mut self, asn: Asn, vaddr: VirtAddr, access: axp_types::AccessKind) -> bool {
        let vpn = axp_types::vpn(vaddr);
        let scope = match access {
            axp_types::AccessKind::Execute => TlbScope::Instruction,
            _ => TlbScope::Data,
        };
        self.tlb.lookup(vpn, asn, scope).is_some()
    }

    /// this crate's memory-barrier hook. This implementation performs
    /// writes synchronously rather than through a buffered store queue, so
    /// there is nothing to drain; the hook exists to preserve the interface
    /// a buffered implementation would need.
    pub fn execute_memory_barrier(&self, _kind: BarrierKind) {}

    pub fn flush_write_buffers(&self) {}

    pub fn invalidate_instruction_line(&self, paddr: PhysAddr) {
        self.icache.invalidate(paddr);
    }

    /// Applies a cross-CPU coherency snoop to this CPU's
    /// data cache. The instruction cache has no write path of its own, so
    /// only a write-triggered snoop (never a plain read) would ever
    /// overlap it; those are handled by `invalidate_instruction_line`.
    pub fn snoop_data_line(&self, paddr: PhysAddr, op: axp_cache::SnoopOp) {
        self.l1d.snoop(paddr, op);
    }

    pub fn tlb_mut(&mut self) -> &mut Tlb {
        &mut self.tlb
    }
}
