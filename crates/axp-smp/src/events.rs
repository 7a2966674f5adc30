use axp_cache::SnoopOp;
use axp_mmu::{BarrierKind, TlbScope};
use axp_types::{Asn, PhysAddr, VirtAddr};

/// A broadcasted TLB invalidation. Mirrors
/// `axp_mmu::Tlb`'s own invalidation entry points one-to-one so a receiving
/// CPU can apply it without reinterpreting scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShootdownOp {
    All,
    Asn(Asn),
    Entry { vaddr: VirtAddr, asn: Asn, scope: TlbScope },
}

/// What a registered CPU exposes to the coordinator so broadcasts can reach
/// it without this crate depending on the concrete per-CPU `MemorySystem`
/// type (kept generic the same way `axp_cache::CacheBackend` decouples
/// cache levels from their backing store).
pub trait CpuTarget: Send + Sync {
    fn apply_tlb_shootdown(&self, op: ShootdownOp);
    fn apply_cache_snoop(&self, paddr: PhysAddr, op: SnoopOp);
    fn acknowledge_barrier(&self, kind: BarrierKind);
}
