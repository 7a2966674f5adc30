use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axp_cache::SnoopOp;
use axp_mmu::{BarrierKind, ReservationTracker};
use axp_types::PhysAddr;

use crate::events::{CpuTarget, ShootdownOp};
use crate::reservation::{reservation_overlaps_write, Reservation};

/// CPU registry plus the four cross-CPU event channels this crate tracks:
/// TLB shoot-down, cache coherency snoop, LL/SC reservation tracking, and
/// memory barriers. Lock order is fixed registry-then-reservations
/// (SMPCoordinator → per-CPU → per-cache → per-set → per-line).
pub struct SMPCoordinator {
    cpus: RwLock<HashMap<u32, Arc<dyn CpuTarget>>>,
    reservations: RwLock<HashMap<u32, Reservation>>,
}

impl Default for SMPCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SMPCoordinator {
    pub fn new() -> Self {
        Self { cpus: RwLock::new(HashMap::new()), reservations: RwLock::new(HashMap::new()) }
    }

    pub fn register_cpu(&self, cpu: u32, target: Arc<dyn CpuTarget>) {
        self.cpus.write().unwrap().insert(cpu, target);
    }

    pub fn unregister_cpu(&self, cpu: u32) {
        self.cpus.write().unwrap().remove(&cpu);
        self.reservations.write().unwrap().remove(&cpu);
    }

    pub fn cpu_count(&self) -> usize {
        self.cpus.read().unwrap().len()
    }

    /// Broadcasts a TLB invalidation to every CPU other than `originator`.
    /// The originator applies its own TLB operation locally before calling
    /// this (it is not one of the receivers).
    pub fn broadcast_shootdown(&self, originator: u32, op: ShootdownOp) {
        let cpus = self.cpus.read().unwrap();
        for (&cpu, target) in cpus.iter() {
            if cpu != originator {
                target.apply_tlb_shootdown(op);
            }
        }
    }

    /// Broadcasts a cache coherency snoop to every
    /// CPU other than `originator`, and clears any other CPU's reservation
    /// the write invalidates.
    pub fn broadcast_snoop(&self, originator: u32, paddr: PhysAddr, size: u64, op: SnoopOp) {
        {
            let cpus = self.cpus.read().unwrap();
            for (&cpu, target) in cpus.iter() {
                if cpu != originator {
                    target.apply_cache_snoop(paddr, op);
                }
            }
        }
        self.invalidate_overlapping(originator, paddr, size.min(u8::MAX as u64) as u8);
    }

    /// Drains the originator's write buffers (a no-op in this synchronous,
    /// unbuffered store model) and stalls until every other CPU has
    /// acknowledged the barrier. Because delivery here is a direct call
    /// rather than a queued message, the stall is simply this loop
    /// returning.
    pub fn execute_barrier(&self, originator: u32, kind: BarrierKind) {
        let cpus = self.cpus.read().unwrap();
        for (&cpu, target) in cpus.iter() {
            if cpu != originator {
                target.acknowledge_barrier(kind);
            }
        }
    }
}

impl ReservationTracker for SMPCoordinator {
    fn register_reservation(&self, cpu: u32, paddr: PhysAddr, size: u8) {
        self.reservations.write().unwrap().insert(cpu, Reservation { paddr, size });
    }

    /// Step 6: the reservation is consumed regardless of
    /// whether it was still valid for `paddr`.
    fn check_and_clear_reservation(&self, cpu: u32, paddr: PhysAddr) -> bool {
        let mut reservations = self.reservations.write().unwrap();
        match reservations.remove(&cpu) {
            Some(r) => r.covers(paddr),
            None => false,
        }
    }

    fn clear_reservation(&self, cpu: u32) {
        self.reservations.write().unwrap().remove(&cpu);
    }

    fn invalidate_overlapping(&self, writer_cpu: u32, paddr: PhysAddr, size: u8) {
        let mut reservations = self.reservations.write().unwrap();
        reservations.retain(|&cpu, r| {
            cpu == writer_cpu || !reservation_overlaps_write(r.paddr, r.size, paddr, size as u64)
        });
    }
}
