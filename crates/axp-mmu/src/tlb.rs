use axp_types::{Asn, VirtAddr};

use crate::entry::TlbEntry;

/// Default victim buffer size.
const VICTIM_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlbScope {
    Unified,
    Instruction,
    Data,
}

/// Per-CPU TLB: a bounded set of resident entries plus a
/// small victim buffer that catches just-evicted entries.
pub struct Tlb {
    capacity: usize,
    entries: Vec<(TlbEntry, TlbScope, u64)>,
    victims: Vec<(TlbEntry, TlbScope)>,
    clock: u64,
}

impl Tlb {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Vec::with_capacity(capacity), victims: Vec::new(), clock: 0 }
    }

    fn stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn scope_matches(scope: TlbScope, want: TlbScope) -> bool {
        scope == TlbScope::Unified || want == TlbScope::Unified || scope == want
    }

    pub fn lookup(&mut self, vpn: u64, asn: Asn, scope: TlbScope) -> Option<TlbEntry> {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|(e, s, _)| Self::scope_matches(*s, scope) && e.matches(vpn, asn))
        {
            let stamp = self.stamp();
            self.entries[pos].2 = stamp;
            return Some(self.entries[pos].0);
        }

        // Victim buffer hit: promote back into the main TLB.
        if let Some(pos) = self
            .victims
            .iter()
            .position(|(e, s)| Self::scope_matches(*s, scope) && e.matches(vpn, asn))
        {
            let (entry, vscope) = self.victims.remove(pos);
            self.install(entry, vscope);
            return Some(entry);
        }

        None
    }

    /// Installs a freshly-walked entry, evicting the LRU resident entry into
    /// the victim buffer if the TLB is full.
    pub fn install(&mut self, entry: TlbEntry, scope: TlbScope) {
        if self.entries.len() >= self.capacity {
            let victim_pos = self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, (_, _, stamp))| *stamp)
                .map(|(i, _)| i)
                .unwrap();
            let (victim, vscope, _) = self.entries.remove(victim_pos);
            if self.victims.len() >= VICTIM_CAPACITY {
                self.victims.remove(0);
            }
            self.victims.push((victim, vscope));
        }
        let stamp = self.stamp();
        self.entries.push((entry, scope, stamp));
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
        self.victims.clear();
    }

    pub fn invalidate_by_asn(&mut self, asn: Asn) {
        self.entries.retain(|(e, _, _)| e.global || e.asn != asn);
        self.victims.retain(|(e, _)| e.global || e.asn != asn);
    }

    pub fn invalidate_entry(&mut self, vaddr: VirtAddr, asn: Asn) {
        let vpn = axp_types::vpn(vaddr);
        self.entries.retain(|(e, _, _)| !e.matches(vpn, asn));
        self.victims.retain(|(e, _)| !e.matches(vpn, asn));
    }

    pub fn invalidate_instruction_entry(&mut self, vaddr: VirtAddr, asn: Asn) {
        let vpn = axp_types::vpn(vaddr);
        self.entries.retain(|(e, s, _)| {
            !(Self::scope_matches(*s, TlbScope::Instruction) && e.matches(vpn, asn))
        });
        self.victims
            .retain(|(e, s)| !(Self::scope_matches(*s, TlbScope::Instruction) && e.matches(vpn, asn)));
    }

    pub fn invalidate_data_entry(&mut self, vaddr: VirtAddr, asn: Asn) {
        let vpn = axp_types::vpn(vaddr);
        self.entries
            .retain(|(e, s, _)| !(Self::scope_matches(*s, TlbScope::Data) && e.matches(vpn, asn)));
        self.victims
            .retain(|(e, s)| !(Self::scope_matches(*s, TlbScope::Data) && e.matches(vpn, asn)));
    }

    pub fn resident_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axp_mem::PagePerm;

    fn entry(vpn: u64, asn: u16, global: bool) -> TlbEntry {
        TlbEntry { vpn, asn: Asn(asn), ppn: vpn, global, perm: PagePerm::all() }
    }

    #[test]
    fn evicted_entry_is_recoverable_from_victim_buffer() {
        let mut tlb = Tlb::new(2);
        tlb.install(entry(1, 0, false), TlbScope::Unified);
        tlb.install(entry(2, 0, false), TlbScope::Unified);
        tlb.install(entry(3, 0, false), TlbScope::Unified); // evicts vpn=1 (oldest)

        assert!(tlb.lookup(1, Asn(0), TlbScope::Unified).is_some(), "must be served from victim buffer");
        assert_eq!(tlb.resident_count(), 2);
    }

    #[test]
    fn global_entry_matches_any_asn() {
        let mut tlb = Tlb::new(4);
        tlb.install(entry(5, 7, true), TlbScope::Unified);
        assert!(tlb.lookup(5, Asn(99), TlbScope::Unified).is_some());
    }

    #[test]
    fn invalidate_by_asn_spares_global_entries() {
        let mut tlb = Tlb::new(4);
        tlb.install(entry(1, 3, false), TlbScope::Unified);
        tlb.install(entry(2, 3, true), TlbScope::Unified);
        tlb.invalidate_by_asn(Asn(3));
        assert!(tlb.lookup(1, Asn(3), TlbScope::Unified).is_none());
        assert!(tlb.lookup(2, Asn(3), TlbScope::Unified).is_some());
    }
}
