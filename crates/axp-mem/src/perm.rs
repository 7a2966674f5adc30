use axp_types::{PhysAddr, PAGE_SHIFT};
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PagePerm: u8 {
        const READ    = 0b001;
        const WRITE   = 0b010;
        const EXECUTE = 0b100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermFault {
    pub ppn: u64,
    pub requested: PagePerm,
}

/// Physical-page permission regions, keyed by physical page number
///. Implemented as a sorted, merged
/// interval list; lookups are a binary search.
#[derive(Default)]
pub struct PhysPermissions {
    // (start_ppn, end_ppn_exclusive, perm), sorted and non-overlapping.
    regions: Vec<(u64, u64, PagePerm)>,
}

impl PhysPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_region(&mut self, base: PhysAddr, len: u64, perm: PagePerm) {
        let start = base >> PAGE_SHIFT;
        let end = (base + len).div_ceil(1 << PAGE_SHIFT);
        self.regions.retain(|(s, e, _)| *e <= start || *s >= end);
        self.regions.push((start, end, perm));
        self.regions.sort_by_key(|(s, _, _)| *s);
    }

    fn lookup(&self, ppn: u64) -> Option<PagePerm> {
        self.regions
            .binary_search_by(|(s, e, _)| {
                if ppn < *s {
                    std::cmp::Ordering::Greater
                } else if ppn >= *e {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()
            .map(|i| self.regions[i].2)
    }

    /// Pages with no registered region are considered fully accessible:
    /// the permission table exists to carve out *restrictions* (PAL-only
    /// windows, read-only firmware regions), not to gate ordinary RAM.
    pub fn check(&self, paddr: PhysAddr, requested: PagePerm) -> Result<(), PermFault> {
        let ppn = paddr >> PAGE_SHIFT;
        match self.lookup(ppn) {
            None => Ok(()),
            Some(perm) if perm.contains(requested) => Ok(()),
            Some(_) => Err(PermFault { ppn, requested }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_pages_are_unrestricted() {
        let perms = PhysPermissions::new();
        assert!(perms.check(0x1234_5678, PagePerm::all()).is_ok());
    }

    #[test]
    fn read_only_region_rejects_writes() {
        let mut perms = PhysPermissions::new();
        perms.set_region(0x1000, 0x1000, PagePerm::READ | PagePerm::EXECUTE);
        assert!(perms.check(0x1050, PagePerm::READ).is_ok());
        assert!(perms.check(0x1050, PagePerm::WRITE).is_err());
    }

    #[test]
    fn later_region_overrides_overlapping_earlier_one() {
        let mut perms = PhysPermissions::new();
        perms.set_region(0x0, 0x2000, PagePerm::all());
        perms.set_region(0x1000, 0x1000, PagePerm::READ);
        assert!(perms.check(0x500, PagePerm::WRITE).is_ok());
        assert!(perms.check(0x1500, PagePerm::WRITE).is_err());
    }
}
