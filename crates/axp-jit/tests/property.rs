use axp_jit::PageVersionTable;
use proptest::prelude::*;

proptest! {
    /// A snapshot taken right before a write to the same page is always
    /// rejected afterward; a snapshot over an untouched page always stays
    /// valid.
    #[test]
    fn write_invalidates_only_touched_pages(
        snapshot_page in 0u64..64,
        write_page in 0u64..64,
    ) {
        let mut table = PageVersionTable::new(64);
        let paddr = snapshot_page << axp_jit::PAGE_SHIFT;
        let (gen, snap) = table.snapshot(paddr, 1);
        table.record_write(write_page << axp_jit::PAGE_SHIFT, 1);
        let still_valid = table.snapshot_is_current(gen, &snap);
        prop_assert_eq!(still_valid, snapshot_page != write_page);
    }

    /// Repeated writes to the same page keep invalidating freshly taken
    /// snapshots; a snapshot taken after the last write in a sequence is
    /// always valid until something writes again.
    #[test]
    fn snapshot_taken_after_writes_is_valid_until_next_write(writes in 0u32..20) {
        let mut table = PageVersionTable::new(8);
        for _ in 0..writes {
            table.record_write(0, 1);
        }
        let (gen, snap) = table.snapshot(0, 1);
        prop_assert!(table.snapshot_is_current(gen, &snap));
        table.record_write(0, 1);
        prop_assert!(!table.snapshot_is_current(gen, &snap));
    }
}
