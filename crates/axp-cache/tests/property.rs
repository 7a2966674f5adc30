use std::sync::Arc;

use axp_cache::DataCache;
use axp_mem::{MemoryBus, PhysicalMemory};
use proptest::prelude::*;

proptest! {
    #[test]
    fn cache_reads_reflect_last_write_per_address(
        ops in proptest::collection::vec((0usize..64, any::<u8>()), 0usize..200)
    ) {
        let backing = MemoryBus::new(Arc::new(PhysicalMemory::new(0x1000).unwrap()));
        let cache = DataCache::new(4, 2, backing);
        let mut model = [0u8; 64];

        for (addr, value) in ops {
            cache.write(addr as u64, &[value]);
            model[addr] = value;
        }

        for addr in 0..64usize {
            let mut out = [0u8; 1];
            cache.read(addr as u64, &mut out);
            prop_assert_eq!(out[0], model[addr]);
        }
    }
}
