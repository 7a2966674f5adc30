use axp_mem::{PhysicalMemory, PhysicalMemoryOptions};

#[test]
fn sparse_allocation_only_on_write() {
    let mem = PhysicalMemory::with_options(0x10_0000, PhysicalMemoryOptions { chunk_size: 4096 })
        .unwrap();

    assert_eq!(mem.allocated_chunks(), 0);

    let mut buf = [0u8; 16];
    mem.read_bytes(0x2000, &mut buf);
    assert_eq!(buf, [0u8; 16]);
    assert_eq!(mem.allocated_chunks(), 0, "reads must not allocate");

    mem.write_u8(0x2000, 0xAA);
    assert_eq!(mem.allocated_chunks(), 1);

    mem.write_u8(0x2001, 0xBB);
    assert_eq!(mem.allocated_chunks(), 1, "same chunk should not reallocate");

    mem.write_u8(0x3000, 0xCC);
    assert_eq!(mem.allocated_chunks(), 2, "different chunk should allocate");
}

#[test]
fn scalar_round_trip_all_widths() {
    let mem = PhysicalMemory::new(0x1000).unwrap();
    mem.write_u8(0x10, 0x11);
    mem.write_u16(0x20, 0x2233);
    mem.write_u32(0x30, 0x4455_6677);
    mem.write_u64(0x40, 0x8899_aabb_ccdd_eeff);

    assert_eq!(mem.read_u8(0x10), 0x11);
    assert_eq!(mem.read_u16(0x20), 0x2233);
    assert_eq!(mem.read_u32(0x30), 0x4455_6677);
    assert_eq!(mem.read_u64(0x40), 0x8899_aabb_ccdd_eeff);
}

#[test]
fn try_read_write_reject_out_of_range() {
    let mem = PhysicalMemory::new(0x100).unwrap();
    let mut buf = [0u8; 4];
    assert!(mem.try_read_bytes(0x200, &mut buf).is_err());
    assert!(mem.try_write_bytes(0xfe, &[1, 2, 3]).is_err());
}
