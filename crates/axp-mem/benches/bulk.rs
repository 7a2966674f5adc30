use axp_mem::{MemoryBus, PhysicalMemory, PhysicalMemoryOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;

const SIZE: u64 = 16 * 1024 * 1024;
const CHUNK: &[u8] = &[0xA5; 4096];

fn bench_physical_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("physical_memory");
    group.throughput(Throughput::Bytes(CHUNK.len() as u64));

    let mem = PhysicalMemory::with_options(SIZE, PhysicalMemoryOptions { chunk_size: 4096 })
        .unwrap();
    group.bench_function("write_bytes", |b| {
        b.iter(|| mem.write_bytes(black_box(0x1000), black_box(CHUNK)));
    });

    let mut out = vec![0u8; CHUNK.len()];
    group.bench_function("read_bytes", |b| {
        b.iter(|| mem.read_bytes(black_box(0x1000), black_box(&mut out)));
    });

    group.bench_function("scalar_write_u64", |b| {
        b.iter(|| mem.write_u64(black_box(0x2000), black_box(0x1122_3344_5566_7788)));
    });

    group.finish();
}

fn bench_memory_bus(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_bus");
    group.throughput(Throughput::Bytes(CHUNK.len() as u64));

    let ram = Arc::new(
        PhysicalMemory::with_options(SIZE, PhysicalMemoryOptions { chunk_size: 4096 }).unwrap(),
    );
    let bus = MemoryBus::new(ram);

    group.bench_function("try_write_bytes", |b| {
        b.iter(|| bus.try_write_bytes(black_box(0x1000), black_box(CHUNK)).unwrap());
    });

    let mut out = vec![0u8; CHUNK.len()];
    group.bench_function("try_read_bytes", |b| {
        b.iter(|| bus.try_read_bytes(black_box(0x1000), black_box(&mut out)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_physical_memory, bench_memory_bus);
criterion_main!(benches);
