//! Block cache benchmarks.
//!
//! Run with `cargo bench`.

use std::hint::black_box;

use blockcache::storage::MemDisk;
use blockcache::{BlockCache, BlockNo, CacheConfig, DeviceId};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const BSIZE: usize = 1024;
const DEV: DeviceId = DeviceId(1);

/// Every access finds its block resident.
fn bench_hit(c: &mut Criterion) {
    let cache = BlockCache::new(CacheConfig::default(), MemDisk::new(BSIZE)).unwrap();
    let warm = cache.read(DEV, BlockNo(1)).unwrap();
    cache.release(warm).unwrap();

    c.bench_function("read_hit", |b| {
        b.iter(|| {
            let buf = cache.read(DEV, black_box(BlockNo(1))).unwrap();
            black_box(buf[0]);
            cache.release(buf).unwrap();
        })
    });
}

/// A working set larger than the pool: every access recycles a slot, and
/// with a single-bucket working set most of them steal.
fn bench_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_miss");

    for buckets in [1usize, 13] {
        let config = CacheConfig::default().with_buckets(buckets);
        let slots = config.slots as u32;
        let cache = BlockCache::new(config, MemDisk::new(BSIZE)).unwrap();
        let stride = buckets as u32;
        let mut n = 0u32;

        group.bench_with_input(BenchmarkId::from_parameter(buckets), &buckets, |b, _| {
            b.iter(|| {
                n = (n + 1) % (slots * 4);
                let buf = cache.read(DEV, BlockNo(n * stride)).unwrap();
                cache.release(buf).unwrap();
            })
        });
    }

    group.finish();
}

/// Write-through cost on top of a hit.
fn bench_write_through(c: &mut Criterion) {
    let cache = BlockCache::new(CacheConfig::default(), MemDisk::new(BSIZE)).unwrap();

    c.bench_function("write_through", |b| {
        b.iter(|| {
            let mut buf = cache.read(DEV, BlockNo(7)).unwrap();
            buf[0] = buf[0].wrapping_add(1);
            cache.write_through(&buf).unwrap();
            cache.release(buf).unwrap();
        })
    });
}

criterion_group!(benches, bench_hit, bench_miss, bench_write_through);
criterion_main!(benches);
