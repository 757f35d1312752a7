//! Integration tests for the block cache.
//!
//! These tests verify cross-component behavior that unit tests don't cover:
//! concurrent access, the file-backed device, and a model check of the
//! cache against a plain map.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use blockcache::storage::{FileDisk, MemDisk};
use blockcache::{BlockCache, BlockKey, BlockNo, CacheConfig, DeviceId, Error};
use proptest::prelude::*;
use tempfile::tempdir;

const BSIZE: usize = 64;
const DEV: DeviceId = DeviceId(1);

fn create_cache(slots: usize, buckets: usize) -> (Arc<BlockCache>, MemDisk) {
    let disk = MemDisk::new(BSIZE);
    let config = CacheConfig::new(slots, buckets, BSIZE);
    (Arc::new(BlockCache::new(config, disk.clone()).unwrap()), disk)
}

fn read_u64(data: &[u8]) -> u64 {
    u64::from_le_bytes(data[..8].try_into().unwrap())
}

fn write_u64(data: &mut [u8], v: u64) {
    data[..8].copy_from_slice(&v.to_le_bytes());
}

/// At most one thread is ever inside the critical section of a block.
#[test]
fn test_concurrent_mutual_exclusion() {
    const BLOCKS: usize = 4;
    let (cache, _disk) = create_cache(8, 3);
    let inside: Arc<Vec<AtomicUsize>> =
        Arc::new((0..BLOCKS).map(|_| AtomicUsize::new(0)).collect());

    let mut handles = vec![];
    for t in 0..8 {
        let cache = Arc::clone(&cache);
        let inside = Arc::clone(&inside);
        handles.push(thread::spawn(move || {
            for i in 0..200 {
                let n = (t + i) % BLOCKS;
                let buf = cache.read(DEV, BlockNo(n as u32)).unwrap();

                let before = inside[n].fetch_add(1, Ordering::SeqCst);
                assert_eq!(before, 0, "two holders of block {}", n);
                thread::yield_now();
                inside[n].fetch_sub(1, Ordering::SeqCst);

                cache.release(buf).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

/// Read-modify-write counters under contention land on the device intact.
#[test]
fn test_concurrent_increments_reach_disk() {
    const THREADS: u64 = 6;
    const ITERS: u64 = 150;
    const BLOCKS: u32 = 10;

    // Fewer slots than blocks forces eviction and reloads
    let (cache, disk) = create_cache(5, 3);

    let mut handles = vec![];
    for t in 0..THREADS {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..ITERS {
                let n = ((t + i) % BLOCKS as u64) as u32;
                let mut buf = loop {
                    match cache.read(DEV, BlockNo(n)) {
                        Ok(buf) => break buf,
                        Err(Error::NoFreeBuffers { .. }) => thread::yield_now(),
                        Err(e) => panic!("read failed: {}", e),
                    }
                };
                let v = read_u64(&buf);
                write_u64(&mut buf, v + 1);
                cache.write_through(&buf).unwrap();
                cache.release(buf).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let total: u64 = (0..BLOCKS)
        .map(|n| {
            disk.contents(BlockKey::new(DEV, BlockNo(n)))
                .map(|d| read_u64(&d))
                .unwrap_or(0)
        })
        .sum();
    assert_eq!(total, THREADS * ITERS);
}

/// Many threads hammering one block always see a single shared buffer.
#[test]
fn test_concurrent_same_block_converges() {
    let (cache, disk) = create_cache(3, 2);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..250 {
                    let mut buf = cache.read(DEV, BlockNo(11)).unwrap();
                    let v = read_u64(&buf);
                    write_u64(&mut buf, v + 1);
                    cache.release(buf).unwrap();
                }
            });
        }
    });

    let mut buf = cache.read(DEV, BlockNo(11)).unwrap();
    assert_eq!(read_u64(&buf), 1000);
    cache.write_through(&buf).unwrap();
    write_u64(&mut buf, 0);
    cache.release(buf).unwrap();

    assert_eq!(read_u64(&disk.contents(BlockKey::new(DEV, BlockNo(11))).unwrap()), 1000);
    assert_eq!(cache.resident_blocks().len(), 1);
}

/// Heavy cross-bucket stealing in both directions must not deadlock.
#[test]
fn test_stealing_under_contention() {
    const HELD: u32 = 3;
    // Two slots per bucket, so holding three home blocks at once needs a steal
    let (cache, _disk) = create_cache(8, 4);

    thread::scope(|s| {
        for t in 0..6u32 {
            let cache = &cache;
            s.spawn(move || {
                for i in 0..200u32 {
                    // Blocks are private to each thread and all map to
                    // bucket t % 4, so no thread ever waits on another's
                    // buffer lock
                    let base = t * 24 + (i % 8) * HELD;
                    let mut held = Vec::with_capacity(HELD as usize);

                    while held.len() < HELD as usize {
                        let n = (t % 4) + 4 * (base + held.len() as u32);
                        match cache.acquire(DEV, BlockNo(n)) {
                            Ok(buf) => held.push(buf),
                            Err(Error::NoFreeBuffers { .. }) => {
                                for buf in held.drain(..) {
                                    cache.release(buf).unwrap();
                                }
                                thread::yield_now();
                            }
                            Err(e) => panic!("acquire failed: {}", e),
                        }
                    }

                    for buf in held {
                        cache.release(buf).unwrap();
                    }
                }
            });
        }
    });

    assert_eq!(cache.free_slot_count(), 8);
    assert_eq!(cache.bucket_occupancy().iter().sum::<usize>(), 8);
    assert!(cache.stats().snapshot().steals > 0);

    let resident = cache.resident_blocks();
    let mut deduped = resident.clone();
    deduped.dedup();
    assert_eq!(resident, deduped);
    for key in resident {
        let home = cache.bucket_index(key.blockno);
        assert!(cache.lru_order(home).contains(&Some(key)));
    }
}

/// Test data persistence on a file image across cache instances.
#[test]
fn test_file_disk_persistence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fs.img");
    let data = b"persistent!";

    {
        let disk = FileDisk::create(&path, DEV, BSIZE, 32).unwrap();
        let cache = BlockCache::new(CacheConfig::new(4, 2, BSIZE), disk).unwrap();

        for n in 0..8 {
            let mut buf = cache.read(DEV, BlockNo(n)).unwrap();
            buf[..data.len()].copy_from_slice(data);
            buf[data.len()] = n as u8;
            cache.write_through(&buf).unwrap();
            cache.release(buf).unwrap();
        }
    }

    {
        let disk = FileDisk::open(&path, DEV, BSIZE).unwrap();
        assert_eq!(disk.block_count(), 32);
        let cache = BlockCache::new(CacheConfig::new(4, 2, BSIZE), disk).unwrap();

        for n in 0..8 {
            let buf = cache.read(DEV, BlockNo(n)).unwrap();
            assert_eq!(&buf[..data.len()], data);
            assert_eq!(buf[data.len()], n as u8);
            cache.release(buf).unwrap();
        }
    }
}

/// Device errors surface through the cache untouched.
#[test]
fn test_file_disk_errors_propagate() {
    let dir = tempdir().unwrap();
    let disk = FileDisk::create(dir.path().join("small.img"), DEV, BSIZE, 2).unwrap();
    let cache = BlockCache::new(CacheConfig::new(4, 2, BSIZE), disk).unwrap();

    assert!(matches!(
        cache.read(DEV, BlockNo(5)),
        Err(Error::BlockOutOfRange { .. })
    ));
    assert!(matches!(
        cache.read(DeviceId(9), BlockNo(0)),
        Err(Error::UnknownDevice(DeviceId(9)))
    ));

    // Failed reads leave nothing held
    assert_eq!(cache.free_slot_count(), 4);
}

#[derive(Debug, Clone)]
enum Op {
    Read(u32),
    Write(u32, u8),
    WriteBack(u32, u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..24).prop_map(Op::Read),
        (0u32..24, any::<u8>()).prop_map(|(n, v)| Op::Write(n, v)),
        (0u32..24, any::<u8>()).prop_map(|(n, v)| Op::WriteBack(n, v)),
    ]
}

proptest! {
    /// Single-threaded use behaves like a map in front of the device.
    #[test]
    fn prop_cache_matches_model(
        slots in 1usize..8,
        buckets in 1usize..5,
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let disk = MemDisk::new(BSIZE);
        let cache = BlockCache::new(CacheConfig::new(slots, buckets, BSIZE), disk.clone()).unwrap();

        // What a reader of a resident block sees, and what the device holds
        let mut visible: HashMap<u32, u8> = HashMap::new();
        let mut durable: HashMap<u32, u8> = HashMap::new();

        // With one bucket the replacement order is fully determined:
        // resident blocks from most to least recently released
        let mut lru: VecDeque<u32> = VecDeque::new();

        for op in ops {
            let n = match op {
                Op::Read(n) | Op::Write(n, _) | Op::WriteBack(n, _) => n,
            };
            let resident = cache.is_cached(DEV, BlockNo(n));
            let expected = if resident {
                visible.get(&n).copied().unwrap_or(0)
            } else {
                // An unwritten change is lost once the block is evicted
                durable.get(&n).copied().unwrap_or(0)
            };

            let mut buf = cache.read(DEV, BlockNo(n)).unwrap();
            prop_assert_eq!(buf[0], expected);

            match op {
                Op::Read(_) => {
                    visible.insert(n, expected);
                }
                Op::Write(_, v) => {
                    buf[0] = v;
                    visible.insert(n, v);
                }
                Op::WriteBack(_, v) => {
                    buf[0] = v;
                    cache.write_through(&buf).unwrap();
                    visible.insert(n, v);
                    durable.insert(n, v);
                }
            }
            cache.release(buf).unwrap();

            prop_assert!(cache.resident_blocks().len() <= slots);
            prop_assert_eq!(cache.free_slot_count(), slots);

            if buckets == 1 {
                if let Some(pos) = lru.iter().position(|&m| m == n) {
                    lru.remove(pos);
                } else if lru.len() == slots {
                    lru.pop_back();
                }
                lru.push_front(n);

                let order: Vec<u32> = cache
                    .lru_order(0)
                    .into_iter()
                    .flatten()
                    .map(|key| key.blockno.0)
                    .collect();
                prop_assert_eq!(order, lru.iter().copied().collect::<Vec<_>>());
            }
        }

        for (n, v) in durable {
            let stored = disk.contents(BlockKey::new(DEV, BlockNo(n))).unwrap();
            prop_assert_eq!(stored[0], v);
        }
    }
}
