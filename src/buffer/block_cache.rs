//! Block Cache - the buffer cache core.
//!
//! The [`BlockCache`] provides:
//! - Lookup of cached blocks by `(device, block number)`
//! - LRU recycling of unreferenced buffers within a bucket
//! - Stealing free buffers from other buckets when a bucket runs dry
//! - Read-through / write-through to the [`BlockDevice`]
//! - Reference counting and pinning

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, trace, warn};

use crate::buffer::bucket::{Bucket, BucketList};
use crate::buffer::handle::BufHandle;
use crate::buffer::slot::{Slot, SlotMeta};
use crate::buffer::stats::CacheStats;
use crate::common::{BlockKey, BlockNo, CacheConfig, DeviceId, Error, Result, SlotId};
use crate::storage::BlockDevice;

/// Contention rounds spent spinning before yielding.
const SPIN_ROUNDS: u32 = 6;

/// Contention rounds spent yielding before sleeping.
const YIELD_ROUNDS: u32 = 10;

/// Upper bound on the sleep between contention retries.
const MAX_BACKOFF: Duration = Duration::from_millis(1);

/// Outcome of a cross-bucket scan for a free slot.
enum Steal {
    /// A slot was moved into the home bucket and re-identified.
    Found(SlotId),
    /// Nothing free, but at least one bucket was skipped because it was busy.
    Contended,
    /// Every other bucket was scanned and none had a free slot.
    Exhausted,
}

/// A fixed pool of block buffers shared by all threads.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                         BlockCache                           │
/// │  buckets: Vec<Bucket>            slots: Vec<Slot>            │
/// │  ┌──────────────────────┐        ┌──────────────────────┐    │
/// │  │ 0: Mutex<LruList> ───┼──ids──▶│ Slot0 SleepLock<Buf> │    │
/// │  │ 1: Mutex<LruList>    │        │ Slot1 SleepLock<Buf> │    │
/// │  │ ...                  │        │ ...                  │    │
/// │  └──────────────────────┘        └──────────────────────┘    │
/// │  home bucket = blockno mod buckets.len()                     │
/// │  device: Box<dyn BlockDevice>   stats: CacheStats            │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Locking
/// Two tiers, never nested the wrong way:
/// - Bucket locks guard list order and [`SlotMeta`]. They are held only for
///   a list scan or edit, never across I/O or while blocking on a slot.
/// - A slot's sleep lock guards its payload. It is taken in
///   [`acquire`](BlockCache::acquire) after every bucket lock is dropped and
///   held until [`release`](BlockCache::release).
///
/// Stealing holds the home bucket plus one candidate. Candidates above home
/// are locked blocking (ascending order); candidates below home are only
/// `try_lock`ed, and a busy one makes `acquire` drop everything, back off
/// and start over. No thread ever blocks on a lower-indexed bucket while holding a
/// higher-indexed one, so bucket locks cannot deadlock.
///
/// # Usage
/// ```
/// use blockcache::{BlockCache, BlockNo, CacheConfig, DeviceId};
/// use blockcache::storage::MemDisk;
///
/// let disk = MemDisk::new(1024);
/// let cache = BlockCache::new(CacheConfig::default(), disk.clone()).unwrap();
///
/// let mut buf = cache.acquire(DeviceId(1), BlockNo(3)).unwrap();
/// cache.read_through(&mut buf).unwrap();
/// buf.data_mut()[0] = 0x42;
/// cache.write_through(&buf).unwrap();
/// cache.release(buf).unwrap();
///
/// assert_eq!(disk.write_count(), 1);
/// ```
pub struct BlockCache {
    /// Fixed pool of slots allocated at startup.
    slots: Vec<Slot>,

    /// Lock domains; each owns the list of slots it currently holds.
    buckets: Vec<Bucket>,

    /// Physical block I/O.
    device: Box<dyn BlockDevice>,

    stats: CacheStats,

    config: CacheConfig,
}

impl BlockCache {
    /// Create a cache over `device`.
    ///
    /// Slot `i` starts out unused in bucket `i mod buckets`.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if any dimension of `config` is zero, or if
    ///   `config.block_size` differs from the device's block size
    pub fn new<D: BlockDevice + 'static>(config: CacheConfig, device: D) -> Result<Self> {
        config.validate()?;

        if device.block_size() != config.block_size {
            return Err(Error::InvalidConfig(format!(
                "block_size {} does not match device block size {}",
                config.block_size,
                device.block_size()
            )));
        }

        let slots: Vec<Slot> = (0..config.slots)
            .map(|i| Slot::new(SlotId::new(i), config.block_size))
            .collect();

        let buckets: Vec<Bucket> = (0..config.buckets).map(|_| Bucket::new()).collect();

        for slot in &slots {
            buckets[slot.id().0 % config.buckets]
                .lock()
                .push_front(slot.id(), SlotMeta::default());
        }

        info!(
            "[BCACHE] init: {} slots x {} bytes in {} buckets",
            config.slots, config.block_size, config.buckets
        );

        Ok(Self {
            slots,
            buckets,
            device: Box::new(device),
            stats: CacheStats::new(),
            config,
        })
    }

    // ========================================================================
    // Public API: acquire / read / write / release
    // ========================================================================

    /// Get exclusive access to a block's buffer.
    ///
    /// If the block is resident its payload and validity are kept; otherwise
    /// a free buffer is repurposed and comes back invalid. Blocks only while
    /// waiting for another holder of the same block to release it.
    ///
    /// # Errors
    /// - `Error::NoFreeBuffers` if every slot is referenced
    pub fn acquire(&self, dev: DeviceId, blockno: BlockNo) -> Result<BufHandle<'_>> {
        let key = BlockKey::new(dev, blockno);
        let slot_id = self.get_slot(key)?;
        let slot = &self.slots[slot_id.0];

        // No bucket lock is held here.
        slot.lock().acquire();
        trace!("[BCACHE] acquired {} in {}", key, slot_id);

        Ok(BufHandle::new(self, slot, key))
    }

    /// Acquire a block and make sure its payload is loaded.
    ///
    /// # Errors
    /// - `Error::NoFreeBuffers` if every slot is referenced
    /// - Any error from the device read (the handle is released)
    pub fn read(&self, dev: DeviceId, blockno: BlockNo) -> Result<BufHandle<'_>> {
        let mut handle = self.acquire(dev, blockno)?;
        self.read_through(&mut handle)?;
        Ok(handle)
    }

    /// Load the block from the device unless the buffer is already valid.
    ///
    /// # Errors
    /// - `Error::ProtocolViolation` if the handle came from another cache
    /// - Any error from the device read; the buffer stays invalid
    pub fn read_through(&self, handle: &mut BufHandle<'_>) -> Result<()> {
        self.check_issued(handle, "read_through")?;

        if handle.is_valid() {
            return Ok(());
        }

        let key = handle.key();
        self.device.read_block(key, handle.data_mut())?;
        handle.slot().set_valid(true);

        CacheStats::bump(&self.stats.blocks_read);
        debug!("[BCACHE] read {} into {}", key, handle.slot_id());
        Ok(())
    }

    /// Write the buffer's payload to the device.
    ///
    /// Validity and the lock are unchanged.
    ///
    /// # Errors
    /// - `Error::ProtocolViolation` if the calling thread does not hold the
    ///   buffer's lock
    /// - Any error from the device write
    pub fn write_through(&self, handle: &BufHandle<'_>) -> Result<()> {
        self.check_holding(handle, "write_through")?;

        self.device.write_block(handle.key(), handle.data())?;

        CacheStats::bump(&self.stats.blocks_written);
        debug!("[BCACHE] wrote {} from {}", handle.key(), handle.slot_id());
        Ok(())
    }

    /// Give a buffer back.
    ///
    /// Unlocks the buffer and drops its reference. When the last reference
    /// goes, the buffer moves to the most-recently-released end of its
    /// bucket so it is the last free buffer there to be recycled.
    ///
    /// # Errors
    /// - `Error::ProtocolViolation` if the calling thread does not hold the
    ///   buffer's lock. The handle is still dropped (and thereby released).
    pub fn release(&self, mut handle: BufHandle<'_>) -> Result<()> {
        self.check_holding(&handle, "release")?;

        handle.mark_released();
        self.release_slot(handle.slot(), handle.key());
        Ok(())
    }

    // ========================================================================
    // Public API: pin / unpin
    // ========================================================================

    /// Keep the buffer resident past its release.
    ///
    /// Adds a reference that only [`unpin`](BlockCache::unpin) removes.
    /// Does not require holding the buffer's lock.
    pub fn pin(&self, handle: &BufHandle<'_>) -> Result<()> {
        self.check_issued(handle, "pin")?;

        self.with_meta(handle, |meta| {
            meta.refcnt += 1;
            meta.pins += 1;
            Ok(())
        })?;

        trace!("[BCACHE] pinned {}", handle.key());
        Ok(())
    }

    /// Drop a reference added by [`pin`](BlockCache::pin).
    ///
    /// # Errors
    /// - `Error::NotPinned` if the buffer has no outstanding pin
    pub fn unpin(&self, handle: &BufHandle<'_>) -> Result<()> {
        self.check_issued(handle, "unpin")?;

        let key = handle.key();
        self.with_meta(handle, |meta| {
            if meta.pins == 0 {
                return Err(Error::NotPinned(key));
            }
            meta.pins -= 1;
            meta.refcnt -= 1;
            Ok(())
        })?;

        trace!("[BCACHE] unpinned {}", key);
        Ok(())
    }

    // ========================================================================
    // Public API: stats and info
    // ========================================================================

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Home bucket of a block number.
    #[inline]
    pub fn bucket_index(&self, blockno: BlockNo) -> usize {
        blockno.0 as usize % self.buckets.len()
    }

    /// Reference count of a resident block, or None if not resident.
    pub fn ref_count(&self, dev: DeviceId, blockno: BlockNo) -> Option<u32> {
        let key = BlockKey::new(dev, blockno);
        let list = self.buckets[self.bucket_index(blockno)].lock();
        list.lookup(key)
            .and_then(|id| list.get(id))
            .map(|meta| meta.refcnt)
    }

    /// Does some slot currently carry this block's identity?
    pub fn is_cached(&self, dev: DeviceId, blockno: BlockNo) -> bool {
        self.ref_count(dev, blockno).is_some()
    }

    /// Number of slots with no references.
    ///
    /// Buckets are inspected one at a time, so under concurrent use the
    /// result is approximate.
    pub fn free_slot_count(&self) -> usize {
        self.buckets.iter().map(|b| b.lock().free_count()).sum()
    }

    /// Number of slots linked into each bucket.
    pub fn bucket_occupancy(&self) -> Vec<usize> {
        self.buckets.iter().map(|b| b.lock().len()).collect()
    }

    /// Every block identity currently carried by a slot, sorted.
    pub fn resident_blocks(&self) -> Vec<BlockKey> {
        let mut keys: Vec<BlockKey> = self
            .buckets
            .iter()
            .flat_map(|b| {
                b.lock()
                    .iter()
                    .filter_map(|(_, meta)| meta.key)
                    .collect::<Vec<_>>()
            })
            .collect();
        keys.sort();
        keys
    }

    /// Identities in one bucket from most to least recently released.
    /// Unused slots show up as None.
    pub fn lru_order(&self, bucket: usize) -> Vec<Option<BlockKey>> {
        self.buckets
            .get(bucket)
            .map(|b| b.lock().iter().map(|(_, meta)| meta.key).collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Internal: called by BufHandle on drop
    // ========================================================================

    /// Unlock a slot and drop one reference.
    pub(crate) fn release_slot(&self, slot: &Slot, key: BlockKey) {
        slot.lock().release();

        let mut list = self.buckets[self.bucket_index(key.blockno)].lock();
        let now_free = match list.get_mut(slot.id()) {
            Some(meta) => {
                assert!(meta.holds(key) && meta.refcnt > 0, "refcnt underflow");
                meta.refcnt -= 1;
                meta.refcnt == 0
            }
            None => unreachable!("{} holding {} is not in its home bucket", slot.id(), key),
        };

        if now_free {
            list.move_to_front(slot.id());
        }
        trace!("[BCACHE] released {} from {}", key, slot.id());
    }

    // ========================================================================
    // Internal: slot lookup, recycling and stealing
    // ========================================================================

    /// Find or repurpose a slot for `key` and count a reference to it.
    ///
    /// Returns with no bucket lock held.
    fn get_slot(&self, key: BlockKey) -> Result<SlotId> {
        let home = self.bucket_index(key.blockno);
        let mut attempts = 0u32;

        loop {
            let mut list = self.buckets[home].lock();

            // Is the block already cached?
            if let Some(id) = list.lookup(key) {
                if let Some(meta) = list.get_mut(id) {
                    meta.refcnt += 1;
                }
                CacheStats::bump(&self.stats.hits);
                trace!("[BCACHE] hit {} in {}", key, id);
                return Ok(id);
            }

            // Not cached: recycle the least recently released free slot.
            if let Some(id) = list.victim() {
                self.recycle(&mut list, id, key);
                return Ok(id);
            }

            // Nothing free at home: take one from another bucket.
            match self.steal(home, &mut list, key) {
                Steal::Found(id) => return Ok(id),
                Steal::Contended => {
                    drop(list);
                    CacheStats::bump(&self.stats.contention_retries);
                    trace!("[BCACHE] retry {}: candidate bucket busy", key);
                    Self::backoff(attempts);
                    attempts = attempts.saturating_add(1);
                }
                Steal::Exhausted => {
                    warn!(
                        "[BCACHE] no free buffers for {}: all {} slots in use",
                        key,
                        self.slots.len()
                    );
                    return Err(Error::NoFreeBuffers {
                        slots: self.slots.len(),
                    });
                }
            }
        }
    }

    /// Wait before retrying a contended steal: spin, then yield, then sleep
    /// with a doubling delay capped at `MAX_BACKOFF`.
    fn backoff(attempts: u32) {
        if attempts < SPIN_ROUNDS {
            for _ in 0..(1u32 << attempts) {
                spin_loop();
            }
        } else if attempts < SPIN_ROUNDS + YIELD_ROUNDS {
            thread::yield_now();
        } else {
            let exp = (attempts - SPIN_ROUNDS - YIELD_ROUNDS).min(10);
            let delay = Duration::from_micros(1u64 << exp).min(MAX_BACKOFF);
            thread::sleep(delay);
        }
    }

    /// Give a free slot in `list` the identity `key`, with one reference.
    fn recycle(&self, list: &mut BucketList, id: SlotId, key: BlockKey) {
        if let Some(meta) = list.get_mut(id) {
            debug_assert!(meta.is_free());

            match meta.key {
                Some(old) => {
                    CacheStats::bump(&self.stats.evictions);
                    debug!("[BCACHE] miss {}: evict {} from {}", key, old, id);
                }
                None => debug!("[BCACHE] miss {}: first use of {}", key, id),
            }

            meta.key = Some(key);
            meta.refcnt = 1;
            meta.pins = 0;
        }

        // refcnt was 0, so nobody holds the sleep lock.
        self.slots[id.0].set_valid(false);
        CacheStats::bump(&self.stats.misses);
    }

    /// Move a free slot from another bucket into `home_list` for `key`.
    ///
    /// Scans `home+1, home+2, ...` wrapping once around. At most two bucket
    /// locks are held at a time.
    fn steal(&self, home: usize, home_list: &mut BucketList, key: BlockKey) -> Steal {
        let n = self.buckets.len();
        let mut contended = false;

        for idx in (1..n).map(|offset| (home + offset) % n) {
            let mut candidate = if idx > home {
                self.buckets[idx].lock()
            } else {
                match self.buckets[idx].try_lock() {
                    Some(guard) => guard,
                    None => {
                        contended = true;
                        continue;
                    }
                }
            };

            let Some(id) = candidate.victim() else {
                continue;
            };

            if let Some(meta) = candidate.remove(id) {
                home_list.push_front(id, meta);
                drop(candidate);

                self.recycle(home_list, id, key);
                CacheStats::bump(&self.stats.steals);
                debug!(
                    "[BCACHE] stole {} from bucket {} into bucket {} for {}",
                    id, idx, home, key
                );
                return Steal::Found(id);
            }
        }

        if contended {
            Steal::Contended
        } else {
            Steal::Exhausted
        }
    }

    // ========================================================================
    // Internal: protocol checks
    // ========================================================================

    fn check_issued(&self, handle: &BufHandle<'_>, op: &'static str) -> Result<()> {
        if !std::ptr::eq(handle.cache(), self) {
            error!("[BCACHE] {} on {}: handle from another cache", op, handle.key());
            return Err(Error::ProtocolViolation {
                op,
                key: handle.key(),
            });
        }
        Ok(())
    }

    fn check_holding(&self, handle: &BufHandle<'_>, op: &'static str) -> Result<()> {
        self.check_issued(handle, op)?;

        if !handle.slot().lock().holding() {
            error!(
                "[BCACHE] {} on {}: {} lock not held by caller",
                op,
                handle.key(),
                handle.slot().lock().name()
            );
            return Err(Error::ProtocolViolation {
                op,
                key: handle.key(),
            });
        }
        Ok(())
    }

    /// Run `f` on the handle's metadata under its bucket lock.
    fn with_meta<R>(
        &self,
        handle: &BufHandle<'_>,
        f: impl FnOnce(&mut SlotMeta) -> Result<R>,
    ) -> Result<R> {
        let key = handle.key();
        let mut list = self.buckets[self.bucket_index(key.blockno)].lock();

        match list.get_mut(handle.slot_id()) {
            Some(meta) => f(meta),
            None => unreachable!("{} holding {} is not in its home bucket", handle.slot_id(), key),
        }
    }
}
