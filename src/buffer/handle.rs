//! BufHandle - a caller's exclusive claim on one cached block.
//!
//! A handle is returned by [`BlockCache::acquire`] with the slot's sleep
//! lock held and a reference counted. It stays valid across any number of
//! calls until it is handed back to [`BlockCache::release`].
//!
//! Dropping an unreleased handle releases it, so an early return or a panic
//! cannot leave the buffer locked forever.

use std::fmt;
use std::ops::{Deref, DerefMut};

use log::debug;

use crate::buffer::block_cache::BlockCache;
use crate::buffer::slot::Slot;
use crate::common::{BlockKey, BlockNo, DeviceId, SlotId};

/// Exclusive access to a cached block.
///
/// # Example
/// ```
/// use blockcache::{BlockCache, BlockNo, CacheConfig, DeviceId};
/// use blockcache::storage::MemDisk;
///
/// let cache = BlockCache::new(CacheConfig::default(), MemDisk::new(1024)).unwrap();
///
/// let mut buf = cache.read(DeviceId(1), BlockNo(7)).unwrap();
/// buf[0] = 0xAB;                // DerefMut to [u8]
/// cache.write_through(&buf).unwrap();
/// cache.release(buf).unwrap();
/// ```
pub struct BufHandle<'a> {
    /// Cache that issued this handle.
    cache: &'a BlockCache,
    slot: &'a Slot,
    key: BlockKey,
    released: bool,
}

impl<'a> BufHandle<'a> {
    /// Called by `BlockCache::acquire()` once the sleep lock is held.
    pub(crate) fn new(cache: &'a BlockCache, slot: &'a Slot, key: BlockKey) -> Self {
        Self {
            cache,
            slot,
            key,
            released: false,
        }
    }

    #[inline]
    pub fn dev(&self) -> DeviceId {
        self.key.dev
    }

    #[inline]
    pub fn blockno(&self) -> BlockNo {
        self.key.blockno
    }

    #[inline]
    pub fn key(&self) -> BlockKey {
        self.key
    }

    #[inline]
    pub fn slot_id(&self) -> SlotId {
        self.slot.id()
    }

    /// Does the payload reflect what is on the device?
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.slot.is_valid()
    }

    /// The block payload.
    #[inline]
    pub fn data(&self) -> &[u8] {
        // The handle owns the sleep lock until it is released or dropped.
        unsafe { (*self.slot.lock().data_ptr()).as_slice() }
    }

    /// The block payload, mutably.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        unsafe { (*self.slot.lock().data_ptr()).as_mut_slice() }
    }

    pub(crate) fn cache(&self) -> &'a BlockCache {
        self.cache
    }

    pub(crate) fn slot(&self) -> &'a Slot {
        self.slot
    }

    /// Mark the handle as handed back so `Drop` does nothing.
    pub(crate) fn mark_released(&mut self) {
        self.released = true;
    }
}

impl Deref for BufHandle<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl DerefMut for BufHandle<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data_mut()
    }
}

impl fmt::Debug for BufHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufHandle")
            .field("key", &self.key)
            .field("slot", &self.slot.id())
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl Drop for BufHandle<'_> {
    fn drop(&mut self) {
        if !self.released {
            debug!("[BCACHE] {} dropped without release", self.key);
            self.cache.release_slot(self.slot, self.key);
        }
    }
}
