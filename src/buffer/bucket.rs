//! Bucket - one lock domain of the cache.
//!
//! Each bucket doubles as a hash bucket (blocks whose number maps to it)
//! and an LRU list (recency of release among its members).

use parking_lot::{Mutex, MutexGuard};

use crate::buffer::lru_list::LruList;
use crate::buffer::slot::SlotMeta;
use crate::common::{BlockKey, SlotId};

/// A bucket's list of member slots and their metadata.
pub type BucketList = LruList<SlotMeta>;

/// A lock-partitioned shard of the slot pool.
///
/// The bucket lock is a short critical section: it is never held across
/// physical I/O or while blocking on a slot's sleep lock.
pub struct Bucket {
    list: Mutex<BucketList>,
}

impl Bucket {
    pub fn new() -> Self {
        Self {
            list: Mutex::new(LruList::new()),
        }
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, BucketList> {
        self.list.lock()
    }

    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, BucketList>> {
        self.list.try_lock()
    }
}

impl Default for Bucket {
    fn default() -> Self {
        Self::new()
    }
}

impl LruList<SlotMeta> {
    /// Find the member caching `key`, scanning from most recent.
    pub fn lookup(&self, key: BlockKey) -> Option<SlotId> {
        self.iter()
            .find(|(_, meta)| meta.holds(key))
            .map(|(id, _)| id)
    }

    /// Find the least recently released member with no references.
    pub fn victim(&self) -> Option<SlotId> {
        self.iter_lru()
            .find(|(_, meta)| meta.is_free())
            .map(|(id, _)| id)
    }

    /// Number of members with no references.
    pub fn free_count(&self) -> usize {
        self.iter().filter(|(_, meta)| meta.is_free()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{BlockNo, DeviceId};

    fn key(blockno: u32) -> BlockKey {
        BlockKey::new(DeviceId(1), BlockNo(blockno))
    }

    fn meta(blockno: u32, refcnt: u32) -> SlotMeta {
        SlotMeta {
            key: Some(key(blockno)),
            refcnt,
            pins: 0,
        }
    }

    #[test]
    fn test_lookup() {
        let bucket = Bucket::new();
        let mut list = bucket.lock();
        list.push_front(SlotId(0), meta(10, 0));
        list.push_front(SlotId(1), meta(20, 1));
        list.push_front(SlotId(2), SlotMeta::default());

        assert_eq!(list.lookup(key(10)), Some(SlotId(0)));
        assert_eq!(list.lookup(key(20)), Some(SlotId(1)));
        assert_eq!(list.lookup(key(30)), None);
        assert_eq!(
            list.lookup(BlockKey::new(DeviceId(2), BlockNo(10))),
            None
        );
    }

    #[test]
    fn test_victim_prefers_least_recent_free() {
        let bucket = Bucket::new();
        let mut list = bucket.lock();
        list.push_front(SlotId(0), meta(1, 1)); // busy, least recent
        list.push_front(SlotId(1), meta(2, 0)); // free
        list.push_front(SlotId(2), meta(3, 0)); // free, most recent

        assert_eq!(list.victim(), Some(SlotId(1)));
        assert_eq!(list.free_count(), 2);

        list.get_mut(SlotId(1)).unwrap().refcnt = 1;
        assert_eq!(list.victim(), Some(SlotId(2)));

        list.get_mut(SlotId(2)).unwrap().refcnt = 1;
        assert_eq!(list.victim(), None);
        assert_eq!(list.free_count(), 0);
    }

    #[test]
    fn test_try_lock_fails_while_held() {
        let bucket = Bucket::new();

        let guard = bucket.lock();
        assert!(bucket.try_lock().is_none());
        drop(guard);
        assert!(bucket.try_lock().is_some());
    }
}
