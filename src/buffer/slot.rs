//! Slot - one buffer in the cache.
//!
//! A slot is split in two halves that are guarded differently:
//! - [`SlotMeta`] (identity, reference count, pin count, list position)
//!   lives inside the owning bucket's list and is only touched under that
//!   bucket's lock.
//! - [`Slot`] (payload and validity) is shared by the whole cache and
//!   the payload is only touched by the holder of the slot's sleep lock.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::buffer::sleep_lock::SleepLock;
use crate::common::{BlockKey, SlotId};
use crate::storage::BlockBuf;

/// Bookkeeping for a slot, guarded by its bucket's lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotMeta {
    /// The block this slot caches, or None if the slot was never used.
    pub key: Option<BlockKey>,

    /// Live handles plus outstanding pins. Zero means evictable.
    pub refcnt: u32,

    /// Outstanding pins (included in `refcnt`).
    pub pins: u32,
}

impl SlotMeta {
    /// Can this slot be repurposed for another block?
    #[inline]
    pub fn is_free(&self) -> bool {
        self.refcnt == 0
    }

    #[inline]
    pub fn holds(&self, key: BlockKey) -> bool {
        self.key == Some(key)
    }
}

/// The shared half of a buffer slot.
///
/// # Thread Safety
/// - `valid`: `AtomicBool` — cleared under the bucket lock when the slot is
///   repurposed (no one holds the sleep lock then, since `refcnt == 0`),
///   set by the sleep-lock holder after a physical read
/// - `lock`: `SleepLock` — exclusive access to the payload
pub struct Slot {
    id: SlotId,
    valid: AtomicBool,
    lock: SleepLock<BlockBuf>,
}

impl Slot {
    pub fn new(id: SlotId, block_size: usize) -> Self {
        Self {
            id,
            valid: AtomicBool::new(false),
            lock: SleepLock::new(BlockBuf::new(block_size), "buffer"),
        }
    }

    #[inline]
    pub fn id(&self) -> SlotId {
        self.id
    }

    #[inline]
    pub fn lock(&self) -> &SleepLock<BlockBuf> {
        &self.lock
    }

    /// Does the payload reflect what is on the device?
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::Release);
    }
}
