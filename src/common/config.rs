//! Configuration for the block cache.

use crate::common::{Error, Result};

/// Size of a block payload in bytes (1KB).
///
/// Matches the filesystem block size the cache was sized for; any other
/// size can be chosen per cache through [`CacheConfig::with_block_size`].
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Largest number of distinct blocks a single filesystem operation writes.
pub const MAX_OP_BLOCKS: usize = 10;

/// Default number of buffer slots.
///
/// Three concurrent worst-case operations fit without exhausting the pool.
pub const DEFAULT_SLOTS: usize = MAX_OP_BLOCKS * 3;

/// Default number of buckets.
///
/// A prime, so sequential block numbers spread over every bucket.
pub const DEFAULT_BUCKETS: usize = 13;

/// Sizing of a [`BlockCache`](crate::BlockCache).
///
/// Fixed at construction: the cache only hands out a shared reference to
/// its config, so the pool can never be resized at runtime.
///
/// # Example
/// ```
/// use blockcache::CacheConfig;
///
/// let config = CacheConfig::default().with_slots(3).with_buckets(1);
/// assert!(config.validate().is_ok());
/// assert!(CacheConfig::default().with_buckets(0).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Total number of buffer slots in the pool.
    pub slots: usize,

    /// Number of lock-partitioned buckets.
    pub buckets: usize,

    /// Payload size of every slot, in bytes.
    pub block_size: usize,
}

impl CacheConfig {
    pub fn new(slots: usize, buckets: usize, block_size: usize) -> Self {
        Self {
            slots,
            buckets,
            block_size,
        }
    }

    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    pub fn with_buckets(mut self, buckets: usize) -> Self {
        self.buckets = buckets;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Check that every dimension is non-zero.
    ///
    /// More buckets than slots is allowed; the surplus buckets start empty
    /// and fill up through stealing.
    pub fn validate(&self) -> Result<()> {
        if self.slots == 0 {
            return Err(Error::InvalidConfig("slots must be > 0".into()));
        }
        if self.buckets == 0 {
            return Err(Error::InvalidConfig("buckets must be > 0".into()));
        }
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SLOTS, DEFAULT_BUCKETS, DEFAULT_BLOCK_SIZE)
    }
}
