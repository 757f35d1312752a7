//! Buffer cache management.
//!
//! The buffer cache is the in-memory layer between filesystem code and the
//! block device. It manages a fixed pool of slots, each holding one block,
//! spread over independently locked buckets.
//!
//! # Components
//! - [`BlockCache`] - The main block cache
//! - [`BufHandle`] - Exclusive access to one cached block
//! - [`SleepLock`] - The long-held lock on a slot's payload
//! - [`CacheStats`] - Performance statistics

mod block_cache;
mod bucket;
mod handle;
mod lru_list;
mod sleep_lock;
mod slot;
mod stats;

pub use block_cache::BlockCache;
pub use handle::BufHandle;
pub use lru_list::LruList;
pub use sleep_lock::SleepLock;
pub use stats::{CacheStats, StatsSnapshot};
