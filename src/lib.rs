//! blockcache - A sharded LRU block buffer cache.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Filesystem code                           │
//! │        acquire → read_through → write_through → release         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Block Cache (buffer/)                       │   │
//! │  │   ┌──────────┐ ┌──────────┐         ┌──────────┐        │   │
//! │  │   │ Bucket 0 │ │ Bucket 1 │  ...    │ Bucket N │        │   │
//! │  │   │ LRU list │ │ LRU list │         │ LRU list │        │   │
//! │  │   └──────────┘ └──────────┘         └──────────┘        │   │
//! │  │        ↑ steal free slots across buckets ↑               │   │
//! │  │      Slot = SleepLock<BlockBuf> + valid flag             │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │        BlockDevice trait: FileDisk | MemDisk             │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BlockKey, SlotId, Error, config)
//! - [`buffer`] - The block cache, its buckets and slots
//! - [`storage`] - Block devices and block payloads
//!
//! # Quick Start
//! ```
//! use blockcache::{BlockCache, BlockNo, CacheConfig, DeviceId};
//! use blockcache::storage::MemDisk;
//!
//! let cache = BlockCache::new(CacheConfig::default(), MemDisk::new(1024)).unwrap();
//!
//! let mut buf = cache.read(DeviceId(1), BlockNo(42)).unwrap();
//! buf[0] = 7;
//! cache.write_through(&buf).unwrap();
//! cache.release(buf).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::DEFAULT_BLOCK_SIZE;
pub use common::{BlockKey, BlockNo, CacheConfig, DeviceId, Error, Result, SlotId};

pub use buffer::{BlockCache, BufHandle, CacheStats, StatsSnapshot};
