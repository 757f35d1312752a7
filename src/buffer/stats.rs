//! Block cache statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics tracked by the block cache.
///
/// All fields are atomic for lock-free, thread-safe updates. They are bumped
/// from inside bucket critical sections without adding any ordering of
/// their own.
///
/// # Memory Ordering
/// `Ordering::Relaxed` throughout: counters are independent and only need
/// atomicity, not synchronisation with each other.
///
/// # Example
/// ```
/// use blockcache::CacheStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = CacheStats::new();
/// stats.hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.hits.load(Ordering::Relaxed), 1);
/// ```
#[derive(Debug)]
pub struct CacheStats {
    /// `acquire` found the block already resident.
    pub hits: AtomicU64,

    /// `acquire` had to repurpose a slot for the block.
    pub misses: AtomicU64,

    /// A slot holding another block's identity was repurposed.
    pub evictions: AtomicU64,

    /// A free slot was moved in from another bucket.
    pub steals: AtomicU64,

    /// Physical reads issued by `read_through`.
    pub blocks_read: AtomicU64,

    /// Physical writes issued by `write_through`.
    pub blocks_written: AtomicU64,

    /// `acquire` restarted because a candidate bucket was busy.
    pub contention_retries: AtomicU64,
}

impl CacheStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            steals: AtomicU64::new(0),
            blocks_read: AtomicU64::new(0),
            blocks_written: AtomicU64::new(0),
            contention_retries: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            contention_retries: self.contention_retries.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.steals.store(0, Ordering::Relaxed);
        self.blocks_read.store(0, Ordering::Relaxed);
        self.blocks_written.store(0, Ordering::Relaxed);
        self.contention_retries.store(0, Ordering::Relaxed);
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub steals: u64,
    pub blocks_read: u64,
    pub blocks_written: u64,
    pub contention_retries: u64,
}

impl StatsSnapshot {
    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, steals: {}, reads: {}, writes: {}, hit_rate: {:.2}% }}",
            self.hits,
            self.misses,
            self.evictions,
            self.steals,
            self.blocks_read,
            self.blocks_written,
            self.hit_rate() * 100.0
        )
    }
}
