//! MemDisk - an in-memory block device.
//!
//! Stores exact bytes per `(device, block)` and counts physical reads and
//! writes, which makes it the device of choice for tests and benchmarks.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{BlockKey, Error, Result};
use crate::storage::block_device::{check_buffer_size, BlockDevice};

struct Inner {
    block_size: usize,
    blocks: Mutex<HashMap<BlockKey, Box<[u8]>>>,
    failing: Mutex<HashSet<BlockKey>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

/// An in-memory, multi-device block store.
///
/// `MemDisk` is a cheap handle over shared storage: clone it before handing
/// it to a cache and keep the clone to inspect what reached "disk".
///
/// Never-written blocks read back as zeros. Any block can be made to fail
/// with [`MemDisk::fail_on`] to exercise error propagation.
///
/// # Example
/// ```
/// use blockcache::storage::{BlockDevice, MemDisk};
/// use blockcache::{BlockKey, BlockNo, DeviceId};
///
/// let disk = MemDisk::new(4);
/// let key = BlockKey::new(DeviceId(1), BlockNo(7));
///
/// disk.write_block(key, &[1, 2, 3, 4]).unwrap();
/// let mut buf = [0u8; 4];
/// disk.read_block(key, &mut buf).unwrap();
/// assert_eq!(buf, [1, 2, 3, 4]);
/// ```
#[derive(Clone)]
pub struct MemDisk {
    inner: Arc<Inner>,
}

impl MemDisk {
    /// Create an empty device with the given block size.
    pub fn new(block_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                block_size,
                blocks: Mutex::new(HashMap::new()),
                failing: Mutex::new(HashSet::new()),
                reads: AtomicU64::new(0),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Number of `read_block` calls that succeeded.
    pub fn read_count(&self) -> u64 {
        self.inner.reads.load(Ordering::Relaxed)
    }

    /// Number of `write_block` calls that succeeded.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Copy of the stored bytes for `key`, or None if never written.
    pub fn contents(&self, key: BlockKey) -> Option<Vec<u8>> {
        self.inner.blocks.lock().get(&key).map(|b| b.to_vec())
    }

    /// Store `data` for `key` without counting a write.
    ///
    /// # Panics
    /// Panics if `data` is not exactly one block long.
    pub fn preload(&self, key: BlockKey, data: &[u8]) {
        assert_eq!(data.len(), self.inner.block_size, "preload size mismatch");
        self.inner.blocks.lock().insert(key, data.into());
    }

    /// Make every subsequent read or write of `key` fail with an I/O error.
    pub fn fail_on(&self, key: BlockKey) {
        self.inner.failing.lock().insert(key);
    }

    /// Undo [`MemDisk::fail_on`].
    pub fn clear_failure(&self, key: BlockKey) {
        self.inner.failing.lock().remove(&key);
    }

    fn check_failure(&self, key: BlockKey) -> Result<()> {
        if self.inner.failing.lock().contains(&key) {
            return Err(Error::Io(io::Error::other(format!(
                "injected failure on block {}",
                key
            ))));
        }
        Ok(())
    }
}

impl BlockDevice for MemDisk {
    #[inline]
    fn block_size(&self) -> usize {
        self.inner.block_size
    }

    fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()> {
        check_buffer_size(self.inner.block_size, buf.len())?;
        self.check_failure(key)?;

        match self.inner.blocks.lock().get(&key) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }

        self.inner.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()> {
        check_buffer_size(self.inner.block_size, buf.len())?;
        self.check_failure(key)?;

        self.inner.blocks.lock().insert(key, buf.into());

        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
