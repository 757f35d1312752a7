//! The physical block I/O interface consumed by the cache.

use crate::common::{BlockKey, Error, Result};

/// Synchronous physical block storage.
///
/// The cache calls `read_block` to populate an invalid buffer and
/// `write_block` on an explicit write-through. Both are called while the
/// caller holds the buffer's sleep lock but never while any bucket lock is
/// held, so an implementation may block for as long as the I/O takes.
///
/// Methods take `&self`: implementations serialise access to their own
/// backing store however they see fit.
///
/// Errors are final. The cache performs no retry and returns whatever the
/// device reported unchanged.
pub trait BlockDevice: Send + Sync {
    /// Size in bytes of every block on this device.
    fn block_size(&self) -> usize;

    /// Fill `buf` with the contents of `key`.
    fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` to `key`.
    fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()>;
}

/// Reject buffers that do not match the device block size.
pub(crate) fn check_buffer_size(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::BadBufferSize { expected, actual });
    }
    Ok(())
}
