//! FileDisk - a block device backed by a single file.
//!
//! The [`FileDisk`] serves exactly one device id and handles all direct file
//! operations for it:
//! - Reading and writing blocks
//! - Creating and opening the image file

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::common::{BlockKey, DeviceId, Error, Result};
use crate::storage::block_device::{check_buffer_size, BlockDevice};

/// A fixed-size disk image on the host filesystem.
///
/// # File Layout
/// Blocks are laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Block 0 │ Block 1 │  ...    │ Block N │
/// └─────────┴─────────┴─────────┴─────────┘
/// Offset:  0     bsize   ...    N×bsize
/// ```
///
/// # Thread Safety
/// The file handle sits behind a `Mutex`, so concurrent reads and writes of
/// different blocks are serialised at the device, never inside the cache.
///
/// # Durability
/// Every write is followed by `fsync()`.
pub struct FileDisk {
    file: Mutex<File>,
    dev: DeviceId,
    block_size: usize,
    /// Number of blocks in the image (fixed at creation).
    blocks: u32,
}

impl FileDisk {
    /// Create a new zero-filled image of `blocks` blocks.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(
        path: P,
        dev: DeviceId,
        block_size: usize,
        blocks: u32,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be > 0".into()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        file.set_len(blocks as u64 * block_size as u64)?;
        file.sync_all()?;

        Ok(Self {
            file: Mutex::new(file),
            dev,
            block_size,
            blocks,
        })
    }

    /// Open an existing image. The block count is derived from the file size.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened, or if
    /// it holds more blocks than a `u32` block number can address.
    pub fn open<P: AsRef<Path>>(path: P, dev: DeviceId, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be > 0".into()));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let blocks = u32::try_from(len / block_size as u64).map_err(|_| {
            Error::InvalidConfig(format!(
                "image of {} bytes exceeds u32::MAX blocks of {} bytes",
                len, block_size
            ))
        })?;

        Ok(Self {
            file: Mutex::new(file),
            dev,
            block_size,
            blocks,
        })
    }

    #[inline]
    pub fn dev(&self) -> DeviceId {
        self.dev
    }

    #[inline]
    pub fn block_count(&self) -> u32 {
        self.blocks
    }

    /// Validate `key` and return its byte offset in the image.
    fn offset_of(&self, key: BlockKey) -> Result<u64> {
        if key.dev != self.dev {
            return Err(Error::UnknownDevice(key.dev));
        }
        if key.blockno.0 >= self.blocks {
            return Err(Error::BlockOutOfRange {
                key,
                blocks: self.blocks,
            });
        }
        Ok(key.blockno.0 as u64 * self.block_size as u64)
    }
}

impl BlockDevice for FileDisk {
    #[inline]
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()> {
        check_buffer_size(self.block_size, buf.len())?;
        let offset = self.offset_of(key)?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;

        Ok(())
    }

    fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()> {
        check_buffer_size(self.block_size, buf.len())?;
        let offset = self.offset_of(key)?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        file.sync_all()?;

        Ok(())
    }
}
