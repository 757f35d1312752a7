//! Storage layer - the physical block I/O collaborators.
//!
//! This module handles everything below the cache:
//! - [`BlockDevice`] - The synchronous read/write interface the cache calls
//! - [`MemDisk`] - In-memory device with I/O counters and fault injection
//! - [`FileDisk`] - Single-device disk image on the host filesystem
//! - [`BlockBuf`] - A fixed-size block payload

mod block_buf;
mod block_device;
mod file_disk;
mod mem_disk;

pub use block_buf::BlockBuf;
pub use block_device::BlockDevice;
pub use file_disk::FileDisk;
pub use mem_disk::MemDisk;
