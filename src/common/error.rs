//! Error types for the block cache.

use thiserror::Error;

use crate::common::{BlockKey, DeviceId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in the block cache.
///
/// None of these are retried or masked by the cache: protocol violations and
/// pool exhaustion are caller bugs or overload, and device errors are passed
/// through exactly as the [`BlockDevice`](crate::storage::BlockDevice)
/// returned them.
#[derive(Debug, Error)]
pub enum Error {
    /// A buffer operation was invoked without holding the buffer's lock.
    ///
    /// Also reported when a handle is presented to a cache that did not
    /// issue it. Indicates a caller-side bug.
    #[error("protocol violation: {op} on block {key} without holding its buffer lock")]
    ProtocolViolation { op: &'static str, key: BlockKey },

    /// Every slot in every bucket has a non-zero reference count.
    #[error("no free buffers: all {slots} slots are in use")]
    NoFreeBuffers { slots: usize },

    /// `unpin` was called more times than `pin`.
    #[error("block {0} is not pinned")]
    NotPinned(BlockKey),

    /// I/O error from the backing device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device has no such block.
    #[error("block {key} out of range (device has {blocks} blocks)")]
    BlockOutOfRange { key: BlockKey, blocks: u32 },

    /// The device does not serve this device id.
    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),

    /// A read or write buffer does not match the device's block size.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BadBufferSize { expected: usize, actual: usize },

    /// Rejected cache configuration.
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
}
