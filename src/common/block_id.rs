//! Block identity types.

use std::fmt;

/// Identifies a block device.
///
/// # Example
/// ```
/// use blockcache::DeviceId;
///
/// let dev = DeviceId::new(1);
/// assert_eq!(dev.0, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// Create a new DeviceId.
    #[inline]
    pub fn new(id: u32) -> Self {
        DeviceId(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dev({})", self.0)
    }
}

/// Identifies a block on a device.
///
/// The home bucket of a block is `blockno mod buckets`, so only the block
/// number (not the device) takes part in bucket selection.
///
/// # Example
/// ```
/// use blockcache::BlockNo;
///
/// let b = BlockNo::new(42);
/// assert_eq!(b.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockNo(pub u32);

impl BlockNo {
    /// Create a new BlockNo.
    #[inline]
    pub fn new(no: u32) -> Self {
        BlockNo(no)
    }
}

impl fmt::Display for BlockNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({})", self.0)
    }
}

/// The cache identity of a block: `(device, block number)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub dev: DeviceId,
    pub blockno: BlockNo,
}

impl BlockKey {
    #[inline]
    pub fn new(dev: DeviceId, blockno: BlockNo) -> Self {
        Self { dev, blockno }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev.0, self.blockno.0)
    }
}
