//! BlockBuf - the payload of one buffer slot.

/// A fixed-size, zero-initialised block payload.
///
/// The size is chosen once when the buffer is created and never changes, so
/// every slot in a cache carries exactly `block_size` bytes.
///
/// # Clone Implementation
/// `BlockBuf` does NOT implement `Clone` in production code (copying a block
/// should be explicit). A `#[cfg(test)]` Clone is provided for tests.
///
/// # Example
/// ```
/// use blockcache::storage::BlockBuf;
///
/// let mut buf = BlockBuf::new(512);
/// buf.as_mut_slice()[0] = 0xFF;
/// assert_eq!(buf.as_slice()[0], 0xFF);
/// assert_eq!(buf.len(), 512);
/// ```
pub struct BlockBuf {
    data: Box<[u8]>,
}

impl BlockBuf {
    /// Create a new zeroed buffer of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire buffer.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
impl Clone for BlockBuf {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}
