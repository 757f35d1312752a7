//! Slot identifier type.

use std::fmt;

/// Identifies a buffer slot in the cache.
///
/// Slots live in a fixed `Vec<Slot>` allocated at construction, so the id is
/// a plain index: `slots[slot_id.0]`.
///
/// # Example
/// ```
/// use blockcache::SlotId;
///
/// let slot = SlotId::new(5);
/// assert_eq!(slot.0, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

impl SlotId {
    /// Create a new SlotId.
    #[inline]
    pub fn new(id: usize) -> Self {
        SlotId(id)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self.0)
    }
}
