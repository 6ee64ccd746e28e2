//! Relocation-stable references into the heap.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset into the memory-mapped heap.
///
/// A raw byte offset from the start of the heap file. Offsets stay valid when
/// the heap grows and its mapping moves; absolute addresses do not, so every
/// reference stored inside the heap is an offset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, Pod, Zeroable,
)]
#[repr(transparent)]
pub struct HeapOffset(u64);

impl HeapOffset {
    /// The null offset. It falls inside the heap header, so no allocation can
    /// ever be placed there.
    pub const NULL: Self = Self(0);

    /// Create a new heap offset.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// Get the raw offset value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Get the raw offset as a `usize` index into the mapping.
    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }

    /// Check if this is the null offset.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Add a byte offset.
    #[must_use]
    pub const fn add(&self, bytes: u64) -> Self {
        Self(self.0 + bytes)
    }
}

impl fmt::Display for HeapOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl From<u64> for HeapOffset {
    fn from(offset: u64) -> Self {
        Self(offset)
    }
}

impl From<usize> for HeapOffset {
    fn from(offset: usize) -> Self {
        Self(offset as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_offset_basic() {
        let offset = HeapOffset::new(0x100);
        assert_eq!(offset.as_u64(), 0x100);
        assert_eq!(offset.as_usize(), 0x100);
        assert!(!offset.is_null());
        assert!(HeapOffset::NULL.is_null());
        assert_eq!(HeapOffset::default(), HeapOffset::NULL);
    }

    #[test]
    fn heap_offset_add() {
        let offset = HeapOffset::new(0x100);
        assert_eq!(offset.add(0x50).as_u64(), 0x150);
    }

    #[test]
    fn heap_offset_display() {
        assert_eq!(format!("{}", HeapOffset::new(0x1234)), "0x00001234");
    }
}
