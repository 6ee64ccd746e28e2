//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a data set.
///
/// Each data set owns one heap file, named after this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct DataSetId {
    /// UUID bytes in big-endian format.
    bytes: [u8; 16],
}

impl DataSetId {
    /// Create a new random data set ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: *Uuid::new_v4().as_bytes(),
        }
    }

    /// Create a data set ID from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            bytes: *uuid.as_bytes(),
        }
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.bytes)
    }
}

impl Default for DataSetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DataSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dataset_{}", self.as_uuid())
    }
}

impl Serialize for DataSetId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_uuid().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataSetId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let uuid = Uuid::deserialize(deserializer)?;
        Ok(Self::from_uuid(uuid))
    }
}

/// Identifier for a column within a data set.
///
/// Ids are assigned when the column is created and never reused. A column's
/// storage also records the id it last belonged to, which is how the scratch
/// swap tells a previous representation apart from a blank one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ColumnId(i32);

impl ColumnId {
    /// Owner of a blank storage block.
    pub const NONE: Self = Self(-1);

    /// Create a new column ID from a raw value.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    /// Check if this is the blank owner.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col_{}", self.0)
    }
}
