//! Heap file header.

use crate::types::{DataSetId, HeapOffset};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Magic number for colheap files.
pub const HEAP_MAGIC: u64 = 0x434F_4C48_4541_5031; // "COLHEAP1"

/// Current heap format version.
pub const HEAP_VERSION: u32 = 1;

/// Fixed size of the heap header in bytes.
pub const HEADER_SIZE: usize = 128;

/// Heap file header.
///
/// Stored at the beginning of every heap file. Because it occupies offset 0,
/// no allocation can ever resolve to the null offset.
#[derive(Debug, Clone, Copy)]
pub struct HeapHeader {
    /// Magic number for file identification.
    pub magic: u64,
    /// Heap format version.
    pub version: u32,
    /// Flags (reserved for future use).
    pub flags: u32,
    /// Data set that owns this heap.
    pub dataset_id: DataSetId,
    /// Current bump cursor (end of live allocations).
    pub cursor: HeapOffset,
    /// Total capacity of the heap file.
    pub capacity: u64,
    /// Offset of the data set directory, or null before one is written.
    pub root: HeapOffset,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Reserved for future use.
    pub _reserved: [u8; 64],
}

impl HeapHeader {
    /// Create a new header for the given data set.
    pub fn new(dataset_id: DataSetId, capacity: u64) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            magic: HEAP_MAGIC,
            version: HEAP_VERSION,
            flags: 0,
            dataset_id,
            cursor: HeapOffset::new(HEADER_SIZE as u64),
            capacity,
            root: HeapOffset::NULL,
            created_at: now,
            _reserved: [0u8; 64],
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.magic != HEAP_MAGIC {
            return Err("Invalid magic number");
        }
        if self.version != HEAP_VERSION {
            return Err("Unsupported heap version");
        }
        if self.cursor.as_u64() < HEADER_SIZE as u64 {
            return Err("Cursor lies inside the header");
        }
        if self.cursor.as_u64() > self.capacity {
            return Err("Cursor exceeds capacity");
        }
        if !self.root.is_null() && self.root.as_u64() >= self.cursor.as_u64() {
            return Err("Root lies beyond the cursor");
        }
        Ok(())
    }

    /// Read header from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Buffer too small for header",
            ));
        }

        let mut cursor = io::Cursor::new(bytes);

        let magic = cursor.read_u64::<LittleEndian>()?;
        let version = cursor.read_u32::<LittleEndian>()?;
        let flags = cursor.read_u32::<LittleEndian>()?;

        let mut uuid_bytes = [0u8; 16];
        cursor.read_exact(&mut uuid_bytes)?;
        let dataset_id = DataSetId::from_uuid(uuid::Uuid::from_bytes(uuid_bytes));

        let heap_cursor = HeapOffset::new(cursor.read_u64::<LittleEndian>()?);
        let capacity = cursor.read_u64::<LittleEndian>()?;
        let root = HeapOffset::new(cursor.read_u64::<LittleEndian>()?);
        let created_at = cursor.read_u64::<LittleEndian>()?;

        let mut reserved = [0u8; 64];
        cursor.read_exact(&mut reserved)?;

        Ok(Self {
            magic,
            version,
            flags,
            dataset_id,
            cursor: heap_cursor,
            capacity,
            root,
            created_at,
            _reserved: reserved,
        })
    }

    /// Write header to a byte buffer.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);

        buf.write_u64::<LittleEndian>(self.magic)?;
        buf.write_u32::<LittleEndian>(self.version)?;
        buf.write_u32::<LittleEndian>(self.flags)?;
        buf.write_all(self.dataset_id.as_uuid().as_bytes())?;
        buf.write_u64::<LittleEndian>(self.cursor.as_u64())?;
        buf.write_u64::<LittleEndian>(self.capacity)?;
        buf.write_u64::<LittleEndian>(self.root.as_u64())?;
        buf.write_u64::<LittleEndian>(self.created_at)?;
        buf.write_all(&self._reserved)?;

        debug_assert_eq!(buf.len(), HEADER_SIZE);

        Ok(buf)
    }
}
