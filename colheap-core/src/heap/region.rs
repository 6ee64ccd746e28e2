//! Heap allocation, growth and address translation.

use super::config::HeapConfig;
use super::header::{HEADER_SIZE, HeapHeader};
use crate::error::{HeapError, Result};
use crate::types::{DataSetId, HeapOffset};
use bytemuck::Pod;
use fs2::FileExt;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::mem::{align_of, size_of};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Every allocation starts on an 8-byte boundary.
pub const ALLOC_ALIGNMENT: usize = 8;

/// Round `size` up to the allocation alignment.
#[must_use]
pub const fn align_up(size: usize) -> usize {
    (size + ALLOC_ALIGNMENT - 1) & !(ALLOC_ALIGNMENT - 1)
}

/// A growable, memory-mapped bump allocator.
///
/// The heap hands out offsets, never addresses. Growth replaces the mapping,
/// so an address obtained from [`Heap::resolve`] (or any slice borrowed from
/// the heap) is only valid until the next allocation; the borrow checker
/// enforces this for the typed accessors.
pub struct Heap {
    /// The memory-mapped file.
    mmap: MmapMut,
    /// The underlying file handle.
    file: File,
    /// Path to the heap file.
    path: PathBuf,
    /// Header information.
    header: HeapHeader,
    /// Bump cursor: every live allocation lies in `[HEADER_SIZE, cursor)`.
    cursor: u64,
    /// Current size of the mapping.
    capacity: u64,
    /// Hard upper bound on growth.
    max_capacity: u64,
    /// Growth step in percent.
    growth_percent: u32,
    /// Whether to sync after growth and header updates.
    sync_on_write: bool,
}

impl Heap {
    /// Create a new heap file for the given data set.
    pub fn create(dataset_id: DataSetId, config: &HeapConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.directory).map_err(|e| HeapError::HeapCreate {
            path: config.directory.clone(),
            cause: e.to_string(),
        })?;

        let path = config
            .directory
            .join(format!("dataset_{}.heap", dataset_id.as_uuid()));
        let capacity = config.capacity.max(2 * HEADER_SIZE as u64);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| HeapError::HeapCreate {
                path: path.clone(),
                cause: e.to_string(),
            })?;

        file.try_lock_exclusive()
            .map_err(|e| HeapError::HeapCreate {
                path: path.clone(),
                cause: format!("Failed to lock file: {}", e),
            })?;

        file.set_len(capacity).map_err(|e| HeapError::HeapCreate {
            path: path.clone(),
            cause: e.to_string(),
        })?;

        let mut mmap = Self::map(&file, capacity, &path)?;

        let header = HeapHeader::new(dataset_id, capacity);
        let header_bytes = header.to_bytes().map_err(|e| HeapError::HeapCreate {
            path: path.clone(),
            cause: e.to_string(),
        })?;
        mmap[..HEADER_SIZE].copy_from_slice(&header_bytes);

        tracing::info!(path = %path.display(), capacity, "created heap");

        Ok(Self {
            mmap,
            file,
            path,
            cursor: header.cursor.as_u64(),
            header,
            capacity,
            max_capacity: config.max_capacity.max(capacity),
            growth_percent: config.growth_percent.max(1),
            sync_on_write: config.sync_on_write,
        })
    }

    /// Open an existing heap file.
    ///
    /// Only the growth policy is taken from `config`; the capacity comes from
    /// the file itself.
    pub fn open(path: impl AsRef<Path>, config: &HeapConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| HeapError::HeapCreate {
                path: path.clone(),
                cause: e.to_string(),
            })?;

        file.try_lock_exclusive()
            .map_err(|e| HeapError::HeapCreate {
                path: path.clone(),
                cause: format!("Failed to lock file: {}", e),
            })?;

        let capacity = file
            .metadata()
            .map_err(|e| HeapError::HeapCreate {
                path: path.clone(),
                cause: e.to_string(),
            })?
            .len();

        if capacity < HEADER_SIZE as u64 {
            return Err(HeapError::HeapCorruption {
                offset: HeapOffset::NULL,
                cause: format!("File is {} bytes, smaller than the header", capacity),
            });
        }

        let mmap = Self::map(&file, capacity, &path)?;

        let mut header =
            HeapHeader::from_bytes(&mmap[..HEADER_SIZE]).map_err(|e| HeapError::HeapCorruption {
                offset: HeapOffset::NULL,
                cause: e.to_string(),
            })?;
        header.capacity = capacity;
        header.validate().map_err(|e| HeapError::HeapCorruption {
            offset: HeapOffset::NULL,
            cause: e.to_string(),
        })?;

        tracing::info!(path = %path.display(), capacity, cursor = header.cursor.as_u64(), "opened heap");

        Ok(Self {
            mmap,
            file,
            path,
            cursor: header.cursor.as_u64(),
            header,
            capacity,
            max_capacity: config.max_capacity.max(capacity),
            growth_percent: config.growth_percent.max(1),
            sync_on_write: config.sync_on_write,
        })
    }

    fn map(file: &File, len: u64, path: &Path) -> Result<MmapMut> {
        // SAFETY: the file is exclusively locked for the lifetime of the heap,
        // so no other process resizes or rewrites it underneath the mapping.
        unsafe {
            MmapOptions::new()
                .len(len as usize)
                .map_mut(file)
                .map_err(|e| HeapError::HeapMmap {
                    path: path.to_path_buf(),
                    cause: e.to_string(),
                })
        }
    }

    /// Get the data set this heap belongs to.
    pub fn dataset_id(&self) -> DataSetId {
        self.header.dataset_id
    }

    /// Get the path to the heap file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the current bump cursor.
    pub fn cursor(&self) -> HeapOffset {
        HeapOffset::new(self.cursor)
    }

    /// Get the current capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Get available space in bytes before the next growth.
    pub fn available_space(&self) -> u64 {
        self.capacity.saturating_sub(self.cursor)
    }

    /// Get the root offset recorded in the header.
    pub fn root(&self) -> HeapOffset {
        self.header.root
    }

    /// Record the root offset in the header.
    pub fn set_root(&mut self, root: HeapOffset) -> Result<()> {
        self.header.root = root;
        self.update_header()
    }

    /// Grow the backing region by `percent` of its current capacity.
    ///
    /// Every byte in `[0, cursor)` keeps its offset and content. The base
    /// address of the mapping may change.
    pub fn enlarge(&mut self, percent: u32) -> Result<()> {
        let from = self.capacity;
        if from >= self.max_capacity {
            return Err(HeapError::HeapCapacity {
                requested: from + 1,
                max: self.max_capacity,
            });
        }

        let step = (from * u64::from(percent) / 100).max(ALLOC_ALIGNMENT as u64);
        let to = (align_up((from + step) as usize) as u64).min(self.max_capacity);

        let grow_err = |path: &Path, cause: String| HeapError::HeapGrow {
            path: path.to_path_buf(),
            from,
            to,
            cause,
        };

        self.mmap
            .flush()
            .map_err(|e| grow_err(&self.path, e.to_string()))?;
        self.file
            .set_len(to)
            .map_err(|e| grow_err(&self.path, e.to_string()))?;
        self.mmap = Self::map(&self.file, to, &self.path)?;

        self.capacity = to;
        self.header.capacity = to;

        tracing::debug!(path = %self.path.display(), from, to, "enlarged heap");
        Ok(())
    }

    fn grow_to_fit(&mut self, end: u64) -> Result<()> {
        if end > self.max_capacity {
            return Err(HeapError::HeapCapacity {
                requested: end,
                max: self.max_capacity,
            });
        }
        while end > self.capacity {
            self.enlarge(self.growth_percent)?;
        }
        Ok(())
    }

    /// Allocate `size` zeroed bytes and return their offset.
    pub fn allocate(&mut self, size: usize) -> Result<HeapOffset> {
        Ok(self.allocate_sized(size)?.0)
    }

    /// Allocate `size` zeroed bytes, returning the offset and the number of
    /// bytes actually reserved (rounded up to the alignment).
    pub fn allocate_sized(&mut self, size: usize) -> Result<(HeapOffset, usize)> {
        let aligned = align_up(size);
        let start = self.cursor;
        let end = start + aligned as u64;

        if end > self.capacity {
            self.grow_to_fit(end)?;
        }

        self.mmap[start as usize..end as usize].fill(0);
        self.cursor = end;

        Ok((HeapOffset::new(start), aligned))
    }

    /// Allocate a zeroed array of `count` elements of `T`.
    pub fn allocate_array<T: Pod>(&mut self, count: usize) -> Result<HeapOffset> {
        debug_assert!(align_of::<T>() <= ALLOC_ALIGNMENT);
        self.allocate(count * size_of::<T>())
    }

    /// Convert a live address inside the mapping to a relocation-stable offset.
    pub fn base(&self, address: *const u8) -> Result<HeapOffset> {
        let start = self.mmap.as_ptr() as usize;
        let addr = address as usize;

        if addr < start || addr > start + self.cursor as usize {
            return Err(HeapError::HeapInvalidOffset {
                offset: HeapOffset::NULL,
                cause: format!("Address {:p} lies outside the live region", address),
            });
        }

        Ok(HeapOffset::new((addr - start) as u64))
    }

    /// Convert an offset to an address in the current mapping.
    ///
    /// The address is invalidated by any call that may grow the heap.
    pub fn resolve(&self, offset: HeapOffset) -> Result<*const u8> {
        self.check_position(offset)?;
        Ok(self.mmap.as_ptr().wrapping_add(offset.as_usize()))
    }

    /// Mutable variant of [`Heap::resolve`].
    pub fn resolve_mut(&mut self, offset: HeapOffset) -> Result<*mut u8> {
        self.check_position(offset)?;
        Ok(self.mmap.as_mut_ptr().wrapping_add(offset.as_usize()))
    }

    fn check_position(&self, offset: HeapOffset) -> Result<()> {
        if offset.as_u64() > self.cursor {
            return Err(HeapError::HeapInvalidOffset {
                offset,
                cause: format!("Offset beyond cursor {}", self.cursor()),
            });
        }
        Ok(())
    }

    fn range(&self, offset: HeapOffset, len: usize) -> Result<Range<usize>> {
        let start = offset.as_usize();
        let end = start
            .checked_add(len)
            .ok_or_else(|| HeapError::HeapInvalidOffset {
                offset,
                cause: format!("Length {} overflows", len),
            })?;

        if start < HEADER_SIZE || end > self.cursor as usize {
            return Err(HeapError::HeapInvalidOffset {
                offset,
                cause: format!(
                    "Range {}..{} outside live region {}..{}",
                    start, end, HEADER_SIZE, self.cursor
                ),
            });
        }

        Ok(start..end)
    }

    /// Read a value of type `T` stored at `offset`.
    pub fn read<T: Pod>(&self, offset: HeapOffset) -> Result<T> {
        let range = self.range(offset, size_of::<T>())?;
        bytemuck::try_from_bytes(&self.mmap[range])
            .copied()
            .map_err(|e| Self::cast_error(offset, e))
    }

    /// Write a value of type `T` at `offset`.
    pub fn write<T: Pod>(&mut self, offset: HeapOffset, value: T) -> Result<()> {
        let range = self.range(offset, size_of::<T>())?;
        let slot = bytemuck::try_from_bytes_mut(&mut self.mmap[range])
            .map_err(|e| Self::cast_error(offset, e))?;
        *slot = value;
        Ok(())
    }

    /// Borrow `len` elements of `T` starting at `offset`.
    pub fn slice<T: Pod>(&self, offset: HeapOffset, len: usize) -> Result<&[T]> {
        if len == 0 {
            return Ok(&[]);
        }
        let range = self.range(offset, len * size_of::<T>())?;
        bytemuck::try_cast_slice(&self.mmap[range]).map_err(|e| Self::cast_error(offset, e))
    }

    /// Mutably borrow `len` elements of `T` starting at `offset`.
    pub fn slice_mut<T: Pod>(&mut self, offset: HeapOffset, len: usize) -> Result<&mut [T]> {
        if len == 0 {
            return Ok(&mut []);
        }
        let range = self.range(offset, len * size_of::<T>())?;
        bytemuck::try_cast_slice_mut(&mut self.mmap[range])
            .map_err(|e| Self::cast_error(offset, e))
    }

    fn cast_error(offset: HeapOffset, error: bytemuck::PodCastError) -> HeapError {
        HeapError::HeapCorruption {
            offset,
            cause: format!("Cannot view bytes as the requested type: {:?}", error),
        }
    }

    /// Copy `bytes` from one allocation to another (non-overlapping or not).
    pub fn copy_within(&mut self, from: HeapOffset, to: HeapOffset, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let src = self.range(from, len)?;
        let dst = self.range(to, len)?;
        self.mmap.copy_within(src, dst.start);
        Ok(())
    }

    /// Copy a string into a fresh allocation as NUL-terminated bytes.
    ///
    /// Returns the offset and the number of bytes reserved.
    pub fn write_str(&mut self, value: &str) -> Result<(HeapOffset, usize)> {
        let (offset, allocated) = self.allocate_sized(value.len() + 1)?;
        self.write_str_at(offset, value)?;
        Ok((offset, allocated))
    }

    /// Overwrite an existing allocation with a NUL-terminated string.
    ///
    /// The caller is responsible for the allocation being large enough.
    pub fn write_str_at(&mut self, offset: HeapOffset, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let range = self.range(offset, bytes.len() + 1)?;
        let dest = &mut self.mmap[range];
        dest[..bytes.len()].copy_from_slice(bytes);
        dest[bytes.len()] = 0;
        Ok(())
    }

    /// Read a NUL-terminated string. The null offset reads as `""`.
    pub fn read_str(&self, offset: HeapOffset) -> Result<&str> {
        if offset.is_null() {
            return Ok("");
        }

        let range = self.range(offset, 0)?;
        let tail = &self.mmap[range.start..self.cursor as usize];
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| HeapError::HeapCorruption {
                offset,
                cause: "Unterminated string".to_string(),
            })?;

        std::str::from_utf8(&tail[..len]).map_err(|e| HeapError::HeapCorruption {
            offset,
            cause: e.to_string(),
        })
    }

    /// Flush the mapping and header to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.update_header()?;
        self.mmap.flush().map_err(|e| HeapError::HeapFlush {
            path: self.path.clone(),
            cause: e.to_string(),
        })
    }

    fn update_header(&mut self) -> Result<()> {
        self.header.cursor = HeapOffset::new(self.cursor);
        self.header.capacity = self.capacity;

        let header_bytes = self.header.to_bytes().map_err(|e| HeapError::HeapFlush {
            path: self.path.clone(),
            cause: e.to_string(),
        })?;
        self.mmap[..HEADER_SIZE].copy_from_slice(&header_bytes);

        if self.sync_on_write {
            self.mmap.flush().map_err(|e| HeapError::HeapFlush {
                path: self.path.clone(),
                cause: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Delete the heap file from disk.
    ///
    /// The heap becomes unusable after this call.
    pub fn delete(self) -> Result<()> {
        let path = self.path.clone();

        // Release the mapping and the file lock first.
        drop(self);

        std::fs::remove_file(&path).map_err(|e| HeapError::Io {
            path,
            cause: format!("Failed to delete heap file: {}", e),
        })
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        // Persist the final cursor before closing.
        let _ = self.update_header();
        let _ = self.mmap.flush();
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("path", &self.path)
            .field("cursor", &self.cursor)
            .field("capacity", &self.capacity)
            .finish()
    }
}
