//! Heap configuration.

use std::path::PathBuf;

/// Default initial heap size: 4 MB.
pub const DEFAULT_HEAP_SIZE: u64 = 4 * 1024 * 1024;

/// Maximum heap size: 4 GB.
pub const MAX_HEAP_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Default growth step, as a percentage of the current capacity.
pub const DEFAULT_GROWTH_PERCENT: u32 = 50;

/// Configuration for heap creation and growth.
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Initial capacity in bytes.
    pub capacity: u64,
    /// Upper bound the heap may grow to.
    pub max_capacity: u64,
    /// Percentage added to the capacity on each growth step.
    pub growth_percent: u32,
    /// Directory for heap files.
    pub directory: PathBuf,
    /// Whether to sync the mapping after every growth and flush.
    pub sync_on_write: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HEAP_SIZE,
            max_capacity: MAX_HEAP_SIZE,
            growth_percent: DEFAULT_GROWTH_PERCENT,
            directory: std::env::temp_dir().join("colheap"),
            sync_on_write: false,
        }
    }
}

impl HeapConfig {
    /// Create a throwaway configuration for testing.
    ///
    /// Uses a temporary directory with a unique name per invocation.
    pub fn in_memory() -> Self {
        Self {
            capacity: 64 * 1024,
            directory: std::env::temp_dir().join(format!("colheap_{}", uuid::Uuid::new_v4())),
            ..Self::default()
        }
    }

    /// Set the initial capacity.
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity.min(self.max_capacity);
        self
    }

    /// Set the maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity.min(MAX_HEAP_SIZE);
        self.capacity = self.capacity.min(self.max_capacity);
        self
    }

    /// Set the growth step. Values below 1% are raised to 1%.
    pub fn with_growth_percent(mut self, percent: u32) -> Self {
        self.growth_percent = percent.max(1);
        self
    }

    /// Set the directory for heap files.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Enable sync on write for durability.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }
}
