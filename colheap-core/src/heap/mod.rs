//! Memory-mapped relocatable heap.
//!
//! The heap is a single growable region backed by a file. All objects in it
//! refer to one another by offset from the start of the file, so growing the
//! file (which may move the mapping to a new base address) never invalidates a
//! stored reference.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (128 bytes: magic, version, cursor, capacity, root)   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Allocations, bump-allocated and 8-byte aligned               │
//! │   data set directory, column records, row arrays,            │
//! │   level arrays, strings, missing-value rules ...             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Free space up to capacity                                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is ever freed. Growth adds `growth_percent` of the current
//! capacity (50% by default) until the configured maximum is reached.

mod config;
mod header;
mod region;

pub use config::{DEFAULT_GROWTH_PERCENT, DEFAULT_HEAP_SIZE, HeapConfig, MAX_HEAP_SIZE};
pub use header::{HEADER_SIZE, HEAP_MAGIC, HEAP_VERSION, HeapHeader};
pub use region::{ALLOC_ALIGNMENT, Heap, align_up};
