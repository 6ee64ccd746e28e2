//! colheap core library
//!
//! Columnar storage for statistical data tables, kept in a single growable,
//! memory-mapped heap so a data set can be shared between processes and can
//! grow without invalidating anything stored in it.
//!
//! # Key Components
//!
//! - **Heap**: a file-backed bump allocator addressed by offsets
//! - **Column**: typed rows, categorical levels with live counts, missing
//!   value rules and type conversion with one level of undo
//! - **DataSet**: the directory of columns, row count and row filter
//!
//! # Example
//!
//! ```ignore
//! use colheap_core::prelude::*;
//!
//! let mut ds = DataSet::create(&HeapConfig::in_memory())?;
//! ds.set_row_count(3)?;
//!
//! let mut column = ds.append_column("score")?;
//! column.set_ivalue(0, 4, false)?;
//! column.change_dm_type(DataType::Decimal, MeasureType::None)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod column;
pub mod dataset;
pub mod error;
pub mod heap;
pub mod prelude;
pub mod types;

// Re-export key types at crate root for convenience
pub use column::{Column, ColumnW, DataType, LevelData, MeasureType, MissingValueRule};
pub use dataset::DataSet;
pub use error::{HeapError, Result};
pub use heap::{Heap, HeapConfig};
pub use types::{ColumnId, DataSetId, HeapOffset};
