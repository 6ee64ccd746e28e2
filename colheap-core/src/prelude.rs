//! Prelude for convenient imports.
//!
//! ```ignore
//! use colheap_core::prelude::*;
//! ```

// Core types
pub use crate::types::{ColumnId, DataSetId, HeapOffset};

// Error handling
pub use crate::error::{HeapError, Result};

// Heap
pub use crate::heap::{Heap, HeapConfig};

// Columns
pub use crate::column::{
    Column, ColumnType, ColumnW, DataType, LevelData, MISSING_INT, MeasureType, MissingValueRule,
    Operand, Operator,
};

// Data set
pub use crate::dataset::DataSet;
