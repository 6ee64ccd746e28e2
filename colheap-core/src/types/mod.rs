//! Core types for colheap.
//!
//! - `DataSetId`: Unique identifier for a heap-backed data set
//! - `ColumnId`: Identifier for a column within a data set
//! - `HeapOffset`: Relocation-stable offset into the heap

mod ids;
mod pointer;

pub use ids::{ColumnId, DataSetId};
pub use pointer::HeapOffset;
