//! Error types for colheap.
//!
//! Every variant carries the identifiers needed to locate the fault (heap
//! path, offset, column id, row index). Invariant violations are reported as
//! errors rather than panics, but callers are not expected to recover from
//! them: they indicate a logic error upstream.

use crate::types::{ColumnId, HeapOffset};
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for colheap operations.
#[derive(Error, Debug)]
pub enum HeapError {
    // =========================================================================
    // Heap Errors (E001-E099)
    // =========================================================================
    /// Failed to create or open the heap file.
    #[error("E001: Failed to create heap at {path}: {cause}")]
    HeapCreate {
        /// The path where heap creation failed.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// Failed to memory-map the heap file.
    #[error("E002: Failed to mmap heap at {path}: {cause}")]
    HeapMmap {
        /// The path of the heap file.
        path: PathBuf,
        /// Reason for the mmap failure.
        cause: String,
    },

    /// Growing the backing region failed.
    #[error("E003: Failed to grow heap at {path} from {from} to {to} bytes: {cause}")]
    HeapGrow {
        /// The path of the heap file.
        path: PathBuf,
        /// Capacity before the attempted growth.
        from: u64,
        /// Capacity that was requested.
        to: u64,
        /// Reason for the failure.
        cause: String,
    },

    /// The heap would exceed its configured maximum size.
    #[error("E004: Heap capacity exhausted: requested {requested} bytes, maximum is {max} bytes")]
    HeapCapacity {
        /// Total capacity that would have been needed.
        requested: u64,
        /// Configured maximum capacity.
        max: u64,
    },

    /// An offset does not lie inside the live region.
    #[error("E005: Invalid heap offset {offset}: {cause}")]
    HeapInvalidOffset {
        /// The invalid offset.
        offset: HeapOffset,
        /// Reason why the offset is invalid.
        cause: String,
    },

    /// Heap contents are inconsistent.
    #[error("E006: Heap corruption detected at offset {offset}: {cause}")]
    HeapCorruption {
        /// The offset where corruption was detected.
        offset: HeapOffset,
        /// Description of the corruption.
        cause: String,
    },

    /// Flushing the mapping to disk failed.
    #[error("E007: Failed to flush heap at {path}: {cause}")]
    HeapFlush {
        /// The path of the heap file.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Column Errors (E100-E199)
    // =========================================================================
    /// A cell or level was accessed with the wrong representation.
    #[error("E101: Type mismatch on column {column}: expected {expected}, found {actual}")]
    TypeMismatch {
        /// The column being accessed.
        column: ColumnId,
        /// The representation the operation requires.
        expected: String,
        /// The representation the column actually has.
        actual: String,
    },

    /// A row index past the end of the column.
    #[error("E102: Row {row} out of range on column {column} with {row_count} rows")]
    RowOutOfRange {
        /// The column being accessed.
        column: ColumnId,
        /// The requested row.
        row: usize,
        /// Number of rows in the column.
        row_count: usize,
    },

    /// A level value that should exist does not.
    #[error("E103: Level {value} not found on column {column}")]
    LevelNotFound {
        /// The column being accessed.
        column: ColumnId,
        /// The missing level value.
        value: i32,
    },

    /// A level value that must be unique already exists.
    #[error("E104: Level {value} already exists on column {column}")]
    DuplicateLevel {
        /// The column being accessed.
        column: ColumnId,
        /// The duplicated level value.
        value: i32,
    },

    /// A stored type code is not a known enum value.
    #[error("E105: Invalid {kind} code {code}")]
    InvalidTypeCode {
        /// Which enum was being decoded.
        kind: &'static str,
        /// The raw code.
        code: u8,
    },

    // =========================================================================
    // Data Set Errors (E200-E299)
    // =========================================================================
    /// Column index past the end of the data set.
    #[error("E201: Column {index} not found (data set has {count} columns)")]
    ColumnNotFound {
        /// The requested index.
        index: usize,
        /// Number of columns.
        count: usize,
    },

    /// No column carries the requested name.
    #[error("E202: Column '{name}' not found")]
    ColumnNameNotFound {
        /// The requested name.
        name: String,
    },

    /// A row range that is empty or starts past the end.
    #[error("E203: Invalid row range {start}..={end} for {row_count} rows")]
    InvalidRowRange {
        /// First row of the range.
        start: usize,
        /// Last row of the range (inclusive).
        end: usize,
        /// Current row count.
        row_count: usize,
    },

    // =========================================================================
    // Missing Value Errors (E300-E399)
    // =========================================================================
    /// A missing-value rule string could not be parsed.
    #[error("E301: Invalid missing value rule '{rule}': {cause}")]
    MissingValueSyntax {
        /// The rule text.
        rule: String,
        /// Description of the syntax error.
        cause: String,
    },

    // =========================================================================
    // I/O Errors (E900-E999)
    // =========================================================================
    /// Generic I/O failure.
    #[error("E901: I/O error at {path}: {cause}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },
}

impl HeapError {
    /// Get the error code (e.g. "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::HeapCreate { .. } => "E001",
            Self::HeapMmap { .. } => "E002",
            Self::HeapGrow { .. } => "E003",
            Self::HeapCapacity { .. } => "E004",
            Self::HeapInvalidOffset { .. } => "E005",
            Self::HeapCorruption { .. } => "E006",
            Self::HeapFlush { .. } => "E007",
            Self::TypeMismatch { .. } => "E101",
            Self::RowOutOfRange { .. } => "E102",
            Self::LevelNotFound { .. } => "E103",
            Self::DuplicateLevel { .. } => "E104",
            Self::InvalidTypeCode { .. } => "E105",
            Self::ColumnNotFound { .. } => "E201",
            Self::ColumnNameNotFound { .. } => "E202",
            Self::InvalidRowRange { .. } => "E203",
            Self::MissingValueSyntax { .. } => "E301",
            Self::Io { .. } => "E901",
        }
    }

    /// Check if this error originates in the heap itself.
    #[must_use]
    pub fn is_heap_error(&self) -> bool {
        matches!(
            self,
            Self::HeapCreate { .. }
                | Self::HeapMmap { .. }
                | Self::HeapGrow { .. }
                | Self::HeapCapacity { .. }
                | Self::HeapInvalidOffset { .. }
                | Self::HeapCorruption { .. }
                | Self::HeapFlush { .. }
        )
    }

    /// Check if this error is an invariant violation.
    ///
    /// These leave the data set in an unspecified state; the caller should
    /// treat the affected column as corrupted.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::HeapInvalidOffset { .. }
                | Self::HeapCorruption { .. }
                | Self::TypeMismatch { .. }
                | Self::RowOutOfRange { .. }
                | Self::LevelNotFound { .. }
                | Self::DuplicateLevel { .. }
                | Self::InvalidTypeCode { .. }
        )
    }
}

/// Result type alias using `HeapError`.
pub type Result<T> = std::result::Result<T, HeapError>;
