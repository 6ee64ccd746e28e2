//! Fixed binary layouts of column data inside the heap.
//!
//! All records are `#[repr(C)]` with explicit padding fields, so their
//! layout is stable across builds. Deriving `Pod` rejects any record that
//! would carry implicit padding.

use super::types::{ColumnType, DataType, MeasureType};
use bytemuck::{Pod, Zeroable};
use crate::types::{ColumnId, HeapOffset};
use std::mem::{offset_of, size_of};

/// Initial capacity of row and level arrays; both double from here.
pub(crate) const INITIAL_ARRAY_CAPACITY: usize = 50;

/// Capacity for `needed` elements when growing from `current`.
pub(crate) fn grown_capacity(current: usize, needed: usize) -> usize {
    let mut capacity = if current == 0 {
        INITIAL_ARRAY_CAPACITY
    } else {
        current
    };
    while capacity < needed {
        capacity *= 2;
    }
    capacity
}

/// The representation-dependent part of a column.
///
/// This is the block the scratch swap exchanges. `owner` is the id of the
/// column the representation was last live for; blank storage has
/// [`ColumnId::NONE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct ColumnStorage {
    pub owner: i32,
    pub data_type: u8,
    pub measure_type: u8,
    pub _pad: [u8; 2],
    pub row_count: u32,
    pub row_capacity: u32,
    pub rows: HeapOffset,
    pub levels: HeapOffset,
    pub levels_used: u32,
    pub levels_capacity: u32,
}

impl ColumnStorage {
    pub fn blank() -> Self {
        Self {
            owner: ColumnId::NONE.as_i32(),
            data_type: DataType::None.code(),
            measure_type: MeasureType::None.code(),
            _pad: [0; 2],
            row_count: 0,
            row_capacity: 0,
            rows: HeapOffset::NULL,
            levels: HeapOffset::NULL,
            levels_used: 0,
            levels_capacity: 0,
        }
    }

    pub fn owner(&self) -> ColumnId {
        ColumnId::new(self.owner)
    }
}

/// A column header. Allocated once and never moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct ColumnRecord {
    pub id: i32,
    pub column_type: u8,
    pub active: u8,
    pub auto_measure: u8,
    pub trim_levels: u8,
    pub dps: i32,
    pub formula_capacity: u32,
    pub formula_message_capacity: u32,
    pub missing_values_used: u32,
    pub missing_values_capacity: u32,
    pub _pad: u32,
    pub changes: u64,
    pub name: HeapOffset,
    pub import_name: HeapOffset,
    pub description: HeapOffset,
    pub formula: HeapOffset,
    pub formula_message: HeapOffset,
    pub missing_values: HeapOffset,
    pub storage: ColumnStorage,
}

impl ColumnRecord {
    /// A fresh data column: integer, nominal, no rows.
    pub fn new(id: ColumnId) -> Self {
        Self {
            id: id.as_i32(),
            column_type: ColumnType::Data.code(),
            active: 1,
            auto_measure: 1,
            trim_levels: 1,
            dps: 0,
            formula_capacity: 0,
            formula_message_capacity: 0,
            missing_values_used: 0,
            missing_values_capacity: 0,
            _pad: 0,
            changes: 0,
            name: HeapOffset::NULL,
            import_name: HeapOffset::NULL,
            description: HeapOffset::NULL,
            formula: HeapOffset::NULL,
            formula_message: HeapOffset::NULL,
            missing_values: HeapOffset::NULL,
            storage: ColumnStorage {
                owner: id.as_i32(),
                data_type: DataType::Integer.code(),
                measure_type: MeasureType::Nominal.code(),
                ..ColumnStorage::blank()
            },
        }
    }

    /// Offset of the embedded storage block for a record at `record`.
    pub fn storage_offset(record: HeapOffset) -> HeapOffset {
        record.add(offset_of!(ColumnRecord, storage) as u64)
    }
}

/// One categorical level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct LevelRecord {
    pub value: i32,
    pub count: i32,
    pub count_ex_filtered: i32,
    pub treat_as_missing: u8,
    pub pinned: u8,
    pub _pad: [u8; 2],
    pub label: HeapOffset,
    pub import_value: HeapOffset,
}

/// Operand kinds of a stored missing-value rule.
pub(crate) const OPERAND_TEXT: u8 = 0;
pub(crate) const OPERAND_DECIMAL: u8 = 1;
pub(crate) const OPERAND_INTEGER: u8 = 2;

/// One missing-value rule. `value` holds a string offset, the bits of an
/// `f64`, or a sign-extended `i32`, depending on `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct MissingValueRecord {
    pub kind: u8,
    pub operator: u8,
    pub _pad: [u8; 6],
    pub value: u64,
}

/// The data set directory, pointed to by the heap root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct DataSetRecord {
    pub row_count: u32,
    pub column_count: u32,
    pub columns_capacity: u32,
    pub next_id: i32,
    pub columns: HeapOffset,
}

/// Live record and scratch storage of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct ColumnSlot {
    pub record: HeapOffset,
    pub scratch: HeapOffset,
}

const _: () = {
    assert!(size_of::<ColumnStorage>() == 40);
    assert!(size_of::<ColumnRecord>() == 128);
    assert!(size_of::<LevelRecord>() == 32);
    assert!(size_of::<MissingValueRecord>() == 16);
    assert!(size_of::<DataSetRecord>() == 24);
    assert!(size_of::<ColumnSlot>() == 16);
};
