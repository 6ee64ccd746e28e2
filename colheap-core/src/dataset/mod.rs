//! The data set: a heap plus the directory of its columns.
//!
//! The directory lives at the heap root and holds, per column, the offset of
//! its record and of its scratch storage. The data set is the row-count
//! authority and owns the row filter, which is kept for the session only.
//!
//! ```text
//! root ──► DataSetRecord { row_count, column_count, .., columns }
//!                                                        │
//!          ┌─────────────────────────────────────────────┘
//!          ▼
//!          [ ColumnSlot { record, scratch } ; column_count ]
//!                          │        │
//!                          ▼        ▼
//!                 ColumnRecord   ColumnStorage (previous representation)
//! ```

use crate::column::record::{ColumnRecord, ColumnSlot, ColumnStorage, DataSetRecord};
use crate::column::{Column, ColumnW};
use crate::error::{HeapError, Result};
use crate::heap::{Heap, HeapConfig};
use crate::types::{ColumnId, DataSetId, HeapOffset};
use std::mem::size_of;
use std::path::Path;

/// Initial capacity of the column directory; doubles from here.
pub const INITIAL_COLUMN_SLOTS: usize = 16;

/// A set of equally long columns stored in one heap.
pub struct DataSet {
    pub(crate) heap: Heap,
    root: HeapOffset,
    filtered: Vec<bool>,
}

impl DataSet {
    /// Create an empty data set in a new heap.
    pub fn create(config: &HeapConfig) -> Result<Self> {
        let mut heap = Heap::create(DataSetId::new(), config)?;
        let root = heap.allocate(size_of::<DataSetRecord>())?;
        heap.write(
            root,
            DataSetRecord {
                row_count: 0,
                column_count: 0,
                columns_capacity: 0,
                next_id: 0,
                columns: HeapOffset::NULL,
            },
        )?;
        heap.set_root(root)?;

        tracing::info!(dataset = %heap.dataset_id(), "created data set");

        Ok(Self {
            heap,
            root,
            filtered: Vec::new(),
        })
    }

    /// Reopen a data set from its heap file.
    pub fn open(path: impl AsRef<Path>, config: &HeapConfig) -> Result<Self> {
        let heap = Heap::open(path, config)?;
        let root = heap.root();
        if root.is_null() {
            return Err(HeapError::HeapCorruption {
                offset: root,
                cause: "Heap has no data set directory".to_string(),
            });
        }

        let directory: DataSetRecord = heap.read(root)?;
        tracing::info!(
            dataset = %heap.dataset_id(),
            columns = directory.column_count,
            rows = directory.row_count,
            "opened data set"
        );

        Ok(Self {
            heap,
            root,
            filtered: vec![false; directory.row_count as usize],
        })
    }

    /// Get the data set id.
    pub fn id(&self) -> DataSetId {
        self.heap.dataset_id()
    }

    /// Get the path of the backing heap file.
    pub fn path(&self) -> &Path {
        self.heap.path()
    }

    /// Get the underlying heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    fn directory(&self) -> Result<DataSetRecord> {
        self.heap.read(self.root)
    }

    fn write_directory(&mut self, directory: DataSetRecord) -> Result<()> {
        self.heap.write(self.root, directory)
    }

    fn slot_offset(&self, index: usize) -> Result<HeapOffset> {
        let directory = self.directory()?;
        if index >= directory.column_count as usize {
            return Err(HeapError::ColumnNotFound {
                index,
                count: directory.column_count as usize,
            });
        }
        Ok(directory
            .columns
            .add((index * size_of::<ColumnSlot>()) as u64))
    }

    fn slot(&self, index: usize) -> Result<ColumnSlot> {
        self.heap.read(self.slot_offset(index)?)
    }

    /// Number of rows.
    pub fn row_count(&self) -> Result<usize> {
        Ok(self.directory()?.row_count as usize)
    }

    /// Number of columns.
    pub fn column_count(&self) -> Result<usize> {
        Ok(self.directory()?.column_count as usize)
    }

    /// Add an integer column with the current row count, all cells missing.
    pub fn append_column(&mut self, name: &str) -> Result<ColumnW<'_>> {
        let directory = self.directory()?;
        let index = directory.column_count as usize;

        if index == directory.columns_capacity as usize {
            let capacity = if index == 0 {
                INITIAL_COLUMN_SLOTS
            } else {
                index * 2
            };
            let fresh = self.heap.allocate_array::<ColumnSlot>(capacity)?;
            self.heap
                .copy_within(directory.columns, fresh, index * size_of::<ColumnSlot>())?;

            let mut directory = self.directory()?;
            directory.columns = fresh;
            directory.columns_capacity = capacity as u32;
            self.write_directory(directory)?;
        }

        let record = self.heap.allocate(size_of::<ColumnRecord>())?;
        let mut directory = self.directory()?;
        let id = ColumnId::new(directory.next_id);
        self.heap.write(record, ColumnRecord::new(id))?;
        self.heap.write(
            directory
                .columns
                .add((index * size_of::<ColumnSlot>()) as u64),
            ColumnSlot {
                record,
                scratch: HeapOffset::NULL,
            },
        )?;

        directory.column_count += 1;
        directory.next_id += 1;
        self.write_directory(directory)?;

        tracing::debug!(column = %id, name, index, "appended column");

        let row_count = directory.row_count as usize;
        let mut column = ColumnW::new(self, index, record);
        column.set_name(name)?;
        column.set_import_name(name)?;
        column.set_row_count(row_count)?;
        Ok(column)
    }

    /// Get a read-only view of a column.
    pub fn column(&self, index: usize) -> Result<Column<'_>> {
        Column::load(&self.heap, self.slot(index)?.record)
    }

    /// Open a column for writing.
    pub fn column_mut(&mut self, index: usize) -> Result<ColumnW<'_>> {
        let record = self.slot(index)?.record;
        Ok(ColumnW::new(self, index, record))
    }

    /// Find a column's index by name.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        for index in 0..self.column_count()? {
            if self.column(index)?.name()? == name {
                return Ok(index);
            }
        }
        Err(HeapError::ColumnNameNotFound {
            name: name.to_string(),
        })
    }

    /// Get a read-only view of a column by name.
    pub fn column_by_name(&self, name: &str) -> Result<Column<'_>> {
        self.column(self.column_index(name)?)
    }

    /// Open a column for writing by name.
    pub fn column_mut_by_name(&mut self, name: &str) -> Result<ColumnW<'_>> {
        let index = self.column_index(name)?;
        self.column_mut(index)
    }

    /// Whether a row is currently filtered out.
    pub fn is_row_filtered(&self, row: usize) -> bool {
        self.filtered.get(row).copied().unwrap_or(false)
    }

    /// Filter a row in or out, then recount every column's levels.
    pub fn set_row_filtered(&mut self, row: usize, filtered: bool) -> Result<()> {
        let row_count = self.row_count()?;
        if row >= row_count {
            return Err(HeapError::InvalidRowRange {
                start: row,
                end: row,
                row_count,
            });
        }
        if self.filtered[row] == filtered {
            return Ok(());
        }

        self.filtered[row] = filtered;
        for index in 0..self.column_count()? {
            self.column_mut(index)?.update_level_counts()?;
        }
        Ok(())
    }

    /// Resize every column to `row_count` rows.
    pub fn set_row_count(&mut self, row_count: usize) -> Result<()> {
        for index in 0..self.column_count()? {
            self.column_mut(index)?.set_row_count(row_count)?;
        }

        let mut directory = self.directory()?;
        directory.row_count = row_count as u32;
        self.write_directory(directory)?;
        self.filtered.resize(row_count, false);
        Ok(())
    }

    /// Insert missing rows `start..=end` into every column.
    pub fn insert_rows(&mut self, start: usize, end: usize) -> Result<()> {
        let row_count = self.row_count()?;
        if end < start || start > row_count {
            return Err(HeapError::InvalidRowRange {
                start,
                end,
                row_count,
            });
        }

        for index in 0..self.column_count()? {
            self.column_mut(index)?.insert_rows(start, end)?;
        }

        let inserted = end - start + 1;
        let mut directory = self.directory()?;
        directory.row_count += inserted as u32;
        self.write_directory(directory)?;
        self.filtered
            .splice(start..start, std::iter::repeat_n(false, inserted));

        tracing::debug!(start, end, rows = row_count + inserted, "inserted rows");
        Ok(())
    }

    /// Exchange a column's live storage with its scratch storage, creating
    /// blank scratch storage on first use.
    pub fn swap_with_scratch(&mut self, index: usize) -> Result<()> {
        let mut slot = self.slot(index)?;
        if slot.scratch.is_null() {
            slot.scratch = self.heap.allocate(size_of::<ColumnStorage>())?;
            self.heap.write(slot.scratch, ColumnStorage::blank())?;
            self.heap.write(self.slot_offset(index)?, slot)?;
        }

        let live_at = ColumnRecord::storage_offset(slot.record);
        let live: ColumnStorage = self.heap.read(live_at)?;
        let scratch: ColumnStorage = self.heap.read(slot.scratch)?;
        self.heap.write(live_at, scratch)?;
        self.heap.write(slot.scratch, live)
    }

    /// View a column's previous representation, if it still has one.
    pub fn scratch(&self, index: usize) -> Result<Option<Column<'_>>> {
        let slot = self.slot(index)?;
        if slot.scratch.is_null() {
            return Ok(None);
        }

        let storage: ColumnStorage = self.heap.read(slot.scratch)?;
        if storage.owner().is_none() {
            return Ok(None);
        }

        let record: ColumnRecord = self.heap.read(slot.record)?;
        Column::with_storage(&self.heap, record, storage).map(Some)
    }

    /// Forget a column's previous representation.
    pub fn discard_scratch(&mut self, index: usize) -> Result<()> {
        let slot = self.slot(index)?;
        if slot.scratch.is_null() {
            return Ok(());
        }

        let storage: ColumnStorage = self.heap.read(slot.scratch)?;
        if !storage.owner().is_none() {
            self.heap.write(slot.scratch, ColumnStorage::blank())?;
            tracing::debug!(column = %storage.owner(), "discarded scratch storage");
        }
        Ok(())
    }

    /// Flush the heap to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.heap.flush()
    }

    /// Delete the backing heap file.
    pub fn delete(self) -> Result<()> {
        self.heap.delete()
    }
}

impl std::fmt::Debug for DataSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSet")
            .field("heap", &self.heap)
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{DataType, MISSING_INT, MeasureType};
    use tempfile::tempdir;

    fn dataset(dir: &Path) -> DataSet {
        DataSet::create(&HeapConfig::default().with_directory(dir)).unwrap()
    }

    #[test]
    fn columns_take_current_row_count() {
        let dir = tempdir().unwrap();
        let mut ds = dataset(dir.path());
        ds.set_row_count(5).unwrap();

        let column = ds.append_column("age").unwrap();
        let view = column.view().unwrap();
        assert_eq!(view.row_count(), 5);
        assert_eq!(view.name().unwrap(), "age");
        assert_eq!(view.import_name().unwrap(), "age");
        assert_eq!(view.raw_ivalue(4).unwrap(), MISSING_INT);
        assert_eq!(view.data_type(), DataType::Integer);
        assert_eq!(view.measure_type(), MeasureType::Nominal);
    }

    #[test]
    fn directory_grows_past_initial_slots() {
        let dir = tempdir().unwrap();
        let mut ds = dataset(dir.path());

        for i in 0..40 {
            ds.append_column(&format!("c{}", i)).unwrap();
        }

        assert_eq!(ds.column_count().unwrap(), 40);
        assert_eq!(ds.column(39).unwrap().name().unwrap(), "c39");
        assert_eq!(ds.column(39).unwrap().id(), ColumnId::new(39));
        assert_eq!(ds.column_index("c17").unwrap(), 17);
        assert_eq!(ds.column(40).unwrap_err().code(), "E201");
        assert_eq!(ds.column_by_name("nope").unwrap_err().code(), "E202");
    }

    #[test]
    fn reopen_restores_columns() {
        let dir = tempdir().unwrap();
        let path = {
            let mut ds = dataset(dir.path());
            ds.set_row_count(3).unwrap();
            let mut column = ds.append_column("score").unwrap();
            for (row, value) in [4, 8, 4].into_iter().enumerate() {
                column.set_ivalue(row, value, false).unwrap();
            }
            ds.flush().unwrap();
            ds.path().to_path_buf()
        };

        let ds = DataSet::open(&path, &HeapConfig::default()).unwrap();
        assert_eq!(ds.row_count().unwrap(), 3);
        let column = ds.column_by_name("score").unwrap();
        assert_eq!(column.raw_ivalue(1).unwrap(), 8);
        let counts: Vec<(i32, i32)> = column
            .levels()
            .unwrap()
            .iter()
            .map(|l| (l.value, l.count))
            .collect();
        assert_eq!(counts, vec![(4, 2), (8, 1)]);
    }

    #[test]
    fn scratch_swap_and_discard() {
        let dir = tempdir().unwrap();
        let mut ds = dataset(dir.path());
        ds.append_column("x").unwrap();

        assert!(ds.scratch(0).unwrap().is_none());

        ds.swap_with_scratch(0).unwrap();
        assert_eq!(ds.column(0).unwrap().data_type(), DataType::None);
        let scratch = ds.scratch(0).unwrap().unwrap();
        assert_eq!(scratch.data_type(), DataType::Integer);

        ds.swap_with_scratch(0).unwrap();
        assert_eq!(ds.column(0).unwrap().data_type(), DataType::Integer);
        assert!(ds.scratch(0).unwrap().is_none());

        ds.swap_with_scratch(0).unwrap();
        ds.swap_with_scratch(0).unwrap();
        ds.column_mut(0).unwrap().change_dm_type(DataType::Decimal, MeasureType::None).unwrap();
        assert!(ds.scratch(0).unwrap().is_some());
        ds.discard_scratch(0).unwrap();
        assert!(ds.scratch(0).unwrap().is_none());
    }

    #[test]
    fn filtering_recounts_levels() {
        let dir = tempdir().unwrap();
        let mut ds = dataset(dir.path());
        ds.set_row_count(3).unwrap();
        let mut column = ds.append_column("x").unwrap();
        for row in 0..3 {
            column.set_ivalue(row, 1, false).unwrap();
        }

        ds.set_row_filtered(1, true).unwrap();
        assert!(ds.is_row_filtered(1));
        let level = ds.column(0).unwrap().level(1).unwrap().unwrap();
        assert_eq!((level.count, level.count_ex_filtered), (3, 2));

        let mut column = ds.column_mut(0).unwrap();
        column.set_ivalue(1, 2, false).unwrap();
        let view = column.view().unwrap();
        let one = view.level(1).unwrap().unwrap();
        let two = view.level(2).unwrap().unwrap();
        assert_eq!((one.count, one.count_ex_filtered), (2, 2));
        assert_eq!((two.count, two.count_ex_filtered), (1, 0));

        assert_eq!(ds.set_row_filtered(3, true).unwrap_err().code(), "E203");
    }

    #[test]
    fn filter_columns_count_every_row() {
        let dir = tempdir().unwrap();
        let mut ds = dataset(dir.path());
        ds.set_row_count(2).unwrap();
        let mut column = ds.append_column("F1").unwrap();
        column.set_column_type(crate::column::ColumnType::Filter).unwrap();
        column.set_ivalue(0, 1, false).unwrap();
        column.set_ivalue(1, 1, false).unwrap();

        let level = ds.column(0).unwrap().level(1).unwrap().unwrap();
        assert_eq!((level.count, level.count_ex_filtered), (2, 0));
    }

    #[test]
    fn insert_rows_updates_filter_state() {
        let dir = tempdir().unwrap();
        let mut ds = dataset(dir.path());
        ds.set_row_count(3).unwrap();
        ds.append_column("x").unwrap();
        ds.set_row_filtered(2, true).unwrap();

        ds.insert_rows(1, 2).unwrap();

        assert_eq!(ds.row_count().unwrap(), 5);
        assert_eq!(ds.column(0).unwrap().row_count(), 5);
        assert!(ds.is_row_filtered(4));
        assert!(!ds.is_row_filtered(2));
        assert_eq!(ds.insert_rows(7, 8).unwrap_err().code(), "E203");
    }
}
