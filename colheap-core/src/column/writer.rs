//! Mutable access to one column.

use super::missing::{LevelLiteral, MissingValueRule, should_treat_as_missing};
use super::record::{
    ColumnRecord, ColumnStorage, LevelRecord, MissingValueRecord, grown_capacity,
};
use super::types::{ColumnType, DataType, MISSING_INT, MeasureType, RowRepr, has_levels};
use super::view::Column;
use crate::dataset::DataSet;
use crate::error::{HeapError, Result};
use crate::types::{ColumnId, HeapOffset};
use std::mem::{offset_of, size_of};
use std::ops::Range;

/// Selects a growable text field and its capacity inside a record.
type TextField = for<'r> fn(&'r mut ColumnRecord) -> (&'r mut HeapOffset, &'r mut u32);

fn formula_field(record: &mut ColumnRecord) -> (&mut HeapOffset, &mut u32) {
    (&mut record.formula, &mut record.formula_capacity)
}

fn formula_message_field(record: &mut ColumnRecord) -> (&mut HeapOffset, &mut u32) {
    (&mut record.formula_message, &mut record.formula_message_capacity)
}

/// A column opened for writing.
///
/// Holds the data set mutably for its lifetime: the heap may grow on any
/// call, so nothing here keeps an address, only the record's offset.
pub struct ColumnW<'a> {
    pub(super) ds: &'a mut DataSet,
    index: usize,
    record: HeapOffset,
}

impl<'a> ColumnW<'a> {
    pub(crate) fn new(ds: &'a mut DataSet, index: usize, record: HeapOffset) -> Self {
        Self { ds, index, record }
    }

    /// Position of the column in its data set.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Column id.
    pub fn id(&self) -> Result<ColumnId> {
        Ok(ColumnId::new(self.record()?.id))
    }

    /// A read-only view of the column's current state.
    pub fn view(&self) -> Result<Column<'_>> {
        Column::load(&self.ds.heap, self.record)
    }

    pub(super) fn record(&self) -> Result<ColumnRecord> {
        self.ds.heap.read(self.record)
    }

    fn write_record(&mut self, record: ColumnRecord) -> Result<()> {
        self.ds.heap.write(self.record, record)
    }

    pub(super) fn storage(&self) -> Result<ColumnStorage> {
        self.ds.heap.read(ColumnRecord::storage_offset(self.record))
    }

    pub(super) fn write_storage(&mut self, storage: ColumnStorage) -> Result<()> {
        self.ds
            .heap
            .write(ColumnRecord::storage_offset(self.record), storage)
    }

    /// Increment the change counter.
    pub(super) fn bump(&mut self) -> Result<()> {
        let offset = self.record.add(offset_of!(ColumnRecord, changes) as u64);
        let changes: u64 = self.ds.heap.read(offset)?;
        self.ds.heap.write(offset, changes + 1)
    }

    pub(super) fn types(&self) -> Result<(DataType, MeasureType)> {
        let storage = self.storage()?;
        Ok((
            DataType::from_code(storage.data_type)?,
            MeasureType::from_code(storage.measure_type)?,
        ))
    }

    pub(super) fn repr(&self) -> Result<RowRepr> {
        let (data_type, measure_type) = self.types()?;
        Ok(RowRepr::of(data_type, measure_type))
    }

    pub(super) fn has_levels(&self) -> Result<bool> {
        let (data_type, measure_type) = self.types()?;
        Ok(has_levels(data_type, measure_type))
    }

    fn expect_row(&self, repr: RowRepr, row: usize) -> Result<ColumnStorage> {
        let view = self.view()?;
        view.expect_repr(repr)?;
        if row >= view.row_count() {
            return Err(HeapError::RowOutOfRange {
                column: view.id(),
                row,
                row_count: view.row_count(),
            });
        }
        Ok(*view.storage())
    }

    /// Whether a reference from `row` counts towards `count_ex_filtered`.
    pub(super) fn counts_unfiltered(&self, row: usize) -> Result<bool> {
        let column_type = ColumnType::from_code(self.record()?.column_type)?;
        Ok(column_type != ColumnType::Filter && !self.ds.is_row_filtered(row))
    }

    pub(super) fn discard_scratch(&mut self) -> Result<()> {
        self.ds.discard_scratch(self.index)
    }

    pub(super) fn ints_mut(&mut self) -> Result<&mut [i32]> {
        let storage = self.storage()?;
        self.ds
            .heap
            .slice_mut(storage.rows, storage.row_count as usize)
    }

    pub(super) fn levels_mut(&mut self) -> Result<&mut [LevelRecord]> {
        let storage = self.storage()?;
        self.ds
            .heap
            .slice_mut(storage.levels, storage.levels_used as usize)
    }

    pub(super) fn level_index(&self, value: i32) -> Result<Option<usize>> {
        Ok(self
            .view()?
            .level_records()?
            .iter()
            .position(|level| level.value == value))
    }

    pub(super) fn level_not_found(&self, value: i32) -> HeapError {
        HeapError::LevelNotFound {
            column: ColumnId::new(self.record().map_or(ColumnId::NONE.as_i32(), |r| r.id)),
            value,
        }
    }

    /// Whether a level is missing under the current rules.
    pub(super) fn classify(&self, value: i32, label: &str, import_value: &str) -> Result<bool> {
        let rules = self.view()?.missing_values()?;
        Ok(classify_level(&rules, self.types()?.0, value, label, import_value))
    }

    // ---------------------------------------------------------------------
    // Identity
    // ---------------------------------------------------------------------

    fn replace_string(
        &mut self,
        value: &str,
        field: fn(&mut ColumnRecord) -> &mut HeapOffset,
    ) -> Result<()> {
        let (offset, _) = self.ds.heap.write_str(value)?;
        let mut record = self.record()?;
        *field(&mut record) = offset;
        record.changes += 1;
        self.write_record(record)
    }

    fn update(&mut self, apply: impl FnOnce(&mut ColumnRecord)) -> Result<()> {
        let mut record = self.record()?;
        apply(&mut record);
        record.changes += 1;
        self.write_record(record)
    }

    /// Set the column name.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.replace_string(name, |r| &mut r.name)
    }

    /// Set the name the column was imported under.
    pub fn set_import_name(&mut self, name: &str) -> Result<()> {
        self.replace_string(name, |r| &mut r.import_name)
    }

    /// Set the description.
    pub fn set_description(&mut self, description: &str) -> Result<()> {
        self.replace_string(description, |r| &mut r.description)
    }

    /// Set the column type.
    pub fn set_column_type(&mut self, column_type: ColumnType) -> Result<()> {
        self.update(|r| r.column_type = column_type.code())
    }

    /// Set the auto-measure flag.
    pub fn set_auto_measure(&mut self, yes: bool) -> Result<()> {
        self.update(|r| r.auto_measure = u8::from(yes))
    }

    /// Set the number of decimal places used for display.
    pub fn set_dps(&mut self, dps: i32) -> Result<()> {
        self.update(|r| r.dps = dps)
    }

    /// Set the active flag.
    pub fn set_active(&mut self, active: bool) -> Result<()> {
        self.update(|r| r.active = u8::from(active))
    }

    /// Set whether unpinned levels are dropped when unused. Setting the
    /// current value does nothing.
    pub fn set_trim_levels(&mut self, trim: bool) -> Result<()> {
        if (self.record()?.trim_levels != 0) == trim {
            return Ok(());
        }
        self.update(|r| r.trim_levels = u8::from(trim))
    }

    /// Set the data type.
    ///
    /// When the element type of the row array changes, the array is
    /// reallocated at the same row count and filled with missing values.
    pub fn set_data_type(&mut self, data_type: DataType) -> Result<()> {
        let (_, measure_type) = self.types()?;
        self.retype(data_type, measure_type)
    }

    /// Set the measure type. Reallocates rows like [`ColumnW::set_data_type`].
    pub fn set_measure_type(&mut self, measure_type: MeasureType) -> Result<()> {
        let (data_type, _) = self.types()?;
        self.retype(data_type, measure_type)
    }

    fn retype(&mut self, data_type: DataType, measure_type: MeasureType) -> Result<()> {
        let before = self.repr()?;
        let mut storage = self.storage()?;
        storage.data_type = data_type.code();
        storage.measure_type = measure_type.code();
        self.write_storage(storage)?;
        self.bump()?;

        let after = RowRepr::of(data_type, measure_type);
        if after != before {
            self.reallocate_rows(after, storage.row_count as usize)?;
        }
        Ok(())
    }

    fn write_growable_text(&mut self, value: &str, field: TextField) -> Result<()> {
        let mut record = self.record()?;
        let (offset, capacity) = {
            let (offset, capacity) = field(&mut record);
            (*offset, *capacity as usize)
        };

        if value.len() + 1 > capacity {
            let (fresh, allocated) = self.ds.heap.write_str(value)?;
            let mut record = self.record()?;
            let (offset, capacity) = field(&mut record);
            *offset = fresh;
            *capacity = allocated as u32;
            record.changes += 1;
            self.write_record(record)
        } else {
            self.ds.heap.write_str_at(offset, value)?;
            self.bump()
        }
    }

    /// Set the formula text.
    pub fn set_formula(&mut self, formula: &str) -> Result<()> {
        self.write_growable_text(formula, formula_field)
    }

    /// Set the message from the last formula evaluation.
    pub fn set_formula_message(&mut self, message: &str) -> Result<()> {
        self.write_growable_text(message, formula_message_field)
    }

    // ---------------------------------------------------------------------
    // Rows
    // ---------------------------------------------------------------------

    fn fill_missing(&mut self, storage: &ColumnStorage, repr: RowRepr, rows: Range<usize>) -> Result<()> {
        let start = storage.rows.add((rows.start * repr.elem_size()) as u64);
        let len = rows.len();
        match repr {
            RowRepr::Int => self.ds.heap.slice_mut::<i32>(start, len)?.fill(MISSING_INT),
            RowRepr::Float => self.ds.heap.slice_mut::<f64>(start, len)?.fill(f64::NAN),
            RowRepr::Str => self
                .ds
                .heap
                .slice_mut::<HeapOffset>(start, len)?
                .fill(HeapOffset::NULL),
        }
        Ok(())
    }

    /// Make room for `needed` rows, keeping existing cells.
    fn ensure_row_capacity(&mut self, needed: usize) -> Result<ColumnStorage> {
        let storage = self.storage()?;
        if needed <= storage.row_capacity as usize {
            return Ok(storage);
        }

        let elem = self.repr()?.elem_size();
        let capacity = grown_capacity(storage.row_capacity as usize, needed);
        let fresh = self.ds.heap.allocate(capacity * elem)?;
        self.ds
            .heap
            .copy_within(storage.rows, fresh, storage.row_count as usize * elem)?;

        let mut storage = self.storage()?;
        storage.rows = fresh;
        storage.row_capacity = capacity as u32;
        self.write_storage(storage)?;
        Ok(storage)
    }

    /// Replace the row array with a fresh one for `repr`, all cells missing.
    pub(super) fn reallocate_rows(&mut self, repr: RowRepr, row_count: usize) -> Result<()> {
        let capacity = grown_capacity(0, row_count);
        let fresh = self.ds.heap.allocate(capacity * repr.elem_size())?;

        let mut storage = self.storage()?;
        storage.rows = fresh;
        storage.row_capacity = capacity as u32;
        storage.row_count = row_count as u32;
        self.write_storage(storage)?;
        self.fill_missing(&storage, repr, 0..row_count)
    }

    /// Resize the column to `row_count` rows.
    ///
    /// New rows are missing. Dropped rows no longer count towards their
    /// levels. Discards the scratch representation.
    pub(crate) fn set_row_count(&mut self, row_count: usize) -> Result<()> {
        self.discard_scratch()?;

        let repr = self.repr()?;
        let current = self.storage()?.row_count as usize;
        let mut storage = self.ensure_row_capacity(row_count)?;
        if row_count > current {
            self.fill_missing(&storage, repr, current..row_count)?;
        }
        storage.row_count = row_count as u32;
        self.write_storage(storage)?;

        if row_count < current && self.has_levels()? {
            self.update_level_counts()?;
            if self.record()?.trim_levels != 0 {
                self.trim_unused_levels()?;
            }
        }
        self.bump()
    }

    /// Insert missing rows `start..=end`, shifting later rows up.
    ///
    /// Discards the scratch representation, which no longer lines up with
    /// the rows.
    pub(crate) fn insert_rows(&mut self, start: usize, end: usize) -> Result<()> {
        let row_count = self.storage()?.row_count as usize;
        if end < start || start > row_count {
            return Err(HeapError::InvalidRowRange {
                start,
                end,
                row_count,
            });
        }

        self.discard_scratch()?;

        let inserted = end - start + 1;
        let repr = self.repr()?;
        let elem = repr.elem_size();
        let mut storage = self.ensure_row_capacity(row_count + inserted)?;

        self.ds.heap.copy_within(
            storage.rows.add((start * elem) as u64),
            storage.rows.add(((start + inserted) * elem) as u64),
            (row_count - start) * elem,
        )?;
        self.fill_missing(&storage, repr, start..end + 1)?;

        storage.row_count = (row_count + inserted) as u32;
        self.write_storage(storage)?;
        self.bump()
    }

    /// Write a decimal cell.
    ///
    /// Unless `initing`, this is an edit and discards the scratch
    /// representation.
    pub fn set_dvalue(&mut self, row: usize, value: f64, initing: bool) -> Result<()> {
        let storage = self.expect_row(RowRepr::Float, row)?;
        if !initing {
            self.discard_scratch()?;
        }
        self.ds.heap.write(
            storage.rows.add((row * size_of::<f64>()) as u64),
            value,
        )?;
        self.bump()
    }

    /// Write an identifier text cell. The empty string is stored as null.
    pub fn set_svalue(&mut self, row: usize, value: &str, initing: bool) -> Result<()> {
        self.expect_row(RowRepr::Str, row)?;
        if !initing {
            self.discard_scratch()?;
        }

        let offset = if value.is_empty() {
            HeapOffset::NULL
        } else {
            self.ds.heap.write_str(value)?.0
        };

        let storage = self.storage()?;
        self.ds.heap.write(
            storage.rows.add((row * size_of::<HeapOffset>()) as u64),
            offset,
        )?;
        self.bump()
    }

    /// Write an integer cell: a literal integer, or a level code on text
    /// columns.
    ///
    /// On level columns the old value's level loses a reference (and is
    /// removed when that was its last one, unless pinned or trimming is off)
    /// and the new value's level gains one. Integer columns create missing
    /// levels on the fly; text columns require the code to exist.
    ///
    /// With `initing` set the write is part of a bulk load: the old cell is
    /// assumed to hold nothing and the scratch representation is kept.
    pub fn set_ivalue(&mut self, row: usize, value: i32, initing: bool) -> Result<()> {
        self.expect_row(RowRepr::Int, row)?;
        let (data_type, measure_type) = self.types()?;
        let levelled = has_levels(data_type, measure_type);

        if levelled
            && data_type == DataType::Text
            && value != MISSING_INT
            && self.level_index(value)?.is_none()
        {
            return Err(self.level_not_found(value));
        }

        if !initing {
            self.discard_scratch()?;
        }

        let mut value = value;

        if levelled {
            let counted = self.counts_unfiltered(row)?;

            if !initing {
                let old = self.view()?.raw_ivalue(row)?;
                if old == value {
                    return Ok(());
                }
                if old != MISSING_INT {
                    value = self.release_level(old, value, counted)?;
                }
            }

            if value != MISSING_INT {
                let index = match self.level_index(value)? {
                    Some(index) => index,
                    None => {
                        self.insert_level(value, None, None, false)?;
                        self.level_index(value)?
                            .ok_or_else(|| self.level_not_found(value))?
                    }
                };
                let level = &mut self.levels_mut()?[index];
                level.count += 1;
                if counted {
                    level.count_ex_filtered += 1;
                }
            }
        }

        self.ints_mut()?[row] = value;
        self.bump()
    }

    /// Drop one reference to level `old`, returning `new` adjusted for any
    /// renumbering the removal caused.
    fn release_level(&mut self, old: i32, new: i32, counted: bool) -> Result<i32> {
        let index = self
            .level_index(old)?
            .ok_or_else(|| self.level_not_found(old))?;
        let trim = self.record()?.trim_levels != 0;

        let level = &mut self.levels_mut()?[index];
        level.count -= 1;

        if level.count == 0 && level.pinned == 0 && trim {
            self.remove_level(old)?;
            if self.types()?.0 == DataType::Text && new != MISSING_INT && new > old {
                return Ok(new - 1);
            }
        } else if counted {
            level.count_ex_filtered -= 1;
        }
        Ok(new)
    }

    /// Write a categorical text cell by label, creating the level if needed.
    /// The empty string stores a missing value.
    pub fn set_text_value(&mut self, row: usize, label: &str, initing: bool) -> Result<()> {
        let (data_type, measure_type) = self.types()?;
        if data_type != DataType::Text || !has_levels(data_type, measure_type) {
            return Err(HeapError::TypeMismatch {
                column: self.id()?,
                expected: "categorical text".to_string(),
                actual: format!("{} {}", data_type, measure_type),
            });
        }

        if label.is_empty() {
            return self.set_ivalue(row, MISSING_INT, initing);
        }

        let code = match self.view()?.value_for_label(label)? {
            Some(code) => code,
            None => {
                let code = self.storage()?.levels_used as i32;
                self.append_level(code, Some(label), Some(label), false)?;
                code
            }
        };
        self.set_ivalue(row, code, initing)
    }

    // ---------------------------------------------------------------------
    // Missing values
    // ---------------------------------------------------------------------

    /// Replace the missing-value rules and reclassify every level.
    pub fn set_missing_values(&mut self, rules: &[MissingValueRule]) -> Result<()> {
        let record = self.record()?;
        if rules.len() > record.missing_values_capacity as usize {
            let fresh = self.ds.heap.allocate_array::<MissingValueRecord>(rules.len())?;
            let mut record = self.record()?;
            record.missing_values = fresh;
            record.missing_values_capacity = rules.len() as u32;
            self.write_record(record)?;
        }

        for (i, rule) in rules.iter().enumerate() {
            let stored = rule.to_record(&mut self.ds.heap)?;
            let array = self.record()?.missing_values;
            self.ds.heap.write(
                array.add((i * size_of::<MissingValueRecord>()) as u64),
                stored,
            )?;
        }

        let mut record = self.record()?;
        record.missing_values_used = rules.len() as u32;
        record.changes += 1;
        self.write_record(record)?;

        if self.has_levels()? {
            let data_type = self.types()?.0;
            let view = self.view()?;
            let flags = view
                .level_records()?
                .iter()
                .map(|level| {
                    let heap = &self.ds.heap;
                    Ok(classify_level(
                        rules,
                        data_type,
                        level.value,
                        heap.read_str(level.label)?,
                        heap.read_str(level.import_value)?,
                    ))
                })
                .collect::<Result<Vec<bool>>>()?;

            for (level, missing) in self.levels_mut()?.iter_mut().zip(flags) {
                level.treat_as_missing = u8::from(missing);
            }
        }
        Ok(())
    }
}

pub(super) fn classify_level(
    rules: &[MissingValueRule],
    data_type: DataType,
    value: i32,
    label: &str,
    import_value: &str,
) -> bool {
    match data_type {
        DataType::Text => should_treat_as_missing(rules, label, LevelLiteral::Text(import_value)),
        DataType::Integer => should_treat_as_missing(rules, label, LevelLiteral::Integer(value)),
        _ => false,
    }
}

impl std::fmt::Debug for ColumnW<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnW")
            .field("index", &self.index)
            .field("record", &self.record)
            .finish()
    }
}
