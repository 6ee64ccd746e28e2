//! Read-only view over one column.

use super::level::LevelData;
use super::missing::MissingValueRule;
use super::record::{ColumnRecord, ColumnStorage, LevelRecord, MissingValueRecord};
use super::types::{ColumnType, DataType, MISSING_INT, MeasureType, RowRepr, has_levels};
use crate::error::{HeapError, Result};
use crate::heap::Heap;
use crate::types::{ColumnId, HeapOffset};
use std::borrow::Cow;

/// A borrowed, read-only view of a column.
///
/// The view pairs the column's identity with one storage block: normally the
/// live one, or the scratch block when inspecting the previous
/// representation. It borrows the heap, so no allocation can happen while a
/// view is alive.
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    heap: &'a Heap,
    record: ColumnRecord,
    storage: ColumnStorage,
    data_type: DataType,
    measure_type: MeasureType,
    column_type: ColumnType,
}

impl<'a> Column<'a> {
    /// Load the column whose record lives at `record`.
    pub(crate) fn load(heap: &'a Heap, record: HeapOffset) -> Result<Self> {
        let record: ColumnRecord = heap.read(record)?;
        Self::with_storage(heap, record, record.storage)
    }

    /// View `record`'s identity over an arbitrary storage block.
    pub(crate) fn with_storage(
        heap: &'a Heap,
        record: ColumnRecord,
        storage: ColumnStorage,
    ) -> Result<Self> {
        Ok(Self {
            heap,
            data_type: DataType::from_code(storage.data_type)?,
            measure_type: MeasureType::from_code(storage.measure_type)?,
            column_type: ColumnType::from_code(record.column_type)?,
            record,
            storage,
        })
    }

    pub(crate) fn storage(&self) -> &ColumnStorage {
        &self.storage
    }

    pub(crate) fn repr(&self) -> RowRepr {
        RowRepr::of(self.data_type, self.measure_type)
    }

    /// Column id.
    pub fn id(&self) -> ColumnId {
        ColumnId::new(self.record.id)
    }

    /// Column name.
    pub fn name(&self) -> Result<&'a str> {
        self.heap.read_str(self.record.name)
    }

    /// Name the column was imported under.
    pub fn import_name(&self) -> Result<&'a str> {
        self.heap.read_str(self.record.import_name)
    }

    /// Free-text description.
    pub fn description(&self) -> Result<&'a str> {
        self.heap.read_str(self.record.description)
    }

    /// What produced the column.
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Storage data type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Measure type.
    pub fn measure_type(&self) -> MeasureType {
        self.measure_type
    }

    /// Whether the measure type follows the data automatically.
    pub fn auto_measure(&self) -> bool {
        self.record.auto_measure != 0
    }

    /// Decimal places used when displaying decimal values.
    pub fn dps(&self) -> i32 {
        self.record.dps
    }

    /// Whether the column is active.
    pub fn active(&self) -> bool {
        self.record.active != 0
    }

    /// Whether unpinned levels are dropped when their count reaches zero.
    pub fn trim_levels(&self) -> bool {
        self.record.trim_levels != 0
    }

    /// Mutation counter for dirty tracking.
    pub fn changes(&self) -> u64 {
        self.record.changes
    }

    /// Formula text.
    pub fn formula(&self) -> Result<&'a str> {
        self.heap.read_str(self.record.formula)
    }

    /// Message from the last formula evaluation.
    pub fn formula_message(&self) -> Result<&'a str> {
        self.heap.read_str(self.record.formula_message)
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.storage.row_count as usize
    }

    /// Allocated row slots.
    pub fn row_capacity(&self) -> usize {
        self.storage.row_capacity as usize
    }

    /// Whether the column keeps a level array.
    pub fn has_levels(&self) -> bool {
        has_levels(self.data_type, self.measure_type)
    }

    /// Number of levels.
    pub fn level_count(&self) -> usize {
        if self.has_levels() {
            self.storage.levels_used as usize
        } else {
            0
        }
    }

    pub(crate) fn level_records(&self) -> Result<&'a [LevelRecord]> {
        self.heap.slice(self.storage.levels, self.level_count())
    }

    fn level_record(&self, value: i32) -> Result<Option<&'a LevelRecord>> {
        Ok(self.level_records()?.iter().find(|l| l.value == value))
    }

    /// All levels in array order.
    pub fn levels(&self) -> Result<Vec<LevelData>> {
        self.level_records()?
            .iter()
            .map(|record| LevelData::from_record(record, self.heap))
            .collect()
    }

    /// The level with the given value.
    pub fn level(&self, value: i32) -> Result<Option<LevelData>> {
        self.level_record(value)?
            .map(|record| LevelData::from_record(record, self.heap))
            .transpose()
    }

    /// Whether a level with this value exists.
    pub fn has_level(&self, value: i32) -> Result<bool> {
        Ok(self.level_record(value)?.is_some())
    }

    /// Whether a level with this label exists.
    pub fn has_level_label(&self, label: &str) -> Result<bool> {
        Ok(self.value_for_label(label)?.is_some())
    }

    /// Value of the first level whose label, or failing that import value,
    /// equals `label`.
    pub fn value_for_label(&self, label: &str) -> Result<Option<i32>> {
        let levels = self.level_records()?;
        for level in levels {
            if self.heap.read_str(level.label)? == label {
                return Ok(Some(level.value));
            }
        }
        for level in levels {
            if self.heap.read_str(level.import_value)? == label {
                return Ok(Some(level.value));
            }
        }
        Ok(None)
    }

    /// Label of the level with the given value.
    pub fn label_for_value(&self, value: i32) -> Result<Option<&'a str>> {
        self.level_record(value)?
            .map(|level| self.heap.read_str(level.label))
            .transpose()
    }

    /// The column's missing-value rules.
    pub fn missing_values(&self) -> Result<Vec<MissingValueRule>> {
        let records: &[MissingValueRecord] = self.heap.slice(
            self.record.missing_values,
            self.record.missing_values_used as usize,
        )?;
        records
            .iter()
            .map(|record| MissingValueRule::from_record(record, self.heap))
            .collect()
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.row_count() {
            return Err(HeapError::RowOutOfRange {
                column: self.id(),
                row,
                row_count: self.row_count(),
            });
        }
        Ok(())
    }

    pub(crate) fn expect_repr(&self, repr: RowRepr) -> Result<()> {
        if self.repr() != repr {
            return Err(HeapError::TypeMismatch {
                column: self.id(),
                expected: repr.name().to_string(),
                actual: self.repr().name().to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn ints(&self) -> Result<&'a [i32]> {
        self.expect_repr(RowRepr::Int)?;
        self.heap.slice(self.storage.rows, self.row_count())
    }

    pub(crate) fn floats(&self) -> Result<&'a [f64]> {
        self.expect_repr(RowRepr::Float)?;
        self.heap.slice(self.storage.rows, self.row_count())
    }

    pub(crate) fn strings(&self) -> Result<&'a [HeapOffset]> {
        self.expect_repr(RowRepr::Str)?;
        self.heap.slice(self.storage.rows, self.row_count())
    }

    /// The raw `i32` cell: an integer, or a level code for text columns.
    pub fn raw_ivalue(&self, row: usize) -> Result<i32> {
        self.check_row(row)?;
        Ok(self.ints()?[row])
    }

    /// The cell as an integer, [`MISSING_INT`] when absent or not numeric.
    ///
    /// Text cells are parsed: categorical cells through their level's import
    /// value, then its label.
    pub fn ivalue(&self, row: usize) -> Result<i32> {
        self.check_row(row)?;
        match self.repr() {
            RowRepr::Int => {
                let value = self.ints()?[row];
                if self.data_type != DataType::Text || value == MISSING_INT {
                    return Ok(value);
                }
                let level = self.level_record(value)?.ok_or(HeapError::LevelNotFound {
                    column: self.id(),
                    value,
                })?;
                let parsed = parse_int(self.heap.read_str(level.import_value)?);
                if parsed != MISSING_INT {
                    return Ok(parsed);
                }
                Ok(parse_int(self.heap.read_str(level.label)?))
            }
            RowRepr::Float => Ok(truncate(self.floats()?[row])),
            RowRepr::Str => Ok(parse_int(self.heap.read_str(self.strings()?[row])?)),
        }
    }

    /// The cell as a decimal, NaN when absent or not numeric.
    pub fn dvalue(&self, row: usize) -> Result<f64> {
        self.dvalue_with(row, false)
    }

    /// Like [`Column::dvalue`], optionally reading `,` as the decimal separator
    /// of text cells.
    pub fn dvalue_with(&self, row: usize, comma_decimal: bool) -> Result<f64> {
        self.check_row(row)?;
        match self.repr() {
            RowRepr::Float => Ok(self.floats()?[row]),
            RowRepr::Int => {
                let value = self.ints()?[row];
                if value == MISSING_INT {
                    return Ok(f64::NAN);
                }
                if self.data_type != DataType::Text {
                    return Ok(f64::from(value));
                }
                let level = self.level_record(value)?.ok_or(HeapError::LevelNotFound {
                    column: self.id(),
                    value,
                })?;
                let parsed = parse_decimal(self.heap.read_str(level.label)?, comma_decimal);
                if !parsed.is_nan() {
                    return Ok(parsed);
                }
                Ok(parse_decimal(
                    self.heap.read_str(level.import_value)?,
                    comma_decimal,
                ))
            }
            RowRepr::Str => Ok(parse_decimal(
                self.heap.read_str(self.strings()?[row])?,
                comma_decimal,
            )),
        }
    }

    /// The cell as display text; `""` when missing.
    pub fn svalue(&self, row: usize) -> Result<Cow<'a, str>> {
        self.check_row(row)?;
        match self.repr() {
            RowRepr::Float => {
                let value = self.floats()?[row];
                if value.is_nan() {
                    Ok(Cow::Borrowed(""))
                } else {
                    Ok(Cow::Owned(format!("{:.*}", self.dps().max(0) as usize, value)))
                }
            }
            RowRepr::Int => {
                let value = self.ints()?[row];
                if value == MISSING_INT {
                    return Ok(Cow::Borrowed(""));
                }
                match self.label_for_value(value)? {
                    Some(label) => Ok(Cow::Borrowed(label)),
                    None if self.data_type == DataType::Text => Err(HeapError::LevelNotFound {
                        column: self.id(),
                        value,
                    }),
                    None => Ok(Cow::Owned(value.to_string())),
                }
            }
            RowRepr::Str => Ok(Cow::Borrowed(self.heap.read_str(self.strings()?[row])?)),
        }
    }

    /// Whether this is a text column of decimals written with `,` as the
    /// decimal separator.
    ///
    /// Every non-empty value must parse as a number once `,` is read as `.`,
    /// none may contain `.`, and at least one must contain `,`.
    pub fn is_comma_decimal_text(&self) -> Result<bool> {
        if self.data_type != DataType::Text {
            return Ok(false);
        }

        let values: Vec<&str> = if self.has_levels() {
            self.level_records()?
                .iter()
                .map(|level| self.heap.read_str(level.label))
                .collect::<Result<_>>()?
        } else {
            self.strings()?
                .iter()
                .map(|offset| self.heap.read_str(*offset))
                .collect::<Result<_>>()?
        };

        let mut any_comma = false;
        for value in values.into_iter().filter(|v| !v.is_empty()) {
            if value.contains('.') || parse_decimal(value, true).is_nan() {
                return Ok(false);
            }
            any_comma |= value.contains(',');
        }
        Ok(any_comma)
    }
}

/// Parse an integer, accepting decimals that fit; [`MISSING_INT`] otherwise.
pub(crate) fn parse_int(text: &str) -> i32 {
    let text = text.trim();
    match text.parse::<i32>() {
        Ok(value) => value,
        Err(_) => text.parse::<f64>().map_or(MISSING_INT, truncate),
    }
}

/// Parse a decimal, NaN when the text is not a number.
pub(crate) fn parse_decimal(text: &str, comma_decimal: bool) -> f64 {
    let text = text.trim();
    let parsed = if comma_decimal {
        text.replace(',', ".").parse::<f64>()
    } else {
        text.parse::<f64>()
    };
    parsed.unwrap_or(f64::NAN)
}

fn truncate(value: f64) -> i32 {
    let truncated = value.trunc();
    if truncated.is_nan() || truncated < f64::from(i32::MIN) || truncated > f64::from(i32::MAX) {
        MISSING_INT
    } else {
        truncated as i32
    }
}
