//! Categorical levels.
//!
//! Every level-bearing column keeps a packed array of [`LevelRecord`]s with
//! unique values. On integer columns the value is the literal integer; on
//! text columns it is the code stored in the rows, and the codes are kept
//! dense (`0..levels_used`) by renumbering after every removal.

use super::record::{LevelRecord, grown_capacity};
use super::types::{DataType, MISSING_INT};
use super::writer::ColumnW;
use crate::error::{HeapError, Result};
use crate::heap::Heap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::mem::size_of;

/// An owned copy of one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelData {
    /// Integer value, or the row code on text columns.
    pub value: i32,
    /// Display label.
    pub label: String,
    /// The text the level was imported from.
    pub import_value: String,
    /// Rows referencing the level.
    pub count: i32,
    /// Rows referencing the level that are not filtered out.
    pub count_ex_filtered: i32,
    /// Whether missing-value rules match the level.
    pub treat_as_missing: bool,
    /// Pinned levels survive reaching a zero count.
    pub pinned: bool,
}

impl LevelData {
    /// A level whose label and import value are both `label`.
    pub fn new(value: i32, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            value,
            import_value: label.clone(),
            label,
            count: 0,
            count_ex_filtered: 0,
            treat_as_missing: false,
            pinned: false,
        }
    }

    /// Set the import value.
    #[must_use]
    pub fn with_import_value(mut self, import_value: impl Into<String>) -> Self {
        self.import_value = import_value.into();
        self
    }

    /// Pin the level.
    #[must_use]
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    /// Whether the label was edited after import.
    pub fn has_label_changed(&self) -> bool {
        self.label != self.import_value
    }

    pub(crate) fn from_record(record: &LevelRecord, heap: &Heap) -> Result<Self> {
        Ok(Self {
            value: record.value,
            label: heap.read_str(record.label)?.to_string(),
            import_value: heap.read_str(record.import_value)?.to_string(),
            count: record.count,
            count_ex_filtered: record.count_ex_filtered,
            treat_as_missing: record.treat_as_missing != 0,
            pinned: record.pinned != 0,
        })
    }
}

impl ColumnW<'_> {
    /// Make room for `needed` levels.
    fn ensure_level_capacity(&mut self, needed: usize) -> Result<()> {
        let storage = self.storage()?;
        if needed <= storage.levels_capacity as usize {
            return Ok(());
        }

        let capacity = grown_capacity(storage.levels_capacity as usize, needed);
        let fresh = self.ds.heap.allocate_array::<LevelRecord>(capacity)?;
        self.ds.heap.copy_within(
            storage.levels,
            fresh,
            storage.levels_used as usize * size_of::<LevelRecord>(),
        )?;

        let mut storage = self.storage()?;
        storage.levels = fresh;
        storage.levels_capacity = capacity as u32;
        self.write_storage(storage)
    }

    /// Add a level at the end of the array without touching `changes`.
    /// Returns its index.
    pub(super) fn push_level(
        &mut self,
        value: i32,
        label: Option<&str>,
        import_value: Option<&str>,
        pinned: bool,
    ) -> Result<usize> {
        if self.level_index(value)?.is_some() {
            return Err(HeapError::DuplicateLevel {
                column: self.id()?,
                value,
            });
        }

        let default = value.to_string();
        let label = label.unwrap_or(&default);
        let import_value = import_value.unwrap_or(label);
        let treat_as_missing = self.classify(value, label, import_value)?;

        let used = self.storage()?.levels_used as usize;
        self.ensure_level_capacity(used + 1)?;
        let (label, _) = self.ds.heap.write_str(label)?;
        let (import_value, _) = self.ds.heap.write_str(import_value)?;

        let mut storage = self.storage()?;
        self.ds.heap.write(
            storage.levels.add((used * size_of::<LevelRecord>()) as u64),
            LevelRecord {
                value,
                count: 0,
                count_ex_filtered: 0,
                treat_as_missing: u8::from(treat_as_missing),
                pinned: u8::from(pinned),
                _pad: [0; 2],
                label,
                import_value,
            },
        )?;
        storage.levels_used += 1;
        self.write_storage(storage)?;
        Ok(used)
    }

    /// Append a level, ignoring any ordering of the array.
    ///
    /// The label defaults to the value's decimal string and the import value
    /// to the label.
    pub fn append_level(
        &mut self,
        value: i32,
        label: Option<&str>,
        import_value: Option<&str>,
        pinned: bool,
    ) -> Result<()> {
        self.push_level(value, label, import_value, pinned)?;
        self.bump()
    }

    /// Insert a level, keeping the array's order.
    ///
    /// An array of fewer than two levels counts as ascending. An array that
    /// is neither ascending nor descending gets the level at the end.
    pub fn insert_level(
        &mut self,
        value: i32,
        label: Option<&str>,
        import_value: Option<&str>,
        pinned: bool,
    ) -> Result<()> {
        let last = self.push_level(value, label, import_value, pinned)?;
        let levels = self.levels_mut()?;

        let existing = &levels[..last];
        let ascending = existing.windows(2).all(|w| w[0].value < w[1].value);
        let descending = existing.len() >= 2 && existing.windows(2).all(|w| w[0].value > w[1].value);

        if ascending || descending {
            let inserted = levels[last];
            let mut position = last;
            while position > 0 {
                let before = levels[position - 1].value;
                let displaced = if ascending {
                    before > inserted.value
                } else {
                    before < inserted.value
                };
                if !displaced {
                    break;
                }
                levels[position] = levels[position - 1];
                position -= 1;
            }
            levels[position] = inserted;
        }

        self.bump()
    }

    /// Remove the level with the given value.
    ///
    /// Rows still referencing it become missing. On text columns every code
    /// above the removed one moves down by one, in the levels and the rows.
    pub fn remove_level(&mut self, value: i32) -> Result<()> {
        let index = self
            .level_index(value)?
            .ok_or_else(|| self.level_not_found(value))?;

        let levels = self.levels_mut()?;
        let referenced = levels[index].count > 0;
        levels.copy_within(index + 1.., index);

        let mut storage = self.storage()?;
        storage.levels_used -= 1;
        self.write_storage(storage)?;

        if referenced {
            for cell in self.ints_mut()?.iter_mut().filter(|cell| **cell == value) {
                *cell = MISSING_INT;
            }
        }

        if self.types()?.0 == DataType::Text {
            self.renumber_codes_above(value)?;
        }

        self.bump()
    }

    /// Close the gap left by removing text code `removed`.
    fn renumber_codes_above(&mut self, removed: i32) -> Result<()> {
        for level in self.levels_mut()? {
            if level.value > removed {
                level.value -= 1;
            }
        }
        for cell in self.ints_mut()? {
            if *cell != MISSING_INT && *cell > removed {
                *cell -= 1;
            }
        }
        Ok(())
    }

    /// Drop every level. Rows are left untouched.
    pub fn clear_levels(&mut self) -> Result<()> {
        let mut storage = self.storage()?;
        storage.levels_used = 0;
        self.write_storage(storage)?;
        self.bump()
    }

    /// Recompute every level's counts from the rows.
    pub fn update_level_counts(&mut self) -> Result<()> {
        if !self.has_levels()? {
            return Ok(());
        }

        let view = self.view()?;
        let index: HashMap<i32, usize> = view
            .level_records()?
            .iter()
            .enumerate()
            .map(|(i, level)| (level.value, i))
            .collect();

        let mut counts = vec![(0i32, 0i32); index.len()];
        for (row, value) in view.ints()?.iter().enumerate() {
            if *value == MISSING_INT {
                continue;
            }
            let i = *index.get(value).ok_or_else(|| self.level_not_found(*value))?;
            counts[i].0 += 1;
            if self.counts_unfiltered(row)? {
                counts[i].1 += 1;
            }
        }

        for (level, (count, count_ex_filtered)) in self.levels_mut()?.iter_mut().zip(counts) {
            level.count = count;
            level.count_ex_filtered = count_ex_filtered;
        }
        Ok(())
    }

    /// Remove every unpinned level with a zero count, whether or not the
    /// column trims levels automatically.
    pub fn trim_unused_levels(&mut self) -> Result<()> {
        let mut removed = 0usize;
        let mut i = 0;
        loop {
            let level = match self.view()?.level_records()?.get(i) {
                Some(level) => *level,
                None => break,
            };
            if level.count == 0 && level.pinned == 0 {
                self.remove_level(level.value)?;
                removed += 1;
            } else {
                i += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(column = %self.id()?, removed, "trimmed unused levels");
        }
        Ok(())
    }

    /// Replace the level set.
    ///
    /// Integer columns rebuild their levels and recount every row; values
    /// the rows use but `levels` lacks come back as generated levels. Text
    /// columns recode their rows by matching import values; rows whose level
    /// has no match become missing. Unused levels are then trimmed if the
    /// column trims levels. Columns without levels ignore the call.
    pub fn set_levels(&mut self, levels: &[LevelData]) -> Result<()> {
        if !self.has_levels()? {
            return Ok(());
        }

        let rows: Vec<i32> = self.view()?.ints()?.to_vec();

        match self.types()?.0 {
            DataType::Integer => {
                self.clear_levels()?;
                for level in levels {
                    self.push_level(
                        level.value,
                        Some(&level.label),
                        Some(&level.import_value),
                        level.pinned,
                    )?;
                }
                self.bump()?;

                for (row, value) in rows.into_iter().enumerate() {
                    if value != MISSING_INT {
                        self.set_ivalue(row, value, true)?;
                    }
                }
            }
            _ => {
                let old = self.view()?.levels()?;
                let recode: HashMap<i32, i32> = old
                    .iter()
                    .filter_map(|old| {
                        levels
                            .iter()
                            .position(|new| new.import_value == old.import_value)
                            .map(|new| (old.value, new as i32))
                    })
                    .collect();

                self.clear_levels()?;
                for (code, level) in levels.iter().enumerate() {
                    self.push_level(
                        code as i32,
                        Some(&level.label),
                        Some(&level.import_value),
                        level.pinned,
                    )?;
                }
                self.bump()?;

                for (row, value) in rows.into_iter().enumerate() {
                    let code = recode.get(&value).copied().unwrap_or(MISSING_INT);
                    self.set_ivalue(row, code, true)?;
                }
            }
        }

        if self.record()?.trim_levels != 0 {
            self.trim_unused_levels()?;
        }
        Ok(())
    }
}
