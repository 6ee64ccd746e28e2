//! Data type and measure type conversion.
//!
//! A conversion swaps the column's storage with its scratch block, then
//! rebuilds the live block from the one it just displaced. The displaced
//! block stays in scratch, so converting back to the previous type pair
//! before any edit simply swaps the two blocks again.

use super::level::LevelData;
use super::types::{DataType, MISSING_INT, MeasureType, RowRepr, has_levels};
use super::view::{Column, parse_int};
use super::writer::ColumnW;
use crate::error::{HeapError, Result};
use crate::types::HeapOffset;
use std::collections::{BTreeSet, HashMap, HashSet};

type TypePair = (DataType, MeasureType);

/// Fill in the parts of a requested type pair left as `None`, given the pair
/// the column currently has.
pub(crate) fn resolve_types(requested: TypePair, prior: TypePair) -> TypePair {
    let (mut data_type, mut measure_type) = requested;

    if measure_type != MeasureType::None {
        if measure_type == MeasureType::Continuous {
            if matches!(data_type, DataType::Text | DataType::None) {
                data_type = if prior.0 == DataType::Integer {
                    DataType::Integer
                } else {
                    DataType::Decimal
                };
            }
        } else if matches!(data_type, DataType::Decimal | DataType::None) {
            data_type = if prior.0 == DataType::Integer {
                DataType::Integer
            } else {
                DataType::Text
            };
        }
    } else if data_type == DataType::Decimal {
        measure_type = MeasureType::Continuous;
    } else if data_type == DataType::Text && prior.1 == MeasureType::Continuous {
        measure_type = MeasureType::Nominal;
    } else {
        measure_type = prior.1;
    }

    if data_type == DataType::None {
        data_type = prior.0;
    }

    (data_type, measure_type)
}

fn round_thousandths(value: f64) -> f64 {
    // Adding zero folds -0.0 into 0.0.
    (value * 1000.0).round() / 1000.0 + 0.0
}

/// Decimal places that show every finite value once rounded to thousandths,
/// and never fewer than `dps`.
fn display_places(values: &[f64], dps: i32) -> usize {
    values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| {
            let text = format!("{:.3}", round_thousandths(*v));
            let text = text.trim_end_matches('0');
            text.split_once('.').map_or(0, |(_, fraction)| fraction.len())
        })
        .fold(dps.max(0) as usize, usize::max)
}

/// Text for a decimal cell or level: rounded to thousandths and shown at
/// `places`. NaN is the empty string; infinities keep their own text.
fn decimal_label(value: f64, places: usize) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{:.*}", places, round_thousandths(value))
    }
}

/// Everything a conversion needs from the displaced representation, copied
/// out so the heap is free to grow while the new one is written.
struct Source {
    data_type: DataType,
    levels: Option<Vec<LevelData>>,
    ivalues: Vec<i32>,
    dvalues: Vec<f64>,
    svalues: Vec<String>,
}

impl Source {
    fn capture(view: &Column<'_>) -> Result<Self> {
        let rows = 0..view.row_count();
        let comma_decimal = view.is_comma_decimal_text()?;
        let data_type = view.data_type();

        let ivalues = rows
            .clone()
            .map(|row| view.ivalue(row))
            .collect::<Result<Vec<_>>>()?;
        let dvalues = rows
            .clone()
            .map(|row| view.dvalue_with(row, comma_decimal))
            .collect::<Result<Vec<_>>>()?;
        let svalues = if data_type == DataType::Decimal {
            let places = display_places(&dvalues, view.dps());
            dvalues.iter().map(|v| decimal_label(*v, places)).collect()
        } else {
            rows.map(|row| view.svalue(row).map(|s| s.into_owned()))
                .collect::<Result<Vec<_>>>()?
        };

        let levels = if view.has_levels() {
            Some(view.levels()?)
        } else {
            None
        };

        Ok(Self {
            data_type,
            levels,
            ivalues,
            dvalues,
            svalues,
        })
    }

    /// The integer a level stands for: its value on integer columns, its
    /// parsed text on text columns.
    fn level_int(&self, level: &LevelData) -> i32 {
        if self.data_type == DataType::Text {
            let parsed = parse_int(&level.import_value);
            if parsed != MISSING_INT {
                return parsed;
            }
            parse_int(&level.label)
        } else {
            level.value
        }
    }
}

impl ColumnW<'_> {
    /// Change the data type and measure type, converting every cell.
    ///
    /// `None` in either position is filled in from the current pair. The
    /// previous representation is kept as scratch: converting back to it
    /// before any edit restores it exactly. Asking for the current pair does
    /// nothing.
    pub fn change_dm_type(&mut self, data_type: DataType, measure_type: MeasureType) -> Result<()> {
        if data_type == DataType::None && measure_type == MeasureType::None {
            return Ok(());
        }

        let prior = self.types()?;
        let target = resolve_types((data_type, measure_type), prior);
        if target == prior {
            return Ok(());
        }

        let id = self.id()?;
        let index = self.index();
        self.ds.swap_with_scratch(index)?;

        let live = self.storage()?;
        let restored = self.types()?;
        if live.owner() == id {
            if restored == target {
                // Filtering may have changed while this block sat in scratch.
                self.update_level_counts()?;
                tracing::info!(
                    column = %id,
                    data_type = %target.0,
                    measure_type = %target.1,
                    "restored previous representation"
                );
                return Ok(());
            }

            // Convert from whichever side is lossless.
            if restored.0 == DataType::Text
                || (restored.0 == DataType::Decimal && prior.0 == DataType::Integer)
            {
                self.ds.swap_with_scratch(index)?;
            }
        }

        let source = match self.ds.scratch(index)? {
            Some(view) => Source::capture(&view)?,
            None => {
                return Err(HeapError::HeapCorruption {
                    offset: HeapOffset::NULL,
                    cause: format!("column {} lost its previous representation", id),
                });
            }
        };

        let mut storage = self.storage()?;
        storage.owner = id.as_i32();
        storage.data_type = target.0.code();
        storage.measure_type = target.1.code();
        self.write_storage(storage)?;
        self.bump()?;

        let row_count = self.ds.row_count()?;
        self.reallocate_rows(RowRepr::of(target.0, target.1), row_count)?;
        self.transfer_levels(&source, target)?;
        self.convert_rows(&source, target, row_count)?;

        tracing::info!(
            column = %id,
            from_data_type = %source.data_type,
            data_type = %target.0,
            measure_type = %target.1,
            rows = row_count,
            "converted column"
        );
        Ok(())
    }

    fn transfer_levels(&mut self, source: &Source, target: TypePair) -> Result<()> {
        self.clear_levels()?;
        if !has_levels(target.0, target.1) {
            return Ok(());
        }

        match (&source.levels, target.0) {
            (Some(levels), DataType::Text) => {
                let mut seen = HashSet::new();
                let mut code = 0;
                for level in levels {
                    if level.label.is_empty() || !seen.insert(level.label.as_str()) {
                        continue;
                    }
                    self.append_level(code, Some(&level.label), Some(&level.import_value), level.pinned)?;
                    code += 1;
                }
            }
            (Some(levels), _) => {
                for level in levels {
                    let value = source.level_int(level);
                    if value == MISSING_INT || self.view()?.has_level(value)? {
                        continue;
                    }
                    if level.has_label_changed() {
                        self.insert_level(value, Some(&level.label), Some(&level.import_value), level.pinned)?;
                    } else {
                        self.insert_level(value, None, None, level.pinned)?;
                    }
                }
            }
            (None, DataType::Text) => {
                let labels: Vec<String> = match source.data_type {
                    DataType::Decimal => {
                        // Same text as the rows, ordered by value.
                        let mut pairs: Vec<(f64, &String)> = source
                            .dvalues
                            .iter()
                            .zip(&source.svalues)
                            .filter(|(v, _)| !v.is_nan())
                            .map(|(v, label)| (round_thousandths(*v), label))
                            .collect();
                        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
                        pairs.into_iter().map(|(_, label)| label.clone()).collect()
                    }
                    DataType::Integer => source
                        .ivalues
                        .iter()
                        .filter(|v| **v != MISSING_INT)
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .map(|v| v.to_string())
                        .collect(),
                    _ => source.svalues.clone(),
                };

                let mut seen = HashSet::new();
                let mut code = 0;
                for label in labels {
                    if label.is_empty() || !seen.insert(label.clone()) {
                        continue;
                    }
                    self.append_level(code, Some(&label), Some(&label), false)?;
                    code += 1;
                }
            }
            (None, _) => {
                for (value, label) in source.ivalues.iter().zip(&source.svalues) {
                    if *value == MISSING_INT || self.view()?.has_level(*value)? {
                        continue;
                    }
                    // A decimal's text would misrepresent the integer level.
                    if source.data_type == DataType::Decimal {
                        self.insert_level(*value, None, None, false)?;
                    } else {
                        self.insert_level(*value, Some(label), None, false)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn convert_rows(&mut self, source: &Source, target: TypePair, row_count: usize) -> Result<()> {
        let rows = row_count.min(source.ivalues.len());

        match target {
            (DataType::Integer, _) => {
                for row in 0..rows {
                    self.set_ivalue(row, source.ivalues[row], true)?;
                }
            }
            (DataType::Text, MeasureType::Id) => {
                for row in 0..rows {
                    self.set_svalue(row, &source.svalues[row], true)?;
                }
            }
            (DataType::Text, _) => {
                // Labels win over import values; earlier levels win ties.
                let levels = self.view()?.levels()?;
                let mut codes: HashMap<&str, i32> = HashMap::new();
                for level in levels.iter().rev() {
                    codes.insert(&level.import_value, level.value);
                }
                for level in levels.iter().rev() {
                    codes.insert(&level.label, level.value);
                }

                for row in 0..rows {
                    let label = source.svalues[row].as_str();
                    let code = codes.get(label).copied().unwrap_or(MISSING_INT);
                    self.set_ivalue(row, code, true)?;
                }
            }
            _ => {
                for row in 0..rows {
                    self.set_dvalue(row, source.dvalues[row], true)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INT: DataType = DataType::Integer;
    const DEC: DataType = DataType::Decimal;
    const TEXT: DataType = DataType::Text;
    const NO_DT: DataType = DataType::None;
    const NOM: MeasureType = MeasureType::Nominal;
    const ORD: MeasureType = MeasureType::Ordinal;
    const CONT: MeasureType = MeasureType::Continuous;
    const ID: MeasureType = MeasureType::Id;
    const NO_MT: MeasureType = MeasureType::None;

    #[test]
    fn continuous_measure_picks_numeric_type() {
        assert_eq!(resolve_types((NO_DT, CONT), (INT, NOM)), (INT, CONT));
        assert_eq!(resolve_types((NO_DT, CONT), (TEXT, NOM)), (DEC, CONT));
        assert_eq!(resolve_types((TEXT, CONT), (INT, NOM)), (INT, CONT));
        assert_eq!(resolve_types((INT, CONT), (TEXT, NOM)), (INT, CONT));
    }

    #[test]
    fn categorical_measure_picks_categorical_type() {
        assert_eq!(resolve_types((NO_DT, NOM), (DEC, CONT)), (TEXT, NOM));
        assert_eq!(resolve_types((DEC, ORD), (INT, CONT)), (INT, ORD));
        assert_eq!(resolve_types((NO_DT, ID), (TEXT, NOM)), (TEXT, ID));
    }

    #[test]
    fn data_type_alone_adjusts_measure() {
        assert_eq!(resolve_types((DEC, NO_MT), (INT, NOM)), (DEC, CONT));
        assert_eq!(resolve_types((TEXT, NO_MT), (DEC, CONT)), (TEXT, NOM));
        assert_eq!(resolve_types((TEXT, NO_MT), (INT, ORD)), (TEXT, ORD));
        assert_eq!(resolve_types((INT, NO_MT), (TEXT, ID)), (INT, ID));
    }

    #[test]
    fn decimal_labels_round_to_thousandths() {
        assert_eq!(decimal_label(1.5, 1), "1.5");
        assert_eq!(decimal_label(2.0, 1), "2.0");
        assert_eq!(decimal_label(0.12345, 4), "0.1230");
        assert_eq!(decimal_label(3.7, 0), "4");
        assert_eq!(decimal_label(f64::NAN, 2), "");
        assert_eq!(decimal_label(f64::NEG_INFINITY, 1), "-inf");
    }

    #[test]
    fn display_places_cover_every_value() {
        assert_eq!(display_places(&[1.5, f64::NAN, 2.0], 0), 1);
        assert_eq!(display_places(&[1.0, 2.0], 0), 0);
        assert_eq!(display_places(&[1.0, 2.0], 2), 2);
        assert_eq!(display_places(&[0.12345, 7.25], 0), 3);
        assert_eq!(display_places(&[f64::INFINITY, 3.0], 1), 1);
    }
}
