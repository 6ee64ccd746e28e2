//! Integration tests for data type / measure type conversion.
//!
//! Covers the undo law of the scratch swap, the loss of undo after an edit,
//! the lossless-source preference and the per-type row conversions.

use colheap_core::prelude::*;
use tempfile::{TempDir, tempdir};

fn dataset(rows: usize) -> (TempDir, DataSet) {
    let dir = tempdir().unwrap();
    let mut ds = DataSet::create(&HeapConfig::default().with_directory(dir.path())).unwrap();
    ds.set_row_count(rows).unwrap();
    (dir, ds)
}

fn raw_cells(column: &Column<'_>) -> Vec<i32> {
    (0..column.row_count())
        .map(|row| column.raw_ivalue(row).unwrap())
        .collect()
}

fn text_cells(column: &Column<'_>) -> Vec<String> {
    (0..column.row_count())
        .map(|row| column.svalue(row).unwrap().into_owned())
        .collect()
}

#[test]
fn decimal_to_text_keeps_needed_decimals() {
    let (_dir, mut ds) = dataset(3);
    let mut column = ds.append_column("weight").unwrap();
    column
        .change_dm_type(DataType::Decimal, MeasureType::Continuous)
        .unwrap();
    assert_eq!(column.view().unwrap().dps(), 0);
    for (row, value) in [1.5, f64::NAN, 2.0].into_iter().enumerate() {
        column.set_dvalue(row, value, false).unwrap();
    }

    column.change_dm_type(DataType::Text, MeasureType::None).unwrap();

    let view = column.view().unwrap();
    assert_eq!(view.data_type(), DataType::Text);
    assert_eq!(view.measure_type(), MeasureType::Nominal);
    assert_eq!(text_cells(&view), vec!["1.5", "", "2.0"]);

    let levels = view.levels().unwrap();
    let labels: Vec<&str> = levels.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(labels, vec!["1.5", "2.0"]);
    assert_eq!(levels.iter().map(|l| l.value).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(levels.iter().map(|l| l.count).collect::<Vec<_>>(), vec![1, 1]);
}

#[test]
fn decimal_infinities_become_their_own_levels() {
    let (_dir, mut ds) = dataset(3);
    let mut column = ds.append_column("ratio").unwrap();
    column.change_dm_type(DataType::Decimal, MeasureType::None).unwrap();
    column.set_dps(1).unwrap();
    for (row, value) in [f64::INFINITY, 1.0, f64::NEG_INFINITY].into_iter().enumerate() {
        column.set_dvalue(row, value, false).unwrap();
    }

    column.change_dm_type(DataType::Text, MeasureType::None).unwrap();

    let view = column.view().unwrap();
    assert_eq!(text_cells(&view), vec!["inf", "1.0", "-inf"]);
    let summary: Vec<(String, i32)> = view
        .levels()
        .unwrap()
        .into_iter()
        .map(|l| (l.label, l.count))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("-inf".to_string(), 1),
            ("1.0".to_string(), 1),
            ("inf".to_string(), 1)
        ]
    );
}

#[test]
fn restored_levels_reflect_filter_changes() {
    let (_dir, mut ds) = dataset(2);
    let mut column = ds.append_column("group").unwrap();
    column.set_ivalue(0, 1, false).unwrap();
    column.set_ivalue(1, 1, false).unwrap();
    column.change_dm_type(DataType::Text, MeasureType::None).unwrap();

    ds.set_row_filtered(0, true).unwrap();

    let mut column = ds.column_mut(0).unwrap();
    column
        .change_dm_type(DataType::Integer, MeasureType::Nominal)
        .unwrap();
    let level = column.view().unwrap().level(1).unwrap().unwrap();
    assert_eq!((level.count, level.count_ex_filtered), (2, 1));

    column.update_level_counts().unwrap();
    let recounted = column.view().unwrap().level(1).unwrap().unwrap();
    assert_eq!(recounted, level);
}

#[test]
fn converting_back_restores_previous_representation() {
    let (_dir, mut ds) = dataset(4);
    let mut column = ds.append_column("rating").unwrap();
    for (row, value) in [3, 1, MISSING_INT, 3].into_iter().enumerate() {
        column.set_ivalue(row, value, false).unwrap();
    }
    column
        .set_levels(&[LevelData::new(1, "low"), LevelData::new(3, "high")])
        .unwrap();

    let before_levels = column.view().unwrap().levels().unwrap();
    let before_cells = raw_cells(&column.view().unwrap());

    column.change_dm_type(DataType::Text, MeasureType::None).unwrap();
    let view = column.view().unwrap();
    assert_eq!(view.data_type(), DataType::Text);
    assert_eq!(text_cells(&view), vec!["high", "low", "", "high"]);

    column
        .change_dm_type(DataType::Integer, MeasureType::Nominal)
        .unwrap();
    let view = column.view().unwrap();
    assert_eq!(view.data_type(), DataType::Integer);
    assert_eq!(view.levels().unwrap(), before_levels);
    assert_eq!(raw_cells(&view), before_cells);

    // Asking again for the pair we already have changes nothing.
    let changes = view.changes();
    column
        .change_dm_type(DataType::Integer, MeasureType::Nominal)
        .unwrap();
    assert_eq!(column.view().unwrap().changes(), changes);
    assert_eq!(raw_cells(&column.view().unwrap()), before_cells);
}

#[test]
fn an_edit_forfeits_undo() {
    let (_dir, mut ds) = dataset(3);
    let mut column = ds.append_column("count").unwrap();
    for (row, value) in [1, 2, 3].into_iter().enumerate() {
        column.set_ivalue(row, value, false).unwrap();
    }

    column.change_dm_type(DataType::Decimal, MeasureType::None).unwrap();
    assert!(ds.scratch(0).unwrap().is_some());

    let mut column = ds.column_mut(0).unwrap();
    column.set_dvalue(0, 5.9, false).unwrap();
    assert!(ds.scratch(0).unwrap().is_none());

    let mut column = ds.column_mut(0).unwrap();
    column
        .change_dm_type(DataType::Integer, MeasureType::Nominal)
        .unwrap();

    let view = column.view().unwrap();
    assert_eq!(raw_cells(&view), vec![5, 2, 3]);
    let values: Vec<i32> = view.levels().unwrap().iter().map(|l| l.value).collect();
    assert_eq!(values, vec![2, 3, 5]);
}

#[test]
fn text_source_is_kept_over_integer_copy() {
    let (_dir, mut ds) = dataset(3);
    let mut column = ds.append_column("answer").unwrap();
    column.set_data_type(DataType::Text).unwrap();
    for (row, label) in ["yes", "no", "5"].iter().enumerate() {
        column.set_text_value(row, label, false).unwrap();
    }

    column
        .change_dm_type(DataType::Integer, MeasureType::Nominal)
        .unwrap();
    assert_eq!(
        raw_cells(&column.view().unwrap()),
        vec![MISSING_INT, MISSING_INT, 5]
    );

    column
        .change_dm_type(DataType::Integer, MeasureType::Ordinal)
        .unwrap();
    let view = column.view().unwrap();
    assert_eq!(view.measure_type(), MeasureType::Ordinal);
    assert_eq!(raw_cells(&view), vec![MISSING_INT, MISSING_INT, 5]);

    let scratch = ds.scratch(0).unwrap().unwrap();
    assert_eq!(scratch.data_type(), DataType::Text);

    let mut column = ds.column_mut(0).unwrap();
    column
        .change_dm_type(DataType::Text, MeasureType::Nominal)
        .unwrap();
    let view = column.view().unwrap();
    assert_eq!(text_cells(&view), vec!["yes", "no", "5"]);
    let labels: Vec<String> = view.levels().unwrap().into_iter().map(|l| l.label).collect();
    assert_eq!(labels, vec!["yes", "no", "5"]);
}

#[test]
fn decimal_source_is_kept_over_integer_copy() {
    let (_dir, mut ds) = dataset(2);
    let mut column = ds.append_column("dose").unwrap();
    column.change_dm_type(DataType::Decimal, MeasureType::None).unwrap();
    column.set_dvalue(0, 1.5, false).unwrap();
    column.set_dvalue(1, 2.25, false).unwrap();

    column
        .change_dm_type(DataType::Integer, MeasureType::Nominal)
        .unwrap();
    column
        .change_dm_type(DataType::Integer, MeasureType::Ordinal)
        .unwrap();
    assert_eq!(raw_cells(&column.view().unwrap()), vec![1, 2]);

    column.change_dm_type(DataType::Decimal, MeasureType::None).unwrap();
    let view = column.view().unwrap();
    assert_eq!(view.dvalue(0).unwrap(), 1.5);
    assert_eq!(view.dvalue(1).unwrap(), 2.25);
}

#[test]
fn comma_decimal_text_converts_to_decimal() {
    let (_dir, mut ds) = dataset(3);
    let mut column = ds.append_column("price").unwrap();
    column.set_data_type(DataType::Text).unwrap();
    for (row, label) in ["1,5", "2", ""].iter().enumerate() {
        column.set_text_value(row, label, false).unwrap();
    }
    assert!(column.view().unwrap().is_comma_decimal_text().unwrap());

    column.change_dm_type(DataType::Decimal, MeasureType::None).unwrap();

    let view = column.view().unwrap();
    assert_eq!(view.measure_type(), MeasureType::Continuous);
    assert_eq!(view.dvalue(0).unwrap(), 1.5);
    assert_eq!(view.dvalue(1).unwrap(), 2.0);
    assert!(view.dvalue(2).unwrap().is_nan());
}

#[test]
fn identifier_text_round_trip() {
    let (_dir, mut ds) = dataset(4);
    let mut column = ds.append_column("code").unwrap();
    for (row, value) in [10, 20, MISSING_INT, 10].into_iter().enumerate() {
        column.set_ivalue(row, value, false).unwrap();
    }

    column.change_dm_type(DataType::Text, MeasureType::Id).unwrap();
    let view = column.view().unwrap();
    assert!(!view.has_levels());
    assert_eq!(text_cells(&view), vec!["10", "20", "", "10"]);

    let mut column = ds.column_mut(0).unwrap();
    column.set_svalue(2, "A7", false).unwrap();
    column
        .change_dm_type(DataType::Text, MeasureType::Nominal)
        .unwrap();

    let view = column.view().unwrap();
    let labels: Vec<String> = view.levels().unwrap().into_iter().map(|l| l.label).collect();
    assert_eq!(labels, vec!["10", "20", "A7"]);
    assert_eq!(raw_cells(&view), vec![0, 1, 2, 0]);
}

#[test]
fn decimal_to_integer_levels_have_numeric_labels() {
    let (_dir, mut ds) = dataset(3);
    let mut column = ds.append_column("x").unwrap();
    column.change_dm_type(DataType::Decimal, MeasureType::None).unwrap();
    column.set_dps(2).unwrap();
    for (row, value) in [2.75, -1.5, 2.25].into_iter().enumerate() {
        column.set_dvalue(row, value, false).unwrap();
    }

    column
        .change_dm_type(DataType::Integer, MeasureType::None)
        .unwrap();

    let view = column.view().unwrap();
    // Continuous was the prior measure and is kept.
    assert_eq!(view.measure_type(), MeasureType::Continuous);
    let levels = view.levels().unwrap();
    let summary: Vec<(i32, &str, i32)> = levels
        .iter()
        .map(|l| (l.value, l.label.as_str(), l.count))
        .collect();
    assert_eq!(summary, vec![(-1, "-1", 1), (2, "2", 2)]);
}

#[test]
fn conversion_keeps_identity() {
    let (_dir, mut ds) = dataset(1);
    let mut column = ds.append_column("kept").unwrap();
    column.set_description("a column that changes type").unwrap();
    column.set_column_type(ColumnType::Computed).unwrap();
    column.set_formula("A + B").unwrap();
    column
        .set_missing_values(&["== -99".parse().unwrap()])
        .unwrap();

    column.change_dm_type(DataType::Text, MeasureType::None).unwrap();

    let view = column.view().unwrap();
    assert_eq!(view.id(), ColumnId::new(0));
    assert_eq!(view.name().unwrap(), "kept");
    assert_eq!(view.description().unwrap(), "a column that changes type");
    assert_eq!(view.column_type(), ColumnType::Computed);
    assert_eq!(view.formula().unwrap(), "A + B");
    assert_eq!(view.missing_values().unwrap().len(), 1);
}
