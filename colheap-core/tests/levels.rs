//! Property tests for level bookkeeping under random cell edits.

use colheap_core::prelude::*;
use proptest::prelude::*;
use std::collections::HashMap;
use tempfile::tempdir;

const ROWS: usize = 12;

fn integer_edit() -> impl Strategy<Value = (usize, i32)> {
    (0..ROWS, prop_oneof![1 => Just(MISSING_INT), 6 => -3i32..6])
}

fn text_edit() -> impl Strategy<Value = (usize, &'static str)> {
    (
        0..ROWS,
        prop::sample::select(vec!["", "red", "green", "blue", "cyan", "plum"]),
    )
}

/// Counts a fresh recount would produce, by level value.
fn tally(cells: &[i32]) -> HashMap<i32, i32> {
    let mut counts = HashMap::new();
    for &cell in cells.iter().filter(|c| **c != MISSING_INT) {
        *counts.entry(cell).or_insert(0) += 1;
    }
    counts
}

fn cells(column: &Column<'_>) -> Vec<i32> {
    (0..column.row_count())
        .map(|row| column.raw_ivalue(row).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn integer_counts_track_cells(edits in prop::collection::vec(integer_edit(), 1..60)) {
        let dir = tempdir().unwrap();
        let mut ds = DataSet::create(&HeapConfig::default().with_directory(dir.path())).unwrap();
        ds.set_row_count(ROWS).unwrap();
        let mut column = ds.append_column("n").unwrap();

        for (row, value) in edits {
            column.set_ivalue(row, value, false).unwrap();
        }

        let view = column.view().unwrap();
        let expected = tally(&cells(&view));
        let levels = view.levels().unwrap();

        // Trimming is on: every level is referenced, and values stay sorted.
        prop_assert_eq!(levels.len(), expected.len());
        prop_assert!(levels.windows(2).all(|w| w[0].value < w[1].value));
        for level in &levels {
            prop_assert_eq!(Some(&level.count), expected.get(&level.value));
            prop_assert_eq!(level.count, level.count_ex_filtered);
            prop_assert_eq!(level.label.clone(), level.value.to_string());
        }

        column.update_level_counts().unwrap();
        prop_assert_eq!(column.view().unwrap().levels().unwrap(), levels);
    }

    #[test]
    fn text_codes_stay_dense(edits in prop::collection::vec(text_edit(), 1..60)) {
        let dir = tempdir().unwrap();
        let mut ds = DataSet::create(&HeapConfig::default().with_directory(dir.path())).unwrap();
        ds.set_row_count(ROWS).unwrap();
        let mut column = ds.append_column("colour").unwrap();
        column.set_data_type(DataType::Text).unwrap();

        let mut shadow = vec![""; ROWS];
        for (row, label) in edits {
            column.set_text_value(row, label, false).unwrap();
            shadow[row] = label;
        }

        let view = column.view().unwrap();
        let levels = view.levels().unwrap();
        let codes: Vec<i32> = levels.iter().map(|l| l.value).collect();
        prop_assert_eq!(codes, (0..levels.len() as i32).collect::<Vec<_>>());

        let text: Vec<String> = (0..ROWS)
            .map(|row| view.svalue(row).unwrap().into_owned())
            .collect();
        prop_assert_eq!(text, shadow.iter().map(|s| s.to_string()).collect::<Vec<_>>());

        let expected = tally(&cells(&view));
        for level in &levels {
            prop_assert_eq!(Some(&level.count), expected.get(&level.value));
        }
    }

    #[test]
    fn filtered_rows_drop_from_filtered_counts(
        values in prop::collection::vec(0i32..4, ROWS),
        filtered in prop::collection::vec(any::<bool>(), ROWS),
    ) {
        let dir = tempdir().unwrap();
        let mut ds = DataSet::create(&HeapConfig::default().with_directory(dir.path())).unwrap();
        ds.set_row_count(ROWS).unwrap();
        let mut column = ds.append_column("g").unwrap();
        for (row, value) in values.iter().enumerate() {
            column.set_ivalue(row, *value, false).unwrap();
        }
        for (row, hide) in filtered.iter().enumerate() {
            ds.set_row_filtered(row, *hide).unwrap();
        }

        let view = ds.column(0).unwrap();
        for level in view.levels().unwrap() {
            let visible = values
                .iter()
                .zip(&filtered)
                .filter(|(v, hide)| **v == level.value && !**hide)
                .count() as i32;
            prop_assert_eq!(level.count_ex_filtered, visible);
        }
    }
}

#[test]
fn integer_levels_are_never_renumbered() {
    let dir = tempdir().unwrap();
    let mut ds = DataSet::create(&HeapConfig::default().with_directory(dir.path())).unwrap();
    ds.set_row_count(3).unwrap();
    let mut column = ds.append_column("n").unwrap();

    column.set_ivalue(0, 10, false).unwrap();
    column.set_ivalue(1, 20, false).unwrap();
    column.set_ivalue(2, 30, false).unwrap();
    column.set_ivalue(1, MISSING_INT, false).unwrap();

    let view = column.view().unwrap();
    let values: Vec<i32> = view.levels().unwrap().iter().map(|l| l.value).collect();
    assert_eq!(values, vec![10, 30]);
    assert_eq!(cells(&view), vec![10, MISSING_INT, 30]);
}

#[test]
fn removing_a_text_level_shifts_later_codes() {
    let dir = tempdir().unwrap();
    let mut ds = DataSet::create(&HeapConfig::default().with_directory(dir.path())).unwrap();
    ds.set_row_count(3).unwrap();
    let mut column = ds.append_column("t").unwrap();
    column.set_data_type(DataType::Text).unwrap();

    column.set_text_value(0, "a", false).unwrap();
    column.set_text_value(1, "b", false).unwrap();
    column.set_text_value(2, "c", false).unwrap();
    // "a" loses its only reference; "b" moves into its place at code 0.
    column.set_text_value(0, "c", false).unwrap();

    let view = column.view().unwrap();
    let levels = view.levels().unwrap();
    let summary: Vec<(i32, &str, i32)> = levels
        .iter()
        .map(|l| (l.value, l.label.as_str(), l.count))
        .collect();
    assert_eq!(summary, vec![(0, "b", 1), (1, "c", 2)]);
    assert_eq!(cells(&view), vec![1, 0, 1]);
}

#[test]
fn missing_value_rules_mark_levels() {
    let dir = tempdir().unwrap();
    let mut ds = DataSet::create(&HeapConfig::default().with_directory(dir.path())).unwrap();
    ds.set_row_count(3).unwrap();
    let mut column = ds.append_column("score").unwrap();
    for (row, value) in [-99, 4, 12].into_iter().enumerate() {
        column.set_ivalue(row, value, false).unwrap();
    }

    let rules: Vec<MissingValueRule> = ["== -99", ">= 10"]
        .iter()
        .map(|text| text.parse().unwrap())
        .collect();
    column.set_missing_values(&rules).unwrap();

    let flags: Vec<(i32, bool)> = column
        .view()
        .unwrap()
        .levels()
        .unwrap()
        .iter()
        .map(|l| (l.value, l.treat_as_missing))
        .collect();
    assert_eq!(flags, vec![(-99, true), (4, false), (12, true)]);

    // Levels created later are classified as they are added.
    column.set_ivalue(1, 50, false).unwrap();
    let level = column.view().unwrap().level(50).unwrap().unwrap();
    assert!(level.treat_as_missing);

    column.set_missing_values(&[]).unwrap();
    let view = column.view().unwrap();
    assert!(view.levels().unwrap().iter().all(|l| !l.treat_as_missing));
    assert!(view.missing_values().unwrap().is_empty());
}
