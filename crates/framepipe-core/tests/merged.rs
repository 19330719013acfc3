//! Merged strategy: fusing, splitting and dtype fidelity.

use std::sync::atomic::{AtomicBool, Ordering};

use polars::prelude::{Column, DataFrame, DataType, IdxSize, IntoLazy, col, lit};
use proptest::prelude::*;

use framepipe_core::stages::CategoryCodes;
use framepipe_core::{FnTransform, MemorySink, Stage};
use framepipe_model::{LogLevel, PipelineError, StageConfig, Table};

fn identity() -> Stage {
    Stage::merged("Identity", StageConfig::fixed(), FnTransform::new(Ok))
}

fn overlapping_batch() -> Vec<Table> {
    let first = DataFrame::new(vec![
        Column::new("id".into(), [1i64, 2, 3]),
        Column::new("city".into(), ["oslo", "rome", "oslo"]),
    ])
    .expect("df");
    let second = DataFrame::new(vec![
        Column::new("city".into(), ["rome", "lima"]),
        Column::new("score".into(), [0.5, 1.5]),
    ])
    .expect("df");
    vec![
        Table::with_index(first, vec![100, 101, 102]).expect("table"),
        Table::with_index(second, vec![7, 3]).expect("table"),
    ]
}

#[test]
fn identity_round_trip_restores_tables() {
    let input = overlapping_batch();
    let output = identity().process(&input).expect("process");
    for (before, after) in input.iter().zip(&output) {
        assert!(before.equals(after), "{before:?} != {after:?}");
    }
}

#[test]
fn category_codes_are_consistent_across_tables() {
    let output = CategoryCodes::new(vec!["city".into()])
        .into_stage()
        .process(&overlapping_batch())
        .expect("process");

    let codes = |table: &Table| -> Vec<Option<u32>> {
        table
            .data()
            .column("city")
            .expect("city")
            .u32()
            .expect("u32")
            .into_iter()
            .collect()
    };
    assert_eq!(codes(&output[0]), vec![Some(0), Some(1), Some(0)]);
    assert_eq!(codes(&output[1]), vec![Some(1), Some(2)]);
    assert_eq!(output[1].index(), &[7, 3]);
    assert!(!output[1].has_column("id"));
}

#[test]
fn type_conflict_is_raised_before_transform() {
    static CALLED: AtomicBool = AtomicBool::new(false);
    let first = Table::new(DataFrame::new(vec![Column::new("a".into(), [1i64])]).expect("df"));
    let second = Table::new(DataFrame::new(vec![Column::new("a".into(), [1.0f64])]).expect("df"));
    let stage = Stage::merged(
        "Probe",
        StageConfig::fixed(),
        FnTransform::new(|table: Table| {
            CALLED.store(true, Ordering::SeqCst);
            Ok(table)
        }),
    );

    let result = stage.process(&[first, second]);
    assert!(matches!(
        result,
        Err(PipelineError::TypeConflict { ref column, .. }) if column == "a"
    ));
    assert!(!CALLED.load(Ordering::SeqCst));
}

#[test]
fn reordered_rows_keep_their_original_keys() {
    let stage = Stage::merged(
        "Reverse",
        StageConfig::fixed(),
        FnTransform::new(|table: Table| {
            let positions: Vec<IdxSize> = (0..table.height() as IdxSize).rev().collect();
            table.take_rows(&positions)
        }),
    );
    let output = stage.process(&overlapping_batch()).expect("process");

    assert_eq!(output[0].index(), &[102, 101, 100]);
    let ids = output[0].data().column("id").expect("id").i64().expect("i64");
    assert_eq!(ids.get(0), Some(3));
    assert_eq!(output[1].index(), &[3, 7]);
}

#[test]
fn changed_row_count_keeps_transform_keys() {
    let stage = Stage::merged(
        "FilterRome",
        StageConfig::fixed().with_fixed_rows(false),
        FnTransform::new(|table: Table| {
            let data = table
                .data()
                .clone()
                .lazy()
                .select([col("city").neq(lit("rome")).alias("keep")])
                .collect()?;
            let mask = data.column("keep")?.bool()?.clone();
            table.filter_rows(&mask)
        }),
    );
    let output = stage.process(&overlapping_batch()).expect("process");

    // fused positions 0 and 2 for the first table, 4 for the second
    assert_eq!(output[0].index(), &[0, 2]);
    assert_eq!(output[1].index(), &[4]);
    assert_eq!(output[1].column_names(), vec!["city", "score"]);
}

#[test]
fn new_columns_are_appended_to_every_table() {
    let stage = Stage::merged(
        "Flag",
        StageConfig::unfixed(),
        FnTransform::new(|table: Table| {
            let data = table
                .data()
                .clone()
                .lazy()
                .with_column(col("city").eq(lit("oslo")).alias("is_oslo"))
                .collect()?;
            table.with_data(data)
        }),
    );
    let output = stage.process(&overlapping_batch()).expect("process");
    assert_eq!(output[0].column_names(), vec!["id", "city", "is_oslo"]);
    assert_eq!(output[1].column_names(), vec!["city", "score", "is_oslo"]);
}

#[test]
fn widened_integer_columns_are_cast_back() {
    let stage = Stage::merged(
        "FillFloat",
        StageConfig::fixed(),
        FnTransform::new(|table: Table| {
            let data = table
                .data()
                .clone()
                .lazy()
                .with_column(col("id").cast(DataType::Float64).fill_null(lit(0.0)))
                .collect()?;
            table.with_data(data)
        }),
    );
    let sink = MemorySink::new();
    let output = stage
        .process_with_sink(&overlapping_batch(), &sink)
        .expect("process");

    assert_eq!(output[0].dtype_of("id"), Some(DataType::Int64));
    assert!(sink.messages_at(LogLevel::Warning).is_empty());
}

const POOL: [&str; 5] = ["a", "b", "c", "d", "e"];

fn build_column(name: &str, cells: &[Option<i64>]) -> Column {
    match name {
        "a" => Column::new(name.into(), cells.to_vec()),
        "b" => Column::new(
            name.into(),
            cells.iter().map(|v| v.map(|v| v as f64 / 4.0)).collect::<Vec<_>>(),
        ),
        "c" => Column::new(
            name.into(),
            cells.iter().map(|v| v.map(|v| format!("s{v}"))).collect::<Vec<_>>(),
        ),
        "d" => Column::new(
            name.into(),
            cells.iter().map(|v| v.map(|v| v as i32)).collect::<Vec<_>>(),
        ),
        _ => Column::new(
            name.into(),
            cells.iter().map(|v| v.map(|v| v % 2 == 0)).collect::<Vec<_>>(),
        ),
    }
}

fn build_table(mask: &[bool], reverse: bool, cells: &[Option<i64>], key_base: i64) -> Table {
    let mut names: Vec<&str> = POOL
        .iter()
        .zip(mask)
        .filter_map(|(name, keep)| keep.then_some(*name))
        .collect();
    if names.is_empty() {
        names.push("a");
    }
    if reverse {
        names.reverse();
    }
    let columns = names.iter().map(|name| build_column(name, cells)).collect();
    let data = DataFrame::new(columns).expect("df");
    let keys = (0..cells.len() as i64).map(|i| key_base - 3 * i).collect();
    Table::with_index(data, keys).expect("table")
}

fn table_strategy() -> impl Strategy<Value = Table> {
    (
        prop::collection::vec(any::<bool>(), POOL.len()),
        any::<bool>(),
        0usize..6,
        -1000i64..1000,
    )
        .prop_flat_map(|(mask, reverse, height, key_base)| {
            (
                Just(mask),
                Just(reverse),
                prop::collection::vec(prop::option::of(-50i64..50), height),
                Just(key_base),
            )
        })
        .prop_map(|(mask, reverse, cells, key_base)| build_table(&mask, reverse, &cells, key_base))
}

proptest! {
    #[test]
    fn identity_merge_round_trips(batch in prop::collection::vec(table_strategy(), 1..4)) {
        let output = identity().process(&batch).expect("process");
        prop_assert_eq!(output.len(), batch.len());
        for (before, after) in batch.iter().zip(&output) {
            prop_assert!(before.equals(after), "{:?} != {:?}", before, after);
        }
    }
}
