//! Merged execution: fuse the batch, transform once, split back.
//!
//! # Algorithm
//!
//! 1. Every column shared by several tables must have one dtype.
//! 2. Tables are widened to the union of columns with full-null columns.
//!    Integer columns that may pick up nulls this way are remembered with
//!    their original dtype.
//! 3. Tables are stacked in table-then-row order. The fused row key is the
//!    merged-row position; the owning table of each position is kept in a
//!    side vector, never in a column.
//! 4. The transform runs once on the fused table.
//! 5. Output rows are routed back by their row key. A table whose row count
//!    is unchanged gets its original keys back; otherwise it keeps the keys
//!    the transform produced. Widening columns are dropped.
//! 6. Remembered integer columns whose dtype changed are cast back.

use std::collections::HashMap;
use std::ops::Range;

use polars::prelude::{Column, DataFrame, DataType, IdxSize};

use framepipe_common::is_integer_dtype;
use framepipe_model::{PipelineError, Result, RowKey, Table};

use crate::log_buffer::ProcessLog;
use crate::stage::TableTransform;

/// Bookkeeping for one input table of the fused frame.
#[derive(Debug)]
struct Part {
    positions: Range<RowKey>,
    keys: Vec<RowKey>,
    columns: Vec<String>,
    widened: Vec<String>,
    nullable_ints: Vec<(String, DataType)>,
}

struct Fused {
    table: Table,
    columns: Vec<String>,
    origin: Vec<usize>,
    parts: Vec<Part>,
}

pub(crate) fn run(
    transform: &dyn TableTransform,
    batch: Vec<Table>,
    log: &mut ProcessLog<'_>,
) -> Result<Vec<Table>> {
    if batch.is_empty() {
        return Ok(batch);
    }
    let schema = reconcile_dtypes(&batch)?;
    if schema.is_empty() {
        return Err(PipelineError::invalid_argument(
            "merged processing needs at least one column",
        ));
    }

    let fused = fuse(batch, &schema)?;
    log.debug(format!(
        "fused {} tables into {} rows x {} cols",
        fused.parts.len(),
        fused.origin.len(),
        fused.columns.len()
    ));
    let output = transform.transform(fused.table.clone())?;
    split(&fused, &output, log)
}

/// Union of all columns in first-seen order with their common dtype.
fn reconcile_dtypes(batch: &[Table]) -> Result<Vec<(String, DataType)>> {
    let mut union: Vec<(String, DataType)> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for table in batch {
        for column in table.data().get_columns() {
            let name = column.name().as_str();
            match seen.get(name) {
                Some(&slot) => {
                    let known = &union[slot].1;
                    if known != column.dtype() {
                        return Err(PipelineError::TypeConflict {
                            column: name.to_string(),
                            left: known.to_string(),
                            right: column.dtype().to_string(),
                        });
                    }
                }
                None => {
                    seen.insert(name.to_string(), union.len());
                    union.push((name.to_string(), column.dtype().clone()));
                }
            }
        }
    }
    Ok(union)
}

fn fuse(batch: Vec<Table>, schema: &[(String, DataType)]) -> Result<Fused> {
    let columns: Vec<String> = schema.iter().map(|(name, _)| name.clone()).collect();
    let tables = batch.len();
    let mut presence: HashMap<&str, usize> = HashMap::new();
    for table in &batch {
        for column in table.data().get_columns() {
            if let Some((name, _)) = schema.iter().find(|(name, _)| name == column.name().as_str()) {
                *presence.entry(name.as_str()).or_default() += 1;
            }
        }
    }

    let mut fused: Option<DataFrame> = None;
    let mut origin = Vec::new();
    let mut parts = Vec::with_capacity(tables);
    let mut offset: RowKey = 0;

    for (position, table) in batch.into_iter().enumerate() {
        let own_columns = table.column_names();
        let (mut data, keys) = table.into_parts();
        let height = data.height();

        let mut widened = Vec::new();
        for (name, dtype) in schema {
            if data.get_column_index(name).is_none() {
                data.with_column(Column::full_null(name.as_str().into(), height, dtype))?;
                widened.push(name.clone());
            }
        }
        let nullable_ints = schema
            .iter()
            .filter(|(name, dtype)| {
                is_integer_dtype(dtype)
                    && own_columns.contains(name)
                    && presence.get(name.as_str()).copied().unwrap_or(0) < tables
            })
            .cloned()
            .collect();

        let data = data.select(columns.iter().map(String::as_str))?;
        match fused.as_mut() {
            None => fused = Some(data),
            Some(frame) => {
                frame.vstack_mut(&data)?;
            }
        }

        let end = offset + height as RowKey;
        origin.extend(std::iter::repeat_n(position, height));
        parts.push(Part {
            positions: offset..end,
            keys,
            columns: own_columns,
            widened,
            nullable_ints,
        });
        offset = end;
    }

    let table = Table::new(fused.unwrap_or_default());
    Ok(Fused {
        table,
        columns,
        origin,
        parts,
    })
}

fn split(fused: &Fused, output: &Table, log: &mut ProcessLog<'_>) -> Result<Vec<Table>> {
    let mut routed: Vec<Vec<IdxSize>> = vec![Vec::new(); fused.parts.len()];
    let mut orphans = 0usize;
    for (row, &key) in output.index().iter().enumerate() {
        let owner = usize::try_from(key)
            .ok()
            .and_then(|pos| fused.origin.get(pos).copied());
        match owner {
            Some(table) => routed[table].push(row as IdxSize),
            None => orphans += 1,
        }
    }
    if orphans > 0 {
        log.warning(format!(
            "{orphans} rows produced by the merged transform belong to no table and were dropped"
        ));
    }

    let output_columns = output.column_names();
    let order_kept = preserves_relative_order(&fused.columns, &output_columns);

    let mut tables = Vec::with_capacity(fused.parts.len());
    for (part, rows) in fused.parts.iter().zip(routed) {
        let taken = output.take_rows(&rows)?;
        let columns = split_columns(part, &fused.columns, &output_columns, order_kept);
        let (data, fused_keys) = taken.into_parts();
        let mut data = data.select(columns.iter().map(String::as_str))?;

        let keys = if fused_keys.len() == part.keys.len() {
            fused_keys
                .iter()
                .map(|key| {
                    let offset = (key - part.positions.start) as usize;
                    part.keys[offset]
                })
                .collect()
        } else {
            fused_keys
        };

        restore_dtypes(&mut data, part, log)?;
        tables.push(Table::with_index(data, keys)?);
    }
    Ok(tables)
}

/// True when the fused columns still present in the output appear in their
/// fused order.
fn preserves_relative_order(fused: &[String], output: &[String]) -> bool {
    let kept_in_output: Vec<&String> = output.iter().filter(|name| fused.contains(name)).collect();
    let kept_in_fused: Vec<&String> = fused.iter().filter(|name| output.contains(name)).collect();
    kept_in_output == kept_in_fused
}

fn split_columns(
    part: &Part,
    fused: &[String],
    output: &[String],
    order_kept: bool,
) -> Vec<String> {
    if !order_kept {
        return output
            .iter()
            .filter(|name| !part.widened.contains(name))
            .cloned()
            .collect();
    }
    let mut columns: Vec<String> = part
        .columns
        .iter()
        .filter(|name| output.contains(name))
        .cloned()
        .collect();
    columns.extend(output.iter().filter(|name| !fused.contains(name)).cloned());
    columns
}

fn restore_dtypes(data: &mut DataFrame, part: &Part, log: &mut ProcessLog<'_>) -> Result<()> {
    for (name, original) in &part.nullable_ints {
        let Ok(column) = data.column(name) else {
            continue;
        };
        if column.dtype() == original {
            continue;
        }
        match column.strict_cast(original) {
            Ok(restored) => {
                data.with_column(restored)?;
            }
            Err(err) => log.warning(format!(
                "could not restore column '{name}' to {original}: {err}"
            )),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_buffer::MemorySink;
    use crate::stage::FnTransform;
    use framepipe_model::LogLevel;
    use polars::df;

    fn run_identity(batch: Vec<Table>) -> Result<Vec<Table>> {
        let sink = MemorySink::new();
        let mut log = ProcessLog::new(&sink);
        run(&FnTransform::new(Ok), batch, &mut log)
    }

    #[test]
    fn identity_round_trip_keeps_shape() {
        let left = Table::with_index(df!("a" => [1i64, 2], "b" => [0.5, 1.5]).unwrap(), vec![10, 11])
            .unwrap();
        let right = Table::with_index(df!("c" => ["x"], "a" => [3i64]).unwrap(), vec![4]).unwrap();

        let out = run_identity(vec![left.clone(), right.clone()]).unwrap();
        assert!(out[0].equals(&left));
        assert!(out[1].equals(&right));
    }

    #[test]
    fn conflicting_dtypes_are_rejected() {
        let left = Table::new(df!("a" => [1i64]).unwrap());
        let right = Table::new(df!("a" => ["1"]).unwrap());
        let err = run_identity(vec![left, right]).unwrap_err();
        assert!(matches!(err, PipelineError::TypeConflict { ref column, .. } if column == "a"));
    }

    #[test]
    fn empty_batch_skips_transform() {
        let sink = MemorySink::new();
        let mut log = ProcessLog::new(&sink);
        let fail = FnTransform::new(|_| Err(PipelineError::invalid_argument("called")));
        assert!(run(&fail, Vec::new(), &mut log).unwrap().is_empty());
    }

    #[test]
    fn frames_without_columns_are_rejected() {
        let err = run_identity(vec![Table::default()]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn reordered_output_columns_are_kept() {
        let left = Table::new(df!("a" => [1i64], "b" => [2i64]).unwrap());
        let right = Table::new(df!("b" => [3i64]).unwrap());
        let sink = MemorySink::new();
        let mut log = ProcessLog::new(&sink);
        let swap = FnTransform::new(|table: Table| {
            let data = table.data().select(["b", "a"])?;
            table.with_data(data)
        });

        let out = run(&swap, vec![left, right], &mut log).unwrap();
        assert_eq!(out[0].column_names(), vec!["b", "a"]);
        assert_eq!(out[1].column_names(), vec!["b"]);
    }

    #[test]
    fn orphan_rows_are_dropped_with_warning() {
        let left = Table::new(df!("a" => [1i64, 2]).unwrap());
        let sink = MemorySink::new();
        let mut log = ProcessLog::new(&sink);
        let shift = FnTransform::new(|table: Table| {
            let (data, index) = table.into_parts();
            let shifted = index.into_iter().map(|key| key + 1).collect();
            Table::with_index(data, shifted)
        });

        let out = run(&shift, vec![left], &mut log).unwrap();
        log.flush();
        assert_eq!(out[0].height(), 1);
        assert_eq!(out[0].index(), &[1]);
        assert_eq!(sink.messages_at(LogLevel::Warning).len(), 1);
    }
}
