//! Reference-driven encoders.
//!
//! Both encoders compute a per-group mapping on one reference table of the
//! scoped batch and broadcast it onto every table by group key:
//!
//! - [`StatsEncoding`]: arbitrary aggregates of a target column.
//! - [`TargetEncoding`]: smoothed target mean with prior imputation.

mod mapping;
mod stats;
mod target;

pub use stats::{StatsEncoding, StatsOp};
pub use target::TargetEncoding;

use framepipe_common::is_numeric_dtype;
use framepipe_model::{PipelineError, Result, Table};

/// Returns the reference table, checking that every table carries the
/// grouping columns and the reference carries a numeric target.
fn check_inputs<'a>(
    batch: &'a [Table],
    reference: usize,
    keys: &[String],
    target: &str,
) -> Result<&'a Table> {
    let Some(reference_table) = batch.get(reference) else {
        return Err(PipelineError::TableOutOfRange {
            index: reference,
            len: batch.len(),
        });
    };

    for (position, table) in batch.iter().enumerate() {
        if let Some(missing) = keys.iter().find(|key| !table.has_column(key)) {
            return Err(PipelineError::ColumnNotFound {
                column: missing.clone(),
                table: position,
            });
        }
    }

    match reference_table.dtype_of(target) {
        None => Err(PipelineError::ColumnNotFound {
            column: target.to_string(),
            table: reference,
        }),
        Some(dtype) if !is_numeric_dtype(&dtype) => Err(PipelineError::invalid_argument(format!(
            "target column '{target}' must be numeric, found {dtype}"
        ))),
        Some(_) => Ok(reference_table),
    }
}

/// Rejects output names a table already carries.
fn check_free(batch: &[Table], names: &[String]) -> Result<()> {
    for (position, table) in batch.iter().enumerate() {
        if let Some(taken) = names.iter().find(|name| table.has_column(name)) {
            return Err(PipelineError::invalid_argument(format!(
                "table[{position}] already has column '{taken}'"
            )));
        }
    }
    Ok(())
}

fn encoded_prefix(keys: &[String]) -> String {
    keys.join("&")
}

fn non_empty_keys(keys: Vec<String>) -> Result<Vec<String>> {
    if keys.is_empty() {
        return Err(PipelineError::invalid_argument(
            "encoding needs at least one grouping column",
        ));
    }
    Ok(keys)
}
