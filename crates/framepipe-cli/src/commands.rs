use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use comfy_table::Table as TextTable;
use polars::prelude::{CsvReadOptions, CsvWriter, SerReader, SerWriter};
use tracing::{debug, info, info_span};

use framepipe_core::{PipelineConfig, default_registry};
use framepipe_model::Table;

use crate::summary::apply_table_style;
use crate::types::{RunOptions, RunResult, TableSummary};

pub fn run_stages() -> Result<()> {
    println!("{}", stage_table());
    Ok(())
}

/// Registered stages with their strategy and description.
pub fn stage_table() -> TextTable {
    let mut table = TextTable::new();
    table.set_header(vec!["Stage", "Strategy", "Description"]);
    apply_table_style(&mut table);
    for entry in default_registry().entries() {
        table.add_row(vec![entry.name, entry.strategy, entry.description]);
    }
    table
}

pub fn run_pipeline(options: &RunOptions) -> Result<RunResult> {
    let span = info_span!("run", pipeline = %options.pipeline.display());
    let _guard = span.enter();
    let start = Instant::now();

    let text = fs::read_to_string(&options.pipeline)
        .with_context(|| format!("read pipeline {}", options.pipeline.display()))?;
    let config = PipelineConfig::from_json(&text)
        .with_context(|| format!("parse pipeline {}", options.pipeline.display()))?;
    let stage = config.build().context("build pipeline")?;
    let stages: Vec<String> = stage
        .children()
        .iter()
        .map(|child| child.name().to_string())
        .collect();
    debug!(stages = ?stages, "pipeline built");

    let names = table_names(&options.inputs)?;
    let mut batch = Vec::with_capacity(options.inputs.len());
    for path in &options.inputs {
        batch.push(read_table(path)?);
    }
    info!(tables = batch.len(), "inputs loaded");

    let output = stage.process(&batch).context("process batch")?;

    let output_dir = if options.dry_run {
        None
    } else {
        fs::create_dir_all(&options.output_dir).with_context(|| {
            format!("create output directory {}", options.output_dir.display())
        })?;
        Some(options.output_dir.clone())
    };

    let mut tables = Vec::with_capacity(output.len());
    for ((name, before), after) in names.into_iter().zip(&batch).zip(output) {
        let written = match &output_dir {
            Some(dir) => {
                let path = dir.join(format!("{name}.csv"));
                write_table(&after, &path)?;
                Some(path)
            }
            None => None,
        };
        tables.push(TableSummary {
            name,
            rows_in: before.height(),
            cols_in: before.width(),
            rows_out: after.height(),
            cols_out: after.width(),
            output: written,
        });
    }

    info!(
        tables = tables.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        dry_run = options.dry_run,
        "pipeline finished"
    );
    Ok(RunResult {
        pipeline: options.pipeline.clone(),
        output_dir,
        stages,
        tables,
    })
}

/// Reads a CSV file with a header row into a table with default row keys.
pub fn read_table(path: &Path) -> Result<Table> {
    let data = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("open {}", path.display()))?
        .finish()
        .with_context(|| format!("read {}", path.display()))?;
    debug!(path = %path.display(), rows = data.height(), cols = data.width(), "read table");
    Ok(Table::new(data))
}

/// Writes the table's data with a header row. Row keys are not written.
pub fn write_table(table: &Table, path: &Path) -> Result<()> {
    let mut data = table.data().clone();
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(&mut data)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Output names are the input file stems, which must be unique.
fn table_names(inputs: &[PathBuf]) -> Result<Vec<String>> {
    if inputs.is_empty() {
        bail!("no input files given");
    }
    let mut seen = BTreeSet::new();
    let mut names = Vec::with_capacity(inputs.len());
    for path in inputs {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            bail!("input path has no file name: {}", path.display());
        };
        if !seen.insert(stem.to_string()) {
            bail!("two inputs share the file name {stem:?}");
        }
        names.push(stem.to_string());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_stems_are_rejected() {
        let inputs = vec![PathBuf::from("a/train.csv"), PathBuf::from("b/train.csv")];
        let err = table_names(&inputs).expect_err("must fail");
        assert!(err.to_string().contains("train"));
    }

    #[test]
    fn stems_keep_input_order() {
        let inputs = vec![PathBuf::from("test.csv"), PathBuf::from("data/train.csv")];
        assert_eq!(
            table_names(&inputs).expect("names"),
            vec!["test".to_string(), "train".to_string()]
        );
    }

    #[test]
    fn empty_input_list_is_rejected() {
        assert!(table_names(&[]).is_err());
    }
}
