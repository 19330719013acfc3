//! Stage abstraction and the processing contract every stage runs under.
//!
//! A [`Stage`] pairs a name and a [`StageConfig`] with one of three
//! strategies:
//!
//! - **Separated**: a [`TableTransform`] applied to each table on its own.
//! - **Merged**: a [`TableTransform`] applied once to all tables fused into
//!   one (see [`crate::merged`]).
//! - **Batch**: a [`BatchTransform`] that sees the whole scoped batch.
//!
//! [`Stage::process`] resolves the scope, runs the strategy, logs a per-table
//! summary and then checks the column and row invariants.
//!
//! # Example
//!
//! ```ignore
//! use framepipe_core::{FnTransform, Stage};
//! use framepipe_model::StageConfig;
//!
//! let stage = Stage::separated("Identity", StageConfig::fixed(), FnTransform::new(Ok)).only(0);
//! let out = stage.process(&batch)?;
//! ```

use std::collections::BTreeSet;
use std::fmt;

use framepipe_model::{PipelineError, Result, RowKey, Scope, StageConfig, Table};

use crate::log_buffer::{LogSink, ProcessLog, TracingSink};
use crate::merged;

/// Per-table transform used by the separated and merged strategies.
pub trait TableTransform: Send + Sync {
    fn transform(&self, table: Table) -> Result<Table>;
}

/// Whole-batch transform.
///
/// Receives the scoped sub-batch and must return the same number of tables.
pub trait BatchTransform: Send + Sync {
    fn apply(&self, batch: Vec<Table>, log: &mut ProcessLog<'_>) -> Result<Vec<Table>>;

    /// Inner stages, for composite transforms.
    fn stages(&self) -> &[Stage] {
        &[]
    }
}

/// Adapts a closure to the [`TableTransform`] trait.
pub struct FnTransform<F> {
    transform_fn: F,
}

impl<F> FnTransform<F>
where
    F: Fn(Table) -> Result<Table> + Send + Sync,
{
    pub fn new(transform_fn: F) -> Self {
        Self { transform_fn }
    }
}

impl<F> TableTransform for FnTransform<F>
where
    F: Fn(Table) -> Result<Table> + Send + Sync,
{
    fn transform(&self, table: Table) -> Result<Table> {
        (self.transform_fn)(table)
    }
}

/// How a stage executes over the scoped sub-batch.
pub enum Strategy {
    Separated(Box<dyn TableTransform>),
    Merged(Box<dyn TableTransform>),
    Batch(Box<dyn BatchTransform>),
}

impl Strategy {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Separated(_) => "separated",
            Self::Merged(_) => "merged",
            Self::Batch(_) => "batch",
        }
    }
}

/// One processing unit of a pipeline.
pub struct Stage {
    name: String,
    config: StageConfig,
    strategy: Strategy,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("strategy", &self.strategy.kind())
            .field("children", &self.children().len())
            .finish()
    }
}

impl Stage {
    pub fn new(name: impl Into<String>, config: StageConfig, strategy: Strategy) -> Self {
        Self {
            name: name.into(),
            config,
            strategy,
        }
    }

    pub fn separated(
        name: impl Into<String>,
        config: StageConfig,
        transform: impl TableTransform + 'static,
    ) -> Self {
        Self::new(name, config, Strategy::Separated(Box::new(transform)))
    }

    pub fn merged(
        name: impl Into<String>,
        config: StageConfig,
        transform: impl TableTransform + 'static,
    ) -> Self {
        Self::new(name, config, Strategy::Merged(Box::new(transform)))
    }

    pub fn batch(
        name: impl Into<String>,
        config: StageConfig,
        transform: impl BatchTransform + 'static,
    ) -> Self {
        Self::new(name, config, Strategy::Batch(Box::new(transform)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Limits processing to the given batch positions.
    #[must_use]
    pub fn only(mut self, scope: impl Into<Scope>) -> Self {
        self.config.scope = Some(scope.into());
        self
    }

    /// Replaces the scope; `None` restores "all tables".
    #[must_use]
    pub fn with_scope(mut self, scope: Option<Scope>) -> Self {
        self.config.scope = scope;
        self
    }

    /// Inner stages of a composite stage, empty otherwise.
    pub fn children(&self) -> &[Stage] {
        match &self.strategy {
            Strategy::Batch(transform) => transform.stages(),
            _ => &[],
        }
    }

    /// Processes a batch, flushing diagnostics to `tracing`.
    pub fn process(&self, batch: &[Table]) -> Result<Vec<Table>> {
        self.process_with_sink(batch, &TracingSink)
    }

    /// Processes a batch, flushing diagnostics to `sink`.
    ///
    /// # Errors
    ///
    /// Scope, transform and invariant failures. Buffered records are
    /// flushed before any error is returned.
    pub fn process_with_sink(&self, batch: &[Table], sink: &dyn LogSink) -> Result<Vec<Table>> {
        let mut log = ProcessLog::new(sink);
        log.info(format!("Applying: {}", self.name));

        let before: Vec<Snapshot> = batch.iter().map(Snapshot::of).collect();
        let output = self.run_scoped(batch, &mut log)?;
        let after: Vec<Snapshot> = output.iter().map(Snapshot::of).collect();

        log_summary(&mut log, &before, &after);
        log.flush();

        if self.config.is_fixed_columns
            && let Some(table) = first_change(&before, &after, |s| &s.columns)
        {
            return Err(PipelineError::ColumnsChanged { table });
        }
        if self.config.is_fixed_rows
            && let Some(table) = first_change(&before, &after, |s| &s.rows)
        {
            return Err(PipelineError::RowsChanged { table });
        }
        Ok(output)
    }

    fn run_scoped(&self, batch: &[Table], log: &mut ProcessLog<'_>) -> Result<Vec<Table>> {
        let positions = self.config.resolve_scope(batch.len())?;
        let sub_batch: Vec<Table> = positions.iter().map(|&pos| batch[pos].clone()).collect();

        let processed = self.run_strategy(sub_batch, &positions, log)?;
        if processed.len() != positions.len() {
            return Err(PipelineError::BatchLength {
                expected: positions.len(),
                actual: processed.len(),
            });
        }

        let mut output = batch.to_vec();
        for (pos, table) in positions.into_iter().zip(processed) {
            output[pos] = table;
        }
        Ok(output)
    }

    /// Errors naming a table are re-pointed from sub-batch to batch positions.
    fn run_strategy(
        &self,
        batch: Vec<Table>,
        positions: &[usize],
        log: &mut ProcessLog<'_>,
    ) -> Result<Vec<Table>> {
        match &self.strategy {
            Strategy::Separated(transform) => batch
                .into_iter()
                .zip(positions)
                .map(|(table, &pos)| transform.transform(table).map_err(|err| err.at_table(pos)))
                .collect(),
            Strategy::Merged(transform) => merged::run(transform.as_ref(), batch, log),
            Strategy::Batch(transform) => transform.apply(batch, log).map_err(|err| match err {
                PipelineError::ColumnNotFound { column, table } => PipelineError::ColumnNotFound {
                    column,
                    table: positions.get(table).copied().unwrap_or(table),
                },
                other => other,
            }),
        }
    }
}

struct Snapshot {
    columns: BTreeSet<String>,
    rows: BTreeSet<RowKey>,
}

impl Snapshot {
    fn of(table: &Table) -> Self {
        Self {
            columns: table.column_set(),
            rows: table.row_set(),
        }
    }
}

fn first_change<T: Ord>(
    before: &[Snapshot],
    after: &[Snapshot],
    field: impl Fn(&Snapshot) -> &BTreeSet<T>,
) -> Option<usize> {
    before
        .iter()
        .zip(after)
        .position(|(pre, post)| field(pre) != field(post))
}

fn log_summary(log: &mut ProcessLog<'_>, before: &[Snapshot], after: &[Snapshot]) {
    for (i, (pre, post)) in before.iter().zip(after).enumerate() {
        let added: Vec<&str> = post.columns.difference(&pre.columns).map(String::as_str).collect();
        let dropped: Vec<&str> = pre.columns.difference(&post.columns).map(String::as_str).collect();

        log.info(format!("table[{i}]"));
        log.info(format!("#cols: {} ---> {}", pre.columns.len(), post.columns.len()));
        log.debug(format!("+cols: {{{}}}", added.join(", ")));
        log.debug(format!("-cols: {{{}}}", dropped.join(", ")));
        log.info(format!("#rows: {} ---> {}", pre.rows.len(), post.rows.len()));
    }
}
