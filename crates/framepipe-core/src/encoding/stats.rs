use std::fmt;
use std::str::FromStr;

use polars::prelude::{DataType, Expr, NamedFrom, Series, col};

use framepipe_model::{PipelineError, Result, StageArgs, StageConfig, Table};

use super::mapping::{GroupMapping, broadcast};
use super::{check_free, check_inputs, encoded_prefix, non_empty_keys};
use crate::log_buffer::ProcessLog;
use crate::stage::{BatchTransform, Stage};

/// Aggregate operations supported by [`StatsEncoding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsOp {
    /// Non-null target values per group.
    Count,
    /// Rows per group, nulls included.
    Size,
    /// Distinct non-null target values per group.
    NUnique,
    Sum,
    Mean,
    Median,
    Min,
    Max,
    /// Sample variance (ddof 1).
    Var,
    /// Sample standard deviation (ddof 1).
    Std,
    /// First non-null value.
    First,
    /// Last non-null value.
    Last,
}

impl StatsOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Size => "size",
            Self::NUnique => "nunique",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Min => "min",
            Self::Max => "max",
            Self::Var => "var",
            Self::Std => "std",
            Self::First => "first",
            Self::Last => "last",
        }
    }

    /// Counting ops produce integers, the rest floats.
    pub fn is_count(self) -> bool {
        matches!(self, Self::Count | Self::Size | Self::NUnique)
    }

    fn expr(self, target: &str) -> Expr {
        let value = col(target);
        let expr = match self {
            Self::Count => value.count(),
            Self::Size => value.len(),
            Self::NUnique => value.drop_nulls().n_unique(),
            Self::Sum => value.sum(),
            Self::Mean => value.mean(),
            Self::Median => value.median(),
            Self::Min => value.min(),
            Self::Max => value.max(),
            Self::Var => value.var(1),
            Self::Std => value.std(1),
            Self::First => value.drop_nulls().first(),
            Self::Last => value.drop_nulls().last(),
        };
        if self.is_count() {
            expr.cast(DataType::Int64)
        } else {
            expr.cast(DataType::Float64)
        }
    }
}

impl fmt::Display for StatsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatsOp {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let op = match s {
            "count" => Self::Count,
            "size" => Self::Size,
            "nunique" => Self::NUnique,
            "sum" => Self::Sum,
            "mean" => Self::Mean,
            "median" => Self::Median,
            "min" => Self::Min,
            "max" => Self::Max,
            "var" => Self::Var,
            "std" => Self::Std,
            "first" => Self::First,
            "last" => Self::Last,
            other => {
                return Err(PipelineError::invalid_argument(format!(
                    "unsupported aggregate '{other}'"
                )));
            }
        };
        Ok(op)
    }
}

/// Encodes grouping columns by aggregates of a target column.
///
/// The mapping is computed on the reference table (position within the
/// scoped batch) and joined many-to-one onto every table. Each op adds one
/// column named `STATS_ENC_<cols joined by &>_BY_<op>_<target>`.
#[derive(Debug, Clone)]
pub struct StatsEncoding {
    cols: Vec<String>,
    target: String,
    ops: Vec<StatsOp>,
    reference: usize,
}

impl StatsEncoding {
    pub const NAME: &'static str = "StatsEncoding";

    /// # Errors
    ///
    /// Empty `cols` or `ops`, or an unsupported op name.
    pub fn new<S: AsRef<str>>(
        cols: Vec<String>,
        target: impl Into<String>,
        ops: &[S],
    ) -> Result<Self> {
        let ops = ops
            .iter()
            .map(|op| op.as_ref().parse())
            .collect::<Result<Vec<StatsOp>>>()?;
        if ops.is_empty() {
            return Err(PipelineError::invalid_argument(
                "stats encoding needs at least one aggregate",
            ));
        }
        Ok(Self {
            cols: non_empty_keys(cols)?,
            target: target.into(),
            ops,
            reference: 0,
        })
    }

    #[must_use]
    pub fn with_reference(mut self, reference: usize) -> Self {
        self.reference = reference;
        self
    }

    /// Builds the stage from `cols`, `target`, `ops` and optional `ref`.
    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        args.ensure_known(Self::NAME, &["cols", "target", "ops", "ref"])?;
        let ops = args.required_str_list("ops")?;
        let encoder = Self::new(
            args.required_str_list("cols")?,
            args.required_str("target")?,
            &ops,
        )?
        .with_reference(args.usize_or("ref", 0)?);
        Ok(encoder.into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::batch(Self::NAME, StageConfig::fixed().with_fixed_columns(false), self)
    }

    /// Output column names, one per op.
    pub fn encoded_names(&self) -> Vec<String> {
        let prefix = encoded_prefix(&self.cols);
        self.ops
            .iter()
            .map(|op| format!("STATS_ENC_{prefix}_BY_{op}_{}", self.target))
            .collect()
    }
}

impl BatchTransform for StatsEncoding {
    fn apply(&self, batch: Vec<Table>, log: &mut ProcessLog<'_>) -> Result<Vec<Table>> {
        let reference = check_inputs(&batch, self.reference, &self.cols, &self.target)?;
        let names = self.encoded_names();
        check_free(&batch, &names)?;
        let aggs = self
            .ops
            .iter()
            .zip(&names)
            .map(|(op, name)| op.expr(&self.target).alias(name.as_str()))
            .collect();
        let mapping = GroupMapping::build(reference.data(), &self.cols, aggs)?;
        log.debug(format!(
            "stats mapping: {} groups from table[{}]",
            mapping.len(),
            self.reference
        ));

        batch
            .into_iter()
            .map(|table| {
                let matches = mapping.match_rows(table.data())?;
                let mut data = table.data().clone();
                for (op, name) in self.ops.iter().zip(&names) {
                    let series = if op.is_count() {
                        let values = broadcast(&matches, &mapping.i64_values(name)?);
                        Series::new(name.as_str().into(), values)
                    } else {
                        let values = broadcast(&matches, &mapping.f64_values(name)?);
                        Series::new(name.as_str().into(), values)
                    };
                    data.with_column(series)?;
                }
                table.with_data(data)
            })
            .collect()
    }
}
