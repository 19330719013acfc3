use polars::prelude::{ChunkAgg, DataType, NamedFrom, Series, col};

use framepipe_model::{PipelineError, Result, StageArgs, StageConfig, Table};

use super::mapping::{GroupMapping, broadcast};
use super::{check_free, check_inputs, encoded_prefix, non_empty_keys};
use crate::log_buffer::ProcessLog;
use crate::stage::{BatchTransform, Stage};

const COUNT: &str = "#count";
const MEAN: &str = "#mean";

/// Target mean encoding with additive smoothing towards the global mean.
///
/// For a group with `n` non-null targets and mean `m`, the encoding is
/// `n / (n + w) * m + w / (n + w) * p` where `p` is the target mean of the
/// reference table and `w` the prior weight. With `w == 0` the raw group
/// mean is used. Groups without a non-null target encode as null; only
/// imputation replaces those with the prior.
#[derive(Debug, Clone)]
pub struct TargetEncoding {
    cols: Vec<String>,
    target: String,
    reference: usize,
    prior_weight: f64,
    impute_by_prior: bool,
}

impl TargetEncoding {
    pub const NAME: &'static str = "TargetEncoding";

    pub fn new(cols: Vec<String>, target: impl Into<String>) -> Result<Self> {
        Ok(Self {
            cols: non_empty_keys(cols)?,
            target: target.into(),
            reference: 0,
            prior_weight: 1.0,
            impute_by_prior: true,
        })
    }

    #[must_use]
    pub fn with_reference(mut self, reference: usize) -> Self {
        self.reference = reference;
        self
    }

    /// # Errors
    ///
    /// Negative or NaN weights.
    pub fn with_prior_weight(mut self, prior_weight: f64) -> Result<Self> {
        if prior_weight.is_nan() || prior_weight < 0.0 {
            return Err(PipelineError::invalid_argument(format!(
                "prior_weight must be >= 0, got {prior_weight}"
            )));
        }
        self.prior_weight = prior_weight;
        Ok(self)
    }

    #[must_use]
    pub fn with_impute_by_prior(mut self, impute: bool) -> Self {
        self.impute_by_prior = impute;
        self
    }

    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        args.ensure_known(
            Self::NAME,
            &["cols", "target", "ref", "prior_weight", "impute_by_prior"],
        )?;
        let encoder = Self::new(args.required_str_list("cols")?, args.required_str("target")?)?
            .with_reference(args.usize_or("ref", 0)?)
            .with_prior_weight(args.f64_or("prior_weight", 1.0)?)?
            .with_impute_by_prior(args.bool_or("impute_by_prior", true)?);
        Ok(encoder.into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::batch(Self::NAME, StageConfig::fixed().with_fixed_columns(false), self)
    }

    pub fn encoded_name(&self) -> String {
        format!("TARGET_ENC_{}_BY_{}", encoded_prefix(&self.cols), self.target)
    }

    fn smooth(&self, count: Option<i64>, mean: Option<f64>, prior: Option<f64>) -> Option<f64> {
        let mean = mean?;
        if self.prior_weight == 0.0 {
            return Some(mean);
        }
        let n = count.unwrap_or(0) as f64;
        let w = self.prior_weight;
        Some(n / (n + w) * mean + w / (n + w) * prior?)
    }
}

impl BatchTransform for TargetEncoding {
    fn apply(&self, batch: Vec<Table>, log: &mut ProcessLog<'_>) -> Result<Vec<Table>> {
        let reference = check_inputs(&batch, self.reference, &self.cols, &self.target)?;
        let name = self.encoded_name();
        check_free(&batch, std::slice::from_ref(&name))?;
        let prior = reference
            .data()
            .column(&self.target)?
            .cast(&DataType::Float64)?
            .f64()?
            .mean();

        let count_alias = format!("{name}{COUNT}");
        let mean_alias = format!("{name}{MEAN}");
        let aggs = vec![
            col(self.target.as_str()).count().cast(DataType::Int64).alias(count_alias.as_str()),
            col(self.target.as_str())
                .cast(DataType::Float64)
                .mean()
                .alias(mean_alias.as_str()),
        ];
        let mapping = GroupMapping::build(reference.data(), &self.cols, aggs)?;
        let encoded: Vec<Option<f64>> = mapping
            .i64_values(&count_alias)?
            .into_iter()
            .zip(mapping.f64_values(&mean_alias)?)
            .map(|(count, mean)| self.smooth(count, mean, prior))
            .collect();
        log.debug(format!(
            "target mapping: {} groups from table[{}], prior {}",
            mapping.len(),
            self.reference,
            prior.map_or_else(|| "null".to_string(), framepipe_common::format_numeric)
        ));

        batch
            .into_iter()
            .map(|table| {
                let matches = mapping.match_rows(table.data())?;
                let mut values = broadcast(&matches, &encoded);
                if self.impute_by_prior {
                    for value in values.iter_mut().filter(|value| value.is_none()) {
                        *value = prior;
                    }
                }
                let mut data = table.data().clone();
                data.with_column(Series::new(name.as_str().into(), values))?;
                table.with_data(data)
            })
            .collect()
    }
}
