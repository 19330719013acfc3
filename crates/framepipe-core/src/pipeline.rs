//! Ordered composition of stages.
//!
//! A [`Pipeline`] is itself a stage (neither columns nor rows fixed). Each
//! inner stage runs the full processing contract, including its own
//! validation, before the next one starts. The first failure aborts the run.
//!
//! # Example
//!
//! ```ignore
//! use framepipe_core::pipeline::Pipeline;
//!
//! let stage = Pipeline::new()
//!     .add_stage(DropColumns::new(vec!["id".into()]).into_stage())
//!     .add_stage(TargetEncoding::new(vec!["city".into()], "price")?.into_stage())
//!     .into_stage();
//! let out = stage.process(&batch)?;
//! ```

use framepipe_model::{Result, StageConfig, Table};

use crate::log_buffer::ProcessLog;
use crate::stage::{BatchTransform, Stage};

/// An ordered list of stages.
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub const NAME: &'static str = "Pipeline";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stages(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Add a stage to the end of the pipeline.
    #[must_use]
    pub fn add_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn into_stage(self) -> Stage {
        Stage::batch(Self::NAME, StageConfig::unfixed(), self)
    }
}

impl BatchTransform for Pipeline {
    fn apply(&self, batch: Vec<Table>, log: &mut ProcessLog<'_>) -> Result<Vec<Table>> {
        let sink = log.sink();
        let mut batch = batch;
        for stage in &self.stages {
            batch = stage.process_with_sink(&batch, sink)?;
        }
        Ok(batch)
    }

    fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::FnTransform;
    use framepipe_model::PipelineError;
    use polars::df;

    fn failing(name: &str) -> Stage {
        Stage::separated(
            name,
            StageConfig::fixed(),
            FnTransform::new(|_| Err(PipelineError::invalid_argument("boom"))),
        )
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let batch = vec![Table::new(df!("a" => [1i64]).unwrap())];
        let out = Pipeline::new().into_stage().process(&batch).unwrap();
        assert!(out[0].equals(&batch[0]));
    }

    #[test]
    fn first_error_aborts() {
        let batch = vec![Table::new(df!("a" => [1i64]).unwrap())];
        let stage = Pipeline::new()
            .add_stage(failing("first"))
            .add_stage(failing("second"))
            .into_stage();
        assert!(matches!(
            stage.process(&batch),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn exposes_children() {
        let stage = Pipeline::new()
            .add_stage(failing("first"))
            .add_stage(failing("second"))
            .into_stage();
        let names: Vec<&str> = stage.children().iter().map(Stage::name).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(!stage.config().is_fixed_columns);
        assert!(!stage.config().is_fixed_rows);
    }
}
