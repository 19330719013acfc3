//! Builds stages from a nested list of JSON records.
//!
//! An object is one stage: its `name` field is looked up in the registry
//! and the remaining fields become the stage's [`StageArgs`]. A list is a
//! pipeline of its items, which may themselves be lists.
//!
//! ```json
//! {
//!   "processing": [
//!     {"name": "DropColumns", "cols": ["id"]},
//!     [{"name": "TargetEncoding", "cols": ["city"], "target": "price", "only": [0, 1]}]
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use framepipe_model::{PipelineError, Result, StageArgs};

use crate::pipeline::Pipeline;
use crate::registry::{StageRegistry, default_registry};
use crate::stage::Stage;

/// Top-level pipeline document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub processing: Value,
}

impl PipelineConfig {
    /// Parses a JSON document with a `processing` key.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|err| PipelineError::invalid_argument(format!("invalid pipeline document: {err}")))
    }

    pub fn build(&self) -> Result<Stage> {
        from_list(&self.processing)
    }
}

/// Builds a pipeline stage from a record or list of records using the
/// default registry. The result is always a pipeline.
pub fn from_list(value: &Value) -> Result<Stage> {
    from_list_with(default_registry(), value)
}

/// Same as [`from_list`] with an explicit registry.
pub fn from_list_with(registry: &StageRegistry, value: &Value) -> Result<Stage> {
    match value {
        Value::Array(_) => create(registry, value),
        Value::Object(_) => {
            let stage = create(registry, value)?;
            Ok(Pipeline::from_stages(vec![stage]).into_stage())
        }
        other => Err(not_a_stage(other)),
    }
}

fn create(registry: &StageRegistry, value: &Value) -> Result<Stage> {
    match value {
        Value::Object(record) => {
            let mut record = record.clone();
            let name = match record.remove("name") {
                Some(Value::String(name)) => name,
                Some(other) => {
                    return Err(PipelineError::invalid_argument(format!(
                        "stage name must be a string, got {other}"
                    )));
                }
                None => {
                    return Err(PipelineError::invalid_argument(
                        "stage record has no 'name' field",
                    ));
                }
            };
            registry.build(&name, &StageArgs::from_map(record))
        }
        Value::Array(items) => {
            let stages = items
                .iter()
                .map(|item| create(registry, item))
                .collect::<Result<Vec<_>>>()?;
            Ok(Pipeline::from_stages(stages).into_stage())
        }
        other => Err(not_a_stage(other)),
    }
}

fn not_a_stage(value: &Value) -> PipelineError {
    PipelineError::invalid_argument(format!(
        "expected a stage record or a list of them, got {value}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(stage: &Stage) -> Vec<&str> {
        stage.children().iter().map(Stage::name).collect()
    }

    #[test]
    fn list_becomes_pipeline() {
        let stage = from_list(&json!([
            {"name": "DropColumns", "cols": ["a"]},
            {"name": "RenameColumns", "mapping": {"b": "c"}},
        ]))
        .unwrap();
        assert_eq!(stage.name(), "Pipeline");
        assert_eq!(names(&stage), vec!["DropColumns", "RenameColumns"]);
    }

    #[test]
    fn nested_lists_become_nested_pipelines() {
        let stage = from_list(&json!([
            {"name": "DropColumns", "cols": ["a"]},
            [{"name": "Select", "cols": ["b"]}],
        ]))
        .unwrap();
        assert_eq!(names(&stage), vec!["DropColumns", "Pipeline"]);
        assert_eq!(names(&stage.children()[1]), vec!["Select"]);
    }

    #[test]
    fn single_record_is_wrapped() {
        let stage = from_list(&json!({"name": "DropColumns", "cols": ["a"]})).unwrap();
        assert_eq!(names(&stage), vec!["DropColumns"]);
    }

    #[test]
    fn rejects_scalars_and_unknown_names() {
        assert!(matches!(
            from_list(&json!(3)),
            Err(PipelineError::InvalidArgument(_))
        ));
        assert!(matches!(
            from_list(&json!([{"name": "Shuffle", "seed": 0}])),
            Err(PipelineError::UnknownStage(_))
        ));
        assert!(matches!(
            from_list(&json!([{"cols": ["a"]}])),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn parses_pipeline_document() {
        let config = PipelineConfig::from_json(
            r#"{"processing": [{"name": "TargetEncoding", "cols": ["k"], "target": "y", "only": [0, 1]}]}"#,
        )
        .unwrap();
        let stage = config.build().unwrap();
        let encoder = &stage.children()[0];
        assert_eq!(encoder.name(), "TargetEncoding");
        assert_eq!(encoder.config().resolve_scope(2).unwrap(), vec![0, 1]);
    }
}
