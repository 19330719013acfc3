use framepipe_model::{PipelineError, Result, StageArgs, StageConfig, Table};

use crate::stage::{Stage, TableTransform};

/// Keeps the listed columns in the listed order.
///
/// Columns named in `lackable_cols` may be missing; any other missing column
/// is an error.
#[derive(Debug, Clone)]
pub struct Select {
    cols: Vec<String>,
    lackable_cols: Vec<String>,
}

impl Select {
    pub const NAME: &'static str = "Select";

    pub fn new(cols: Vec<String>) -> Self {
        Self {
            cols,
            lackable_cols: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_lackable(mut self, lackable_cols: Vec<String>) -> Self {
        self.lackable_cols = lackable_cols;
        self
    }

    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        args.ensure_known(Self::NAME, &["cols", "lackable_cols"])?;
        let stage = Self::new(args.required_str_list("cols")?)
            .with_lackable(args.optional_str_list("lackable_cols")?.unwrap_or_default());
        Ok(stage.into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::separated(Self::NAME, StageConfig::fixed().with_fixed_columns(false), self)
    }
}

impl TableTransform for Select {
    fn transform(&self, table: Table) -> Result<Table> {
        let mut keep = Vec::with_capacity(self.cols.len());
        for name in &self.cols {
            if table.has_column(name) {
                keep.push(name.as_str());
            } else if !self.lackable_cols.contains(name) {
                return Err(PipelineError::column_not_found(name.clone()));
            }
        }
        let data = table.data().select(keep)?;
        table.with_data(data)
    }
}
