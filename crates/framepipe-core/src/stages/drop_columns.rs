use framepipe_model::{PipelineError, Result, StageArgs, StageConfig, Table};

use crate::stage::{Stage, TableTransform};

/// Drops columns; every listed column must exist.
#[derive(Debug, Clone)]
pub struct DropColumns {
    cols: Vec<String>,
}

impl DropColumns {
    pub const NAME: &'static str = "DropColumns";

    pub fn new(cols: Vec<String>) -> Self {
        Self { cols }
    }

    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        args.ensure_known(Self::NAME, &["cols"])?;
        Ok(Self::new(args.required_str_list("cols")?).into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::separated(Self::NAME, StageConfig::fixed().with_fixed_columns(false), self)
    }
}

impl TableTransform for DropColumns {
    fn transform(&self, table: Table) -> Result<Table> {
        if let Some(missing) = self.cols.iter().find(|name| !table.has_column(name)) {
            return Err(PipelineError::column_not_found(missing.clone()));
        }
        let data = table.data().drop_many(self.cols.iter().map(String::as_str));
        table.with_data(data)
    }
}
