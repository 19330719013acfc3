use std::collections::BTreeSet;

use polars::prelude::Column;

use framepipe_common::KeyPart;
use framepipe_model::{PipelineError, Result, StageArgs, StageConfig, Table};

use crate::stage::{Stage, TableTransform};

/// Drops repeated rows, keeping the first occurrence and its row key.
///
/// Uniqueness is judged on `cols` when given, otherwise on all columns.
/// Nulls compare equal to each other.
#[derive(Debug, Clone, Default)]
pub struct DropDuplicates {
    cols: Option<Vec<String>>,
}

impl DropDuplicates {
    pub const NAME: &'static str = "DropDuplicates";

    pub fn new(cols: Option<Vec<String>>) -> Self {
        Self { cols }
    }

    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        args.ensure_known(Self::NAME, &["cols"])?;
        Ok(Self::new(args.optional_str_list("cols")?).into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::separated(Self::NAME, StageConfig::fixed().with_fixed_rows(false), self)
    }
}

impl TableTransform for DropDuplicates {
    fn transform(&self, table: Table) -> Result<Table> {
        let data = table.data();
        let columns: Vec<&Column> = match &self.cols {
            Some(cols) => cols
                .iter()
                .map(|name| {
                    data.column(name)
                        .map_err(|_| PipelineError::column_not_found(name.clone()))
                })
                .collect::<Result<_>>()?,
            None => data.get_columns().iter().collect(),
        };

        let mut seen = BTreeSet::new();
        let mut keep = Vec::with_capacity(data.height());
        for idx in 0..data.height() {
            let composite = columns
                .iter()
                .map(|column| column.get(idx).map(KeyPart::from_any))
                .collect::<polars::prelude::PolarsResult<Vec<Option<KeyPart>>>>()?;
            keep.push(seen.insert(composite));
        }
        table.retain_rows(&keep)
    }
}
