use std::collections::BTreeSet;

use framepipe_model::{PipelineError, Result, StageArgs, StageConfig, Table};

use crate::stage::{Stage, TableTransform};

/// Renames columns; names absent from a table are ignored.
///
/// All names change at once, so `{a: b, b: a}` swaps two columns and
/// `{a: b, b: c}` shifts them.
#[derive(Debug, Clone)]
pub struct RenameColumns {
    mapping: Vec<(String, String)>,
}

impl RenameColumns {
    pub const NAME: &'static str = "RenameColumns";

    pub fn new(mapping: Vec<(String, String)>) -> Self {
        Self { mapping }
    }

    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        args.ensure_known(Self::NAME, &["mapping"])?;
        Ok(Self::new(args.str_map("mapping")?).into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::separated(Self::NAME, StageConfig::fixed().with_fixed_columns(false), self)
    }
}

impl TableTransform for RenameColumns {
    fn transform(&self, table: Table) -> Result<Table> {
        let names: Vec<String> = table
            .column_names()
            .into_iter()
            .map(|name| match self.mapping.iter().find(|(old, _)| *old == name) {
                Some((_, new)) => new.clone(),
                None => name,
            })
            .collect();
        let mut seen = BTreeSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::invalid_argument(format!(
                    "renaming would produce the column '{name}' twice"
                )));
            }
        }
        let mut data = table.data().clone();
        data.set_column_names(names)?;
        table.with_data(data)
    }
}
