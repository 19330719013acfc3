use std::collections::HashMap;

use polars::prelude::{NamedFrom, Series};

use framepipe_common::KeyPart;
use framepipe_model::{PipelineError, Result, StageArgs, StageConfig, Table};

use crate::stage::{Stage, TableTransform};

/// Replaces columns by `UInt32` category codes shared across the batch.
///
/// Runs merged, so equal values get equal codes in every table. Codes are
/// assigned in order of first appearance (table then row). Nulls stay null
/// unless `fillna` names a category for them.
#[derive(Debug, Clone)]
pub struct CategoryCodes {
    cols: Vec<String>,
    fillna: Option<String>,
}

impl CategoryCodes {
    pub const NAME: &'static str = "CategoryCodes";

    pub fn new(cols: Vec<String>) -> Self {
        Self { cols, fillna: None }
    }

    #[must_use]
    pub fn with_fillna(mut self, fillna: Option<String>) -> Self {
        self.fillna = fillna;
        self
    }

    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        args.ensure_known(Self::NAME, &["cols", "fillna"])?;
        let stage = Self::new(args.required_str_list("cols")?).with_fillna(args.optional_str("fillna")?);
        Ok(stage.into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::merged(Self::NAME, StageConfig::fixed(), self)
    }
}

impl TableTransform for CategoryCodes {
    fn transform(&self, table: Table) -> Result<Table> {
        let mut data = table.data().clone();
        let fill = self.fillna.clone().map(KeyPart::Text);
        for name in &self.cols {
            let column = data
                .column(name)
                .map_err(|_| PipelineError::column_not_found(name.clone()))?;

            let mut categories: HashMap<KeyPart, u32> = HashMap::new();
            let mut codes = Vec::with_capacity(column.len());
            for idx in 0..column.len() {
                let part = KeyPart::from_any(column.get(idx)?).or_else(|| fill.clone());
                codes.push(part.map(|part| {
                    let next = categories.len() as u32;
                    *categories.entry(part).or_insert(next)
                }));
            }
            data.with_column(Series::new(name.as_str().into(), codes))?;
        }
        table.with_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn codes_follow_first_appearance() {
        let table = Table::new(df!("c" => [Some("b"), Some("a"), None, Some("b")]).unwrap());
        let out = CategoryCodes::new(vec!["c".into()]).transform(table).unwrap();
        let codes: Vec<Option<u32>> = out.data().column("c").unwrap().u32().unwrap().into_iter().collect();
        assert_eq!(codes, vec![Some(0), Some(1), None, Some(0)]);
    }

    #[test]
    fn fillna_makes_nulls_a_category() {
        let table = Table::new(df!("c" => [None, Some("a"), None]).unwrap());
        let stage = CategoryCodes::new(vec!["c".into()]).with_fillna(Some("missing".into()));
        let out = stage.transform(table).unwrap();
        let codes: Vec<Option<u32>> = out.data().column("c").unwrap().u32().unwrap().into_iter().collect();
        assert_eq!(codes, vec![Some(0), Some(1), Some(0)]);
    }
}
