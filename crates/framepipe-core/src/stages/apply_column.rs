use polars::prelude::Column;

use framepipe_model::{PipelineError, Result, StageConfig, Table};

use crate::stage::{Stage, TableTransform};

/// Applies a caller function to one column, replacing it.
///
/// Only constructible in code; it is not part of the stage registry.
pub struct ApplyColumn<F> {
    col: String,
    apply_fn: F,
}

impl<F> ApplyColumn<F>
where
    F: Fn(&Column) -> Result<Column> + Send + Sync + 'static,
{
    pub const NAME: &'static str = "ApplyColumn";

    pub fn new(col: impl Into<String>, apply_fn: F) -> Self {
        Self {
            col: col.into(),
            apply_fn,
        }
    }

    pub fn into_stage(self) -> Stage {
        Stage::separated(Self::NAME, StageConfig::fixed(), self)
    }
}

impl<F> TableTransform for ApplyColumn<F>
where
    F: Fn(&Column) -> Result<Column> + Send + Sync,
{
    fn transform(&self, table: Table) -> Result<Table> {
        let column = table
            .data()
            .column(&self.col)
            .map_err(|_| PipelineError::column_not_found(self.col.clone()))?;
        let applied = (self.apply_fn)(column)?.with_name(self.col.as_str().into());
        let mut data = table.data().clone();
        data.with_column(applied)?;
        table.with_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn replaces_column_in_place() {
        let table = Table::new(df!("a" => [1i64, 2], "b" => [3i64, 4]).unwrap());
        let stage = ApplyColumn::new("a", |column: &Column| {
            let doubled: Vec<Option<i64>> = column.i64()?.into_iter().map(|v| v.map(|v| v * 2)).collect();
            Ok(Column::new("doubled".into(), doubled))
        });
        let out = stage.transform(table).unwrap();
        assert_eq!(out.column_names(), vec!["a", "b"]);
        let a = out.data().column("a").unwrap().i64().unwrap();
        assert_eq!(a.get(1), Some(4));
    }
}
