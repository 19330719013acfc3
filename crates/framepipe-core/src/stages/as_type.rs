use polars::prelude::DataType;

use framepipe_common::parse_dtype;
use framepipe_model::{PipelineError, Result, StageArgs, StageConfig, Table};

use crate::stage::{Stage, TableTransform};

/// Casts columns to named dtypes (`int64`, `float32`, `str`, ...).
#[derive(Debug, Clone)]
pub struct AsType {
    mapping: Vec<(String, DataType)>,
}

impl AsType {
    pub const NAME: &'static str = "AsType";

    /// # Errors
    ///
    /// Unknown dtype names.
    pub fn new(mapping: Vec<(String, String)>) -> Result<Self> {
        let mapping = mapping
            .into_iter()
            .map(|(column, dtype)| match parse_dtype(&dtype) {
                Some(parsed) => Ok((column, parsed)),
                None => Err(PipelineError::invalid_argument(format!(
                    "unsupported dtype '{dtype}' for column '{column}'"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { mapping })
    }

    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        args.ensure_known(Self::NAME, &["mapping"])?;
        Ok(Self::new(args.str_map("mapping")?)?.into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::separated(Self::NAME, StageConfig::fixed(), self)
    }
}

impl TableTransform for AsType {
    fn transform(&self, table: Table) -> Result<Table> {
        let mut data = table.data().clone();
        for (name, dtype) in &self.mapping {
            let column = data
                .column(name)
                .map_err(|_| PipelineError::column_not_found(name.clone()))?;
            let cast = column.strict_cast(dtype)?;
            data.with_column(cast)?;
        }
        table.with_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn casts_named_columns() {
        let table = Table::new(df!("a" => [1i64, 2], "b" => ["1.5", "2"]).unwrap());
        let stage = AsType::new(vec![
            ("a".to_string(), "float32".to_string()),
            ("b".to_string(), "float64".to_string()),
        ])
        .unwrap();

        let out = stage.transform(table).unwrap();
        assert_eq!(out.dtype_of("a"), Some(DataType::Float32));
        assert_eq!(out.dtype_of("b"), Some(DataType::Float64));
    }

    #[test]
    fn unknown_dtype_name_is_rejected() {
        let err = AsType::new(vec![("a".to_string(), "decimal".to_string())]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }
}
