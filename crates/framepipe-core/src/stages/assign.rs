use polars::prelude::{DataType, Expr, IntoLazy, lit};
use polars::sql::sql_expr;
use serde_json::Value;

use framepipe_model::{PipelineError, Result, SCOPE_ARG, StageArgs, StageConfig, Table};

use crate::stage::{Stage, TableTransform};

/// Adds or replaces columns from SQL formulas or scalar values.
///
/// Every formula sees the table as it was before the stage, so one
/// assignment cannot refer to another from the same stage.
#[derive(Debug, Clone, Default)]
pub struct Assign {
    columns: Vec<(String, Expr)>,
}

impl Assign {
    pub const NAME: &'static str = "Assign";

    pub fn new() -> Self {
        Self::default()
    }

    /// Column computed from a SQL expression such as `price * 1.25`.
    ///
    /// # Errors
    ///
    /// Formulas that do not parse.
    pub fn with_formula(self, name: impl Into<String>, formula: &str) -> Result<Self> {
        let name = name.into();
        let expr = sql_expr(formula).map_err(|err| {
            PipelineError::invalid_argument(format!("invalid formula for '{name}': {err}"))
        })?;
        Ok(self.with_expr(name, expr))
    }

    #[must_use]
    pub fn with_expr(mut self, name: impl Into<String>, expr: Expr) -> Self {
        self.columns.push((name.into(), expr));
        self
    }

    /// Strings are formulas; numbers and booleans are broadcast as constants.
    pub fn with_value(self, name: impl Into<String>, value: &Value) -> Result<Self> {
        let name = name.into();
        match value {
            Value::String(formula) => self.with_formula(name, formula),
            Value::Bool(flag) => Ok(self.with_expr(name, lit(*flag))),
            Value::Number(number) => {
                let expr = match (number.as_i64(), number.as_f64()) {
                    (Some(int), _) => lit(int).cast(DataType::Int64),
                    (None, Some(float)) => lit(float),
                    (None, None) => {
                        return Err(PipelineError::invalid_argument(format!(
                            "value {number} for '{name}' is out of range"
                        )));
                    }
                };
                Ok(self.with_expr(name, expr))
            }
            other => Err(PipelineError::invalid_argument(format!(
                "'{name}' must be a formula, number or boolean, got {other}"
            ))),
        }
    }

    /// Every argument except `only` names an output column.
    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        let mut assign = Self::new();
        for (name, value) in args.iter().filter(|(key, _)| *key != SCOPE_ARG) {
            assign = assign.with_value(name, value)?;
        }
        if assign.columns.is_empty() {
            return Err(PipelineError::invalid_argument(
                "Assign needs at least one column",
            ));
        }
        Ok(assign.into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::separated(Self::NAME, StageConfig::fixed().with_fixed_columns(false), self)
    }
}

impl TableTransform for Assign {
    fn transform(&self, table: Table) -> Result<Table> {
        let exprs: Vec<Expr> = self
            .columns
            .iter()
            .map(|(name, expr)| expr.clone().alias(name.as_str()))
            .collect();
        let data = table.data().clone().lazy().with_columns(exprs).collect()?;
        table.with_data(data)
    }
}
