use polars::prelude::{DataType, Expr, IntoLazy};
use polars::sql::sql_expr;

use framepipe_model::{PipelineError, Result, StageArgs, StageConfig, Table};

use crate::stage::{Stage, TableTransform};

const MASK: &str = "__query_mask";

/// Keeps the rows matching a SQL predicate such as `price > 10 AND city = 'oslo'`.
#[derive(Debug, Clone)]
pub struct Query {
    query: String,
    predicate: Expr,
}

impl Query {
    pub const NAME: &'static str = "Query";

    /// # Errors
    ///
    /// Text that does not parse as a SQL expression.
    pub fn new(query: impl Into<String>) -> Result<Self> {
        let query = query.into();
        let predicate = sql_expr(&query).map_err(|err| {
            PipelineError::invalid_argument(format!("invalid query '{query}': {err}"))
        })?;
        Ok(Self { query, predicate })
    }

    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        args.ensure_known(Self::NAME, &["query"])?;
        Ok(Self::new(args.required_str("query")?)?.into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::separated(Self::NAME, StageConfig::fixed().with_fixed_rows(false), self)
    }
}

impl TableTransform for Query {
    fn transform(&self, table: Table) -> Result<Table> {
        let evaluated = table
            .data()
            .clone()
            .lazy()
            .select([self.predicate.clone().alias(MASK)])
            .collect()?;
        let mask = evaluated.column(MASK)?;
        if mask.dtype() != &DataType::Boolean {
            return Err(PipelineError::invalid_argument(format!(
                "query '{}' evaluates to {}, not a boolean",
                self.query,
                mask.dtype()
            )));
        }
        if mask.len() != table.height() {
            return Err(PipelineError::invalid_argument(format!(
                "query '{}' must produce one value per row",
                self.query
            )));
        }
        table.filter_rows(mask.bool()?)
    }
}
