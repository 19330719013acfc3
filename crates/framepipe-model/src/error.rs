//! Error types for batch processing.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors that can occur while processing a batch of tables.
#[derive(Debug, Error)]
pub enum PipelineError {
    // === Contract Violations ===
    /// A fixed-columns stage changed the column-name set of a table.
    #[error("columns changed in table[{table}]; enable debug logging to see added/removed columns")]
    ColumnsChanged { table: usize },

    /// A fixed-rows stage changed the row-key set of a table.
    #[error("rows changed in table[{table}]; enable debug logging to see row counts")]
    RowsChanged { table: usize },

    /// Tables sharing a column declare different dtypes.
    #[error("column '{column}' has different dtypes across tables: {left} vs {right}")]
    TypeConflict {
        column: String,
        left: String,
        right: String,
    },

    /// A broadcast join found duplicate keys on its "one" side.
    #[error("join on [{keys}] expected unique keys on the mapping side, found duplicate key {key}")]
    JoinCardinality { keys: String, key: String },

    // === Argument Errors ===
    /// Malformed argument (scope, mode name, log level, stage argument).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Stage name not present in the registry.
    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    // === Shape Errors ===
    /// Column referenced by a stage is missing.
    #[error("column '{column}' not found in table[{table}]")]
    ColumnNotFound { column: String, table: usize },

    /// Table position outside the batch.
    #[error("table index {index} is out of range for a batch of {len} tables")]
    TableOutOfRange { index: usize, len: usize },

    /// A transform returned the wrong number of tables.
    #[error("transform returned {actual} tables for {expected} inputs")]
    BatchLength { expected: usize, actual: usize },

    /// Row index length does not match the frame height.
    #[error("row index has {keys} keys but the frame has {rows} rows")]
    IndexLength { keys: usize, rows: usize },

    /// Row key appears twice in a row index.
    #[error("row key {key} is duplicated in the row index")]
    DuplicateRowKey { key: i64 },

    // === DataFrame Errors ===
    /// Failed Polars operation.
    #[error("DataFrame operation failed: {0}")]
    Polars(#[from] PolarsError),
}

impl PipelineError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Missing column in a table whose position the caller fills in later
    /// with [`PipelineError::at_table`].
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
            table: 0,
        }
    }

    /// Points a `ColumnNotFound` error at a batch position; other errors pass through.
    #[must_use]
    pub fn at_table(self, position: usize) -> Self {
        match self {
            Self::ColumnNotFound { column, .. } => Self::ColumnNotFound {
                column,
                table: position,
            },
            other => other,
        }
    }
}

/// Result type for batch processing operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::ColumnsChanged { table: 1 };
        assert_eq!(
            err.to_string(),
            "columns changed in table[1]; enable debug logging to see added/removed columns"
        );
    }

    #[test]
    fn test_error_from_polars() {
        let polars_err = PolarsError::ColumnNotFound("test".into());
        let err: PipelineError = polars_err.into();
        assert!(matches!(err, PipelineError::Polars(_)));
    }

    #[test]
    fn test_at_table_only_moves_missing_columns() {
        let err = PipelineError::column_not_found("x").at_table(3);
        assert_eq!(err.to_string(), "column 'x' not found in table[3]");

        let err = PipelineError::RowsChanged { table: 1 }.at_table(3);
        assert!(matches!(err, PipelineError::RowsChanged { table: 1 }));
    }
}
