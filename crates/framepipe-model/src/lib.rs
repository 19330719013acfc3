//! Data model for framepipe: tables, batches, stage configuration and errors.

pub mod args;
pub mod config;
pub mod error;
pub mod log_level;
pub mod table;

pub use args::{SCOPE_ARG, StageArgs};
pub use config::{Scope, StageConfig};
pub use error::{PipelineError, Result};
pub use log_level::LogLevel;
pub use table::{Batch, RowKey, Table};
