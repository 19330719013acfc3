//! Shared utilities for framepipe crates.
//!
//! This crate provides common utilities used across the framepipe workspace,
//! including Polars dtype helpers and hashable composite keys.

pub mod key;
pub mod polars;

// Re-export commonly used functions at crate root for convenience
pub use crate::key::{GroupKey, KeyPart, row_keys};
pub use crate::polars::{format_numeric, is_integer_dtype, is_numeric_dtype, parse_dtype};
