//! Library side of the `framepipe` binary: CSV loading, running a
//! pipeline document over a batch, and rendering the result.

pub mod commands;
pub mod logging;
pub mod summary;
pub mod types;
