//! Batch processing engine for framepipe.
//!
//! Stages transform a batch of [`Table`](framepipe_model::Table)s under a
//! contract that checks column and row invariants after every stage.
//! Stages run per table, on all tables fused into one, or on the batch as
//! a whole; pipelines compose them.

pub mod builder;
pub mod encoding;
pub mod log_buffer;
mod merged;
pub mod pipeline;
pub mod registry;
pub mod stage;
pub mod stages;

pub use builder::{PipelineConfig, from_list, from_list_with};
pub use encoding::{StatsEncoding, StatsOp, TargetEncoding};
pub use log_buffer::{LogSink, MemorySink, ProcessLog, TracingSink};
pub use pipeline::Pipeline;
pub use registry::{StageEntry, StageRegistry, default_registry};
pub use stage::{BatchTransform, FnTransform, Stage, Strategy, TableTransform};
