//! Per-call runtime: cancellation tokens and the task pipeline (C8).

pub mod cancel;
pub mod pipeline;

pub use cancel::{CancelMap, CancelToken};
pub use pipeline::{PipelineConfig, TaskPipeline};
