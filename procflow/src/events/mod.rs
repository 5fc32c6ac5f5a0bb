//! Lifecycle events emitted while a pipeline runs.

mod sink;

#[cfg(test)]
pub use sink::MockEventSink;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Emitted once before the first stage runs.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Emitted once after the last stage completed.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// Emitted once when a stage failure aborted the run.
pub const PIPELINE_FAILED: &str = "pipeline.failed";
/// Emitted before each stage runs.
pub const STAGE_STARTED: &str = "stage.started";
/// Emitted after each stage that produced a result.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Emitted for the stage that aborted the run.
pub const STAGE_FAILED: &str = "stage.failed";
