//! Core domain model types for procflow.
//!
//! This module contains the values a pipeline produces:
//! - Per-stage results
//! - The accumulated pipeline state
//! - Output modes and mode-shaped return values

mod mode;
mod result;
mod state;

pub use mode::{OutputMode, PipelineOutput};
pub use result::StageResult;
pub use state::PipelineState;
