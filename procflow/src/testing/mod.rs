//! Testing utilities for procflow pipelines.
//!
//! This module provides:
//! - Assertions for stage results and pipeline state
//! - Recording, failing and constant transform stages

mod assertions;
mod mocks;

pub use assertions::{assert_exit_ok, assert_exit_status, assert_output_eq, assert_stage_count};
pub use mocks::{constant_transform, failing_transform, RecordingTransform};
