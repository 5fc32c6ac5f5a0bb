//! Test assertions for stage results and pipeline state.

use crate::core::{PipelineState, StageResult};

/// Asserts that the result came from a command that exited with zero.
pub fn assert_exit_ok(result: &StageResult) {
    assert_eq!(
        result.exit_status,
        Some(0),
        "Expected exit status 0, got {:?}. stderr: {:?}",
        result.exit_status,
        result.error_str()
    );
}

/// Asserts that the result exited with `expected`.
pub fn assert_exit_status(result: &StageResult, expected: i32) {
    assert_eq!(
        result.exit_status,
        Some(expected),
        "Expected exit status {}, got {:?}",
        expected,
        result.exit_status
    );
}

/// Asserts that the result's output equals `expected`.
pub fn assert_output_eq(result: &StageResult, expected: impl AsRef<[u8]>) {
    let expected = expected.as_ref();
    assert!(
        result.output == expected,
        "Expected output {:?}, got {:?}",
        String::from_utf8_lossy(expected),
        result.output_str()
    );
}

/// Asserts that exactly `expected` stages ran.
pub fn assert_stage_count(state: &PipelineState, expected: usize) {
    assert_eq!(
        state.len(),
        expected,
        "Expected {} stage results, got {}",
        expected,
        state.len()
    );
}
