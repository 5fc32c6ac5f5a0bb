//! Per-stage result type.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The captured result of running one stage.
///
/// Command stages populate all three fields. Transform stages only produce
/// `output`; their success is implied by not returning an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Bytes the stage produced (stdout for commands).
    #[serde(default)]
    pub output: Vec<u8>,

    /// Bytes the command wrote to stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Vec<u8>>,

    /// The command's exit code. Signal terminations are reported as `-1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
}

impl StageResult {
    /// Creates the synthetic result standing in for the caller's initial input.
    #[must_use]
    pub fn seed(input: Option<Vec<u8>>) -> Self {
        Self {
            output: input.unwrap_or_default(),
            error: None,
            exit_status: None,
        }
    }

    /// Wraps the return value of a transform stage.
    #[must_use]
    pub fn from_transform(output: Vec<u8>) -> Self {
        Self {
            output,
            error: None,
            exit_status: None,
        }
    }

    /// Creates the result of a finished command stage.
    #[must_use]
    pub fn from_command(output: Vec<u8>, error: Vec<u8>, exit_status: i32) -> Self {
        Self {
            output,
            error: Some(error),
            exit_status: Some(exit_status),
        }
    }

    /// Returns the output decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn output_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }

    /// Returns the captured stderr decoded as UTF-8, if any was captured.
    #[must_use]
    pub fn error_str(&self) -> Option<Cow<'_, str>> {
        self.error.as_deref().map(String::from_utf8_lossy)
    }

    /// Returns true for transforms and for commands that exited with zero.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_status.map_or(true, |code| code == 0)
    }

    /// Returns true if this result came from a command stage.
    #[must_use]
    pub fn is_command(&self) -> bool {
        self.exit_status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_without_input_is_empty() {
        let seed = StageResult::seed(None);
        assert!(seed.output.is_empty());
        assert!(seed.error.is_none());
        assert!(seed.exit_status.is_none());
    }

    #[test]
    fn test_command_result_success() {
        let ok = StageResult::from_command(b"out".to_vec(), Vec::new(), 0);
        let bad = StageResult::from_command(Vec::new(), b"boom".to_vec(), 2);

        assert!(ok.is_success());
        assert!(ok.is_command());
        assert!(!bad.is_success());
        assert_eq!(bad.error_str().as_deref(), Some("boom"));
    }

    #[test]
    fn test_transform_result_has_no_status() {
        let result = StageResult::from_transform(b"HELLO".to_vec());
        assert!(result.is_success());
        assert!(!result.is_command());
        assert_eq!(result.output_str(), "HELLO");
        assert!(result.error_str().is_none());
    }

    #[test]
    fn test_transform_result_serialization_omits_absent_fields() {
        let json = serde_json::to_value(StageResult::from_transform(b"a".to_vec())).unwrap();
        assert_eq!(json, serde_json::json!({"output": [97]}));
    }
}
