//! Configuration for running command stages.

use crate::errors::PipelineValidationError;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`RunnerConfig::ignore_broken_pipe`].
pub const ENV_IGNORE_BROKEN_PIPE: &str = "PROCFLOW_IGNORE_BROKEN_PIPE";
/// Environment variable overriding [`RunnerConfig::fail_on_nonzero_exit`].
pub const ENV_FAIL_ON_NONZERO_EXIT: &str = "PROCFLOW_FAIL_ON_NONZERO_EXIT";
/// Environment variable overriding [`RunnerConfig::kill_on_drop`].
pub const ENV_KILL_ON_DROP: &str = "PROCFLOW_KILL_ON_DROP";

/// Knobs controlling how the stage runner treats child processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Treat `EPIPE` while writing a child's stdin as success.
    ///
    /// Off by default: a child that exits without reading all of its input
    /// fails the stage, like any other stream error.
    #[serde(default)]
    pub ignore_broken_pipe: bool,

    /// Abort the pipeline when a command exits with a non-zero status.
    ///
    /// Off by default: non-zero exits are recorded in the stage result and the
    /// pipeline keeps running.
    #[serde(default)]
    pub fail_on_nonzero_exit: bool,

    /// Kill the child if its handle is dropped before it was waited on.
    #[serde(default = "default_kill_on_drop")]
    pub kill_on_drop: bool,
}

fn default_kill_on_drop() -> bool {
    true
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            ignore_broken_pipe: false,
            fail_on_nonzero_exit: false,
            kill_on_drop: default_kill_on_drop(),
        }
    }
}

impl RunnerConfig {
    /// Creates a new runner configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether broken pipes on stdin are ignored.
    #[must_use]
    pub fn with_ignore_broken_pipe(mut self, ignore: bool) -> Self {
        self.ignore_broken_pipe = ignore;
        self
    }

    /// Sets whether non-zero exits abort the pipeline.
    #[must_use]
    pub fn with_fail_on_nonzero_exit(mut self, fail: bool) -> Self {
        self.fail_on_nonzero_exit = fail;
        self
    }

    /// Sets whether children are killed when their handle is dropped.
    #[must_use]
    pub fn with_kill_on_drop(mut self, kill: bool) -> Self {
        self.kill_on_drop = kill;
        self
    }

    /// Builds a configuration from the `PROCFLOW_*` environment variables,
    /// falling back to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to something other than a boolean.
    pub fn from_env() -> Result<Self, PipelineValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is set to something other than a boolean.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_IGNORE_BROKEN_PIPE) {
            config.ignore_broken_pipe = parse_flag(ENV_IGNORE_BROKEN_PIPE, &value)?;
        }
        if let Some(value) = lookup(ENV_FAIL_ON_NONZERO_EXIT) {
            config.fail_on_nonzero_exit = parse_flag(ENV_FAIL_ON_NONZERO_EXIT, &value)?;
        }
        if let Some(value) = lookup(ENV_KILL_ON_DROP) {
            config.kill_on_drop = parse_flag(ENV_KILL_ON_DROP, &value)?;
        }
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, PipelineValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PipelineValidationError::new(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert!(!config.ignore_broken_pipe);
        assert!(!config.fail_on_nonzero_exit);
        assert!(config.kill_on_drop);
    }

    #[test]
    fn test_builder() {
        let config = RunnerConfig::new()
            .with_ignore_broken_pipe(true)
            .with_fail_on_nonzero_exit(true)
            .with_kill_on_drop(false);

        assert!(config.ignore_broken_pipe);
        assert!(config.fail_on_nonzero_exit);
        assert!(!config.kill_on_drop);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_IGNORE_BROKEN_PIPE, "yes"),
            (ENV_KILL_ON_DROP, "0"),
        ]
        .into_iter()
        .collect();

        let config = RunnerConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();
        assert!(config.ignore_broken_pipe);
        assert!(!config.fail_on_nonzero_exit);
        assert!(!config.kill_on_drop);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = RunnerConfig::from_lookup(|key| {
            (key == ENV_FAIL_ON_NONZERO_EXIT).then(|| "maybe".to_string())
        })
        .unwrap_err();

        assert!(err.message.contains(ENV_FAIL_ON_NONZERO_EXIT));
        assert!(err.message.contains("maybe"));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: RunnerConfig = serde_json::from_str(r#"{"fail_on_nonzero_exit": true}"#).unwrap();
        assert!(config.fail_on_nonzero_exit);
        assert!(config.kill_on_drop);
    }
}
