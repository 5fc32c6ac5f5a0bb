//! Error types for procflow pipelines.
//!
//! Failures come in three shapes: a command stage that could not be spawned or
//! driven ([`StageExecutionError`]), a transform stage whose callable returned an
//! error, and a pipeline that was assembled incorrectly
//! ([`PipelineValidationError`]). [`PipelineError`] is what callers of
//! [`compose`](crate::pipeline::compose) see.

use crate::stages::CommandSpec;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// The standard stream of a child process that an I/O failure occurred on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// The child's standard input.
    Stdin,
    /// The child's standard output.
    Stdout,
    /// The child's standard error.
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => write!(f, "stdin"),
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// What went wrong while running a command stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum StageErrorKind {
    /// The process could not be created (missing executable, permissions...).
    Spawn,
    /// Writing stdin or draining stdout/stderr failed.
    StreamIo(StreamKind),
    /// Waiting for the process to exit failed.
    Wait,
    /// The process exited with a non-zero status and the runner was configured
    /// to treat that as a failure.
    NonZeroExit(i32),
}

impl fmt::Display for StageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn => write!(f, "failed to spawn"),
            Self::StreamIo(stream) => write!(f, "I/O error on {stream} of"),
            Self::Wait => write!(f, "failed to wait for"),
            Self::NonZeroExit(code) => write!(f, "exit status {code} from"),
        }
    }
}

/// A command stage failed.
///
/// Carries the program, its quoted arguments and whatever stderr had been
/// captured when the failure happened. The stderr buffer may be incomplete
/// when the failure interrupted draining.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StageExecutionError {
    /// The failure category.
    pub kind: StageErrorKind,
    /// The program that was run.
    pub program: String,
    /// The program's arguments.
    pub args: Vec<String>,
    /// Stderr captured up to the point of failure.
    pub stderr: Vec<u8>,
    /// The underlying OS error, absent for [`StageErrorKind::NonZeroExit`].
    #[source]
    pub source: Option<std::io::Error>,
    message: String,
}

impl StageExecutionError {
    /// Creates a new stage execution error for `spec`.
    #[must_use]
    pub fn new(
        kind: StageErrorKind,
        spec: &CommandSpec,
        stderr: Vec<u8>,
        source: Option<std::io::Error>,
    ) -> Self {
        let mut message = format!("{kind} `{}`", spec.display_command());
        if let Some(ref err) = source {
            message.push_str(&format!(": {err}"));
        }
        if !stderr.is_empty() {
            message.push_str(&format!("\nstderr: {}", String::from_utf8_lossy(&stderr).trim_end()));
        }

        Self {
            kind,
            program: spec.program.clone(),
            args: spec.args.clone(),
            stderr,
            source,
            message,
        }
    }

    /// Returns the captured stderr decoded lossily.
    #[must_use]
    pub fn stderr_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    /// Returns true if the process never started.
    #[must_use]
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self.kind, StageErrorKind::Spawn)
    }
}

/// Error raised when a pipeline is assembled incorrectly.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The argument or stage position the error refers to.
    pub position: Option<usize>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    /// Sets the position involved.
    #[must_use]
    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// How a single stage failed, before the composer attaches its position.
#[derive(Debug, Error)]
pub enum StageFailure {
    /// A command stage failed to spawn or to move data.
    #[error(transparent)]
    Execution(#[from] StageExecutionError),

    /// A transform callable returned an error.
    #[error(transparent)]
    Callable(anyhow::Error),
}

/// The error type returned by pipeline composition.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A command stage failed. Propagated unchanged from the runner.
    #[error(transparent)]
    Execution(#[from] StageExecutionError),

    /// A transform stage failed.
    #[error("transform stage {position} ({name}) failed: {source}")]
    Transform {
        /// Index of the failing stage.
        position: usize,
        /// The transform's label.
        name: String,
        /// The callable's error.
        #[source]
        source: anyhow::Error,
    },

    /// The pipeline was assembled incorrectly.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// The blocking entry point could not start its runtime.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl PipelineError {
    /// Attaches stage context to a runner failure.
    #[must_use]
    pub fn from_stage_failure(position: usize, name: &str, failure: StageFailure) -> Self {
        match failure {
            StageFailure::Execution(err) => Self::Execution(err),
            StageFailure::Callable(source) => Self::Transform {
                position,
                name: name.to_string(),
                source,
            },
        }
    }

    /// Returns the command failure, if this error came from a command stage.
    #[must_use]
    pub fn as_execution(&self) -> Option<&StageExecutionError> {
        match self {
            Self::Execution(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_execution_error_message_quotes_args() {
        let spec = CommandSpec::new("grep").arg("two words").arg("-n");
        let err = StageExecutionError::new(
            StageErrorKind::Spawn,
            &spec,
            Vec::new(),
            Some(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        );

        let msg = err.to_string();
        assert!(msg.contains("failed to spawn"));
        assert!(msg.contains("`grep ") && msg.contains("two words"), "{msg}");
        assert!(msg.contains("no such file"));
        assert!(err.is_spawn_failure());
    }

    #[test]
    fn test_execution_error_includes_stderr() {
        let spec = CommandSpec::new("cat");
        let err = StageExecutionError::new(
            StageErrorKind::StreamIo(StreamKind::Stdin),
            &spec,
            b"partial complaint\n".to_vec(),
            Some(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")),
        );

        assert!(err.to_string().contains("I/O error on stdin of `cat`"));
        assert!(err.to_string().ends_with("stderr: partial complaint"));
        assert_eq!(err.stderr_str(), "partial complaint\n");
    }

    #[test]
    fn test_non_zero_exit_has_no_source() {
        let spec = CommandSpec::new("false");
        let err = StageExecutionError::new(StageErrorKind::NonZeroExit(1), &spec, Vec::new(), None);

        assert!(std::error::Error::source(&err).is_none());
        assert_eq!(err.to_string(), "exit status 1 from `false`");
    }

    #[test]
    fn test_transform_failure_is_tagged_with_position() {
        let failure = StageFailure::Callable(anyhow::anyhow!("bad bytes"));
        let err = PipelineError::from_stage_failure(2, "upper", failure);

        match err {
            PipelineError::Transform { position, ref name, .. } => {
                assert_eq!(position, 2);
                assert_eq!(name, "upper");
            }
            ref other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "transform stage 2 (upper) failed: bad bytes");
    }

    #[test]
    fn test_execution_failure_passes_through() {
        let spec = CommandSpec::new("nope");
        let inner = StageExecutionError::new(StageErrorKind::Wait, &spec, b"x".to_vec(), None);
        let err = PipelineError::from_stage_failure(0, "nope", StageFailure::Execution(inner));

        let exec = err.as_execution().expect("execution error");
        assert_eq!(exec.kind, StageErrorKind::Wait);
        assert_eq!(exec.stderr, b"x");
    }

    #[test]
    fn test_validation_error_position() {
        let err = PipelineValidationError::new("empty command").at(3);
        assert_eq!(err.position, Some(3));
        assert_eq!(PipelineError::from(err).to_string(), "empty command");
    }
}
