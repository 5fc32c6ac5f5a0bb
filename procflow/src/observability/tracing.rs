//! Structured tracing support for pipeline runs.

use crate::core::StageResult;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Attributes describing one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSpanAttributes {
    /// Pipeline run ID.
    pub run_id: String,
    /// Number of stages in the pipeline.
    pub stage_count: usize,
    /// Whether the caller supplied initial input.
    pub has_input: bool,
    /// The output mode requested.
    pub mode: String,
    /// Duration in milliseconds, once finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Error message if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the record was taken.
    pub timestamp: String,
}

impl PipelineSpanAttributes {
    /// Creates attributes for a run.
    #[must_use]
    pub fn new(run_id: impl Into<String>, stage_count: usize) -> Self {
        Self {
            run_id: run_id.into(),
            stage_count,
            timestamp: chrono::Utc::now().to_rfc3339(),
            ..Self::default()
        }
    }

    /// Records whether the run had initial input.
    #[must_use]
    pub fn with_input(mut self, has_input: bool) -> Self {
        self.has_input = has_input;
        self
    }

    /// Records the output mode.
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Records the run duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Records the failure.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Converts to an event payload.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Attributes describing one stage execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSpanAttributes {
    /// Pipeline run ID.
    pub run_id: String,
    /// Index of the stage in the pipeline.
    pub position: usize,
    /// Stage label (program or transform name).
    pub stage_name: String,
    /// Stage kind, "command" or "transform".
    pub stage_kind: String,
    /// Duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Exit status for commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
    /// Output size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<usize>,
    /// Stderr size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_bytes: Option<usize>,
    /// Error message if failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageSpanAttributes {
    /// Creates attributes for the stage at `position`.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        position: usize,
        stage_name: impl Into<String>,
        stage_kind: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            position,
            stage_name: stage_name.into(),
            stage_kind: stage_kind.into(),
            ..Self::default()
        }
    }

    /// Records the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Records the sizes and exit status of a stage result.
    #[must_use]
    pub fn with_result(mut self, result: &StageResult) -> Self {
        self.exit_status = result.exit_status;
        self.output_bytes = Some(result.output.len());
        self.error_bytes = result.error.as_ref().map(Vec::len);
        self
    }

    /// Records the error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Converts to an event payload.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

static TRACING_INIT: OnceLock<bool> = OnceLock::new();

/// Installs a `fmt` subscriber filtered by `filter`, or by `RUST_LOG` when no
/// filter is given (defaulting to `info`).
///
/// Only the first call has an effect. Returns false if another global
/// subscriber was already installed.
pub fn init_tracing(filter: Option<&str>) -> bool {
    *TRACING_INIT.get_or_init(|| {
        let filter = filter.map_or_else(
            || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            EnvFilter::new,
        );
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    })
}
