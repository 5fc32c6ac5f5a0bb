//! Output modes and mode-shaped pipeline results.

use super::{PipelineState, StageResult};
use crate::errors::PipelineValidationError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Selects what a pipeline invocation returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Only the last stage's output bytes.
    #[default]
    Default,
    /// The last stage's full result.
    Last,
    /// The whole pipeline state.
    Full,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Last => write!(f, "last"),
            Self::Full => write!(f, "full"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = PipelineValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches(':').to_ascii_lowercase().as_str() {
            "" | "default" => Ok(Self::Default),
            "last" => Ok(Self::Last),
            "full" => Ok(Self::Full),
            other => Err(PipelineValidationError::new(format!(
                "unknown output mode '{other}' (expected full, last or default)"
            ))),
        }
    }
}

/// The value a pipeline returns, shaped by its [`OutputMode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "value")]
pub enum PipelineOutput {
    /// Returned for [`OutputMode::Full`].
    Full(PipelineState),
    /// Returned for [`OutputMode::Last`].
    Last(StageResult),
    /// Returned for [`OutputMode::Default`].
    Output(Vec<u8>),
}

impl PipelineOutput {
    /// Shapes a finished pipeline state according to `mode`.
    #[must_use]
    pub fn shape(state: PipelineState, mode: OutputMode) -> Self {
        match mode {
            OutputMode::Full => Self::Full(state),
            OutputMode::Last => Self::Last(state.into_tail()),
            OutputMode::Default => Self::Output(state.into_tail().output),
        }
    }

    /// The mode this value was shaped by.
    #[must_use]
    pub fn mode(&self) -> OutputMode {
        match self {
            Self::Full(_) => OutputMode::Full,
            Self::Last(_) => OutputMode::Last,
            Self::Output(_) => OutputMode::Default,
        }
    }

    /// The final output bytes, whatever the mode.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        match self {
            Self::Full(state) => &state.tail().output,
            Self::Last(result) => &result.output,
            Self::Output(bytes) => bytes,
        }
    }

    /// The final output decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn output_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.output())
    }

    /// Consumes the value and returns the final output bytes.
    #[must_use]
    pub fn into_output(self) -> Vec<u8> {
        match self {
            Self::Full(state) => state.into_tail().output,
            Self::Last(result) => result.output,
            Self::Output(bytes) => bytes,
        }
    }

    /// Returns the last stage result, unless only bytes were kept.
    #[must_use]
    pub fn into_last(self) -> Option<StageResult> {
        match self {
            Self::Full(state) => Some(state.into_tail()),
            Self::Last(result) => Some(result),
            Self::Output(_) => None,
        }
    }

    /// Returns the full state, if the pipeline ran in [`OutputMode::Full`].
    #[must_use]
    pub fn into_state(self) -> Option<PipelineState> {
        match self {
            Self::Full(state) => Some(state),
            _ => None,
        }
    }
}
