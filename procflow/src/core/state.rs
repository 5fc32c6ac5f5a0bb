//! Accumulated state of one pipeline run.

use super::StageResult;
use serde::{Serialize, Serializer};

/// The history of stage results produced by one pipeline invocation.
///
/// The tail is derived from the history rather than stored next to it, so it
/// is always the last history entry, or the seed when no stage has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    seed: StageResult,
    history: Vec<StageResult>,
}

impl PipelineState {
    /// Creates an empty state seeded with the caller's initial input.
    #[must_use]
    pub fn new(seed: StageResult) -> Self {
        Self {
            seed,
            history: Vec::new(),
        }
    }

    /// Appends the result of the next stage.
    #[must_use]
    pub fn push(mut self, result: StageResult) -> Self {
        self.history.push(result);
        self
    }

    /// The results of every stage that ran, in execution order.
    #[must_use]
    pub fn history(&self) -> &[StageResult] {
        &self.history
    }

    /// The most recent result.
    #[must_use]
    pub fn tail(&self) -> &StageResult {
        self.history.last().unwrap_or(&self.seed)
    }

    /// The synthetic result holding the initial input.
    #[must_use]
    pub fn seed(&self) -> &StageResult {
        &self.seed
    }

    /// Number of stages that ran.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true if no stage ran.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Consumes the state and returns the most recent result.
    #[must_use]
    pub fn into_tail(mut self) -> StageResult {
        self.history.pop().unwrap_or(self.seed)
    }

    /// Consumes the state and returns the history.
    #[must_use]
    pub fn into_history(self) -> Vec<StageResult> {
        self.history
    }
}

impl Serialize for PipelineState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            history: &'a [StageResult],
            tail: &'a StageResult,
        }

        Repr {
            history: self.history(),
            tail: self.tail(),
        }
        .serialize(serializer)
    }
}
