//! Transform stages for testing pipelines.

use crate::stages::Transform;
use parking_lot::Mutex;
use std::sync::Arc;

/// A pass-through transform that records every input it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransform {
    inputs: Arc<Mutex<Vec<Option<Vec<u8>>>>>,
}

impl RecordingTransform {
    /// Creates a new recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a transform stage feeding this recorder. Absent input passes
    /// through as empty output.
    #[must_use]
    pub fn stage(&self) -> Transform {
        let inputs = Arc::clone(&self.inputs);
        Transform::new(move |input| {
            let output = input.clone().unwrap_or_default();
            inputs.lock().push(input);
            Ok(output)
        })
        .named("recording")
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Returns the inputs seen, in call order.
    #[must_use]
    pub fn inputs(&self) -> Vec<Option<Vec<u8>>> {
        self.inputs.lock().clone()
    }
}

/// A transform that always fails with `message`.
#[must_use]
pub fn failing_transform(message: impl Into<String>) -> Transform {
    let message = message.into();
    Transform::new(move |_| Err(anyhow::anyhow!("{message}"))).named("failing")
}

/// A transform that always returns `output`, ignoring its input.
#[must_use]
pub fn constant_transform(output: impl Into<Vec<u8>>) -> Transform {
    let output = output.into();
    Transform::new(move |_| Ok(output.clone())).named("constant")
}
