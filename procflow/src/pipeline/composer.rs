//! Sequential pipeline composition.

use super::args::{parse_args, PipelineArg};
use crate::config::RunnerConfig;
use crate::core::{OutputMode, PipelineOutput, PipelineState, StageResult};
use crate::errors::{PipelineError, PipelineValidationError};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::observability::{PipelineSpanAttributes, SpanTimer, StageSpanAttributes};
use crate::stages::{Stage, StageRunner, Transform};
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// An ordered sequence of stages with optional initial input.
///
/// Stages run strictly one after another; each receives the previous stage's
/// output. The first stage receives the initial input, or nothing at all
/// (commands then inherit the caller's stdin).
#[derive(Clone)]
pub struct Pipeline {
    input: Option<Vec<u8>>,
    stages: Vec<Stage>,
    mode: OutputMode,
    runner: StageRunner,
    sink: Arc<dyn EventSink>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            input: None,
            stages: Vec::new(),
            mode: OutputMode::Default,
            runner: StageRunner::default(),
            sink: Arc::new(NoOpEventSink),
        }
    }
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("input_len", &self.input.as_ref().map(Vec::len))
            .field("stages", &self.stages)
            .field("mode", &self.mode)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipeline from a mixed argument list: an optional leading
    /// input, the stages, and an optional trailing output mode.
    ///
    /// # Errors
    ///
    /// Returns an error if input appears anywhere but first or a mode anywhere
    /// but last.
    pub fn from_args<I, A>(args: I) -> Result<Self, PipelineValidationError>
    where
        I: IntoIterator<Item = A>,
        A: Into<PipelineArg>,
    {
        let parsed = parse_args(args.into_iter().map(Into::into).collect())?;
        Ok(Self {
            input: parsed.input,
            stages: parsed.stages,
            mode: parsed.mode,
            ..Self::default()
        })
    }

    /// Sets the initial input.
    #[must_use]
    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, stage: impl Into<Stage>) -> Self {
        self.stages.push(stage.into());
        self
    }

    /// Appends a command stage from an argv.
    #[must_use]
    pub fn command<I, S>(self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stage(Stage::command(argv))
    }

    /// Appends a synchronous transform stage.
    #[must_use]
    pub fn transform<F>(self, func: F) -> Self
    where
        F: Fn(Option<Vec<u8>>) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.stage(Transform::new(func))
    }

    /// Appends an async transform stage.
    #[must_use]
    pub fn transform_async<F, Fut>(self, func: F) -> Self
    where
        F: Fn(Option<Vec<u8>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
    {
        self.stage(Transform::new_async(func))
    }

    /// Sets the output mode.
    #[must_use]
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the runner configuration.
    #[must_use]
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.runner = StageRunner::new(config);
        self
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The stages, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The output mode.
    #[must_use]
    pub fn output_mode(&self) -> OutputMode {
        self.mode
    }

    /// Checks that every command names a program.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first command stage with an empty program.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        for (position, stage) in self.stages.iter().enumerate() {
            if let Stage::Command(spec) = stage {
                if spec.program.is_empty() {
                    return Err(PipelineValidationError::new(format!(
                        "command stage {position} has no program"
                    ))
                    .at(position));
                }
            }
        }
        Ok(())
    }

    /// Runs the pipeline and shapes the result by its output mode.
    ///
    /// # Errors
    ///
    /// See [`run_state`](Self::run_state).
    pub async fn run(self) -> Result<PipelineOutput, PipelineError> {
        let mode = self.mode;
        let state = self.run_state().await?;
        Ok(PipelineOutput::shape(state, mode))
    }

    /// Runs every stage and returns the full state, ignoring the output mode.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure. No further stages run and no partial
    /// state is returned.
    pub async fn run_state(self) -> Result<PipelineState, PipelineError> {
        self.validate()?;

        let Self {
            input,
            stages,
            mode,
            runner,
            sink,
        } = self;
        let run_id = Uuid::new_v4().to_string();
        let has_input = input.is_some();
        let timer = SpanTimer::start("pipeline");

        debug!(run_id = %run_id, stages = stages.len(), has_input, %mode, "Pipeline started");
        sink.emit(
            events::PIPELINE_STARTED,
            Some(
                PipelineSpanAttributes::new(&run_id, stages.len())
                    .with_input(has_input)
                    .with_mode(mode.to_string())
                    .to_json(),
            ),
        )
        .await;

        let mut state = PipelineState::new(StageResult::seed(input));
        for (position, stage) in stages.iter().enumerate() {
            let attrs = StageSpanAttributes::new(&run_id, position, stage.label(), stage.kind());
            sink.emit(events::STAGE_STARTED, Some(attrs.to_json())).await;

            let stage_timer = SpanTimer::start(stage.label());
            let stage_input = (has_input || position > 0).then(|| state.tail().output.as_slice());
            let outcome = runner.run(stage_input, stage).await;
            let attrs = attrs.with_duration_ms(stage_timer.elapsed_ms());

            match outcome {
                Ok(result) => {
                    info!(
                        run_id = %run_id,
                        position,
                        stage = stage.label(),
                        exit_status = ?result.exit_status,
                        output_bytes = result.output.len(),
                        duration_ms = stage_timer.elapsed_ms(),
                        "Stage completed"
                    );
                    sink.emit(events::STAGE_COMPLETED, Some(attrs.with_result(&result).to_json()))
                        .await;
                    state = state.push(result);
                }
                Err(failure) => {
                    let err = PipelineError::from_stage_failure(position, stage.label(), failure);
                    error!(run_id = %run_id, position, stage = stage.label(), error = %err, "Stage failed");
                    sink.emit(events::STAGE_FAILED, Some(attrs.with_error(err.to_string()).to_json()))
                        .await;
                    sink.emit(
                        events::PIPELINE_FAILED,
                        Some(
                            PipelineSpanAttributes::new(&run_id, stages.len())
                                .with_input(has_input)
                                .with_mode(mode.to_string())
                                .with_duration_ms(timer.elapsed_ms())
                                .with_error(err.to_string())
                                .to_json(),
                        ),
                    )
                    .await;
                    return Err(err);
                }
            }
        }

        debug!(run_id = %run_id, duration_ms = timer.elapsed_ms(), "Pipeline completed");
        sink.emit(
            events::PIPELINE_COMPLETED,
            Some(
                PipelineSpanAttributes::new(&run_id, stages.len())
                    .with_input(has_input)
                    .with_mode(mode.to_string())
                    .with_duration_ms(timer.elapsed_ms())
                    .to_json(),
            ),
        )
        .await;

        Ok(state)
    }
}

/// Composes and runs a pipeline from a mixed argument list.
///
/// The first argument may be raw input, the last may be an [`OutputMode`];
/// everything in between is a stage.
///
/// ```rust,ignore
/// use procflow::prelude::*;
///
/// let out = compose(vec![PipelineArg::from("hello"), ["tr", "a-z", "A-Z"].into()]).await?;
/// assert_eq!(out.output_str(), "HELLO");
/// ```
///
/// # Errors
///
/// Returns a validation error for a malformed argument list, otherwise the
/// first stage failure.
pub async fn compose<I, A>(args: I) -> Result<PipelineOutput, PipelineError>
where
    I: IntoIterator<Item = A>,
    A: Into<PipelineArg>,
{
    Pipeline::from_args(args)?.run().await
}

/// Runs [`compose`] on a fresh current-thread runtime.
///
/// Must not be called from inside an async runtime.
///
/// # Errors
///
/// Returns an error if the runtime cannot be started, otherwise whatever
/// [`compose`] returns.
pub fn compose_blocking<I, A>(args: I) -> Result<PipelineOutput, PipelineError>
where
    I: IntoIterator<Item = A>,
    A: Into<PipelineArg>,
{
    let pipeline = Pipeline::from_args(args)?;
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(PipelineError::Runtime)?
        .block_on(pipeline.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StageErrorKind;
    use crate::events::{CollectingEventSink, MockEventSink};
    use crate::stages::CommandSpec;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn upper() -> Transform {
        Transform::new(|input| Ok(input.unwrap_or_default().to_ascii_uppercase())).named("upper")
    }

    #[tokio::test]
    async fn test_zero_stages_returns_input() {
        let out = Pipeline::new().input("x").run().await.unwrap();
        assert_eq!(out, PipelineOutput::Output(b"x".to_vec()));
    }

    #[tokio::test]
    async fn test_zero_stages_without_input() {
        let state = Pipeline::new().run_state().await.unwrap();
        assert!(state.is_empty());
        assert_eq!(state.tail(), &StageResult::seed(None));
    }

    #[tokio::test]
    async fn test_transforms_chain() {
        let out = Pipeline::new()
            .input("abc")
            .stage(upper())
            .transform(|input| {
                let mut bytes = input.unwrap_or_default();
                bytes.reverse();
                Ok(bytes)
            })
            .run()
            .await
            .unwrap();

        assert_eq!(out.output_str(), "CBA");
    }

    #[tokio::test]
    async fn test_first_transform_sees_absent_input() {
        let out = Pipeline::new()
            .transform(|input| Ok(if input.is_none() { b"none".to_vec() } else { b"some".to_vec() }))
            .transform(|input| Ok(if input.is_none() { b"none".to_vec() } else { b"some".to_vec() }))
            .mode(OutputMode::Full)
            .run()
            .await
            .unwrap();

        let state = out.into_state().unwrap();
        assert_eq!(state.history()[0].output, b"none");
        assert_eq!(state.history()[1].output, b"some");
    }

    #[tokio::test]
    async fn test_transform_failure_stops_pipeline() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let err = Pipeline::new()
            .input("abc")
            .stage(upper())
            .transform(|_| anyhow::bail!("exploded"))
            .transform(move |input| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(input.unwrap_or_default())
            })
            .run()
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        match err {
            PipelineError::Transform { position, ref name, .. } => {
                assert_eq!(position, 1);
                assert_eq!(name, "transform");
            }
            ref other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected_before_running() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let err = Pipeline::new()
            .transform(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            })
            .stage(CommandSpec::default())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Validation(ref v) if v.position == Some(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_events_for_successful_run() {
        let sink = Arc::new(CollectingEventSink::new());
        Pipeline::new()
            .input("a")
            .stage(upper())
            .command(["cat"])
            .with_event_sink(sink.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(
            sink.event_types(),
            vec![
                events::PIPELINE_STARTED,
                events::STAGE_STARTED,
                events::STAGE_COMPLETED,
                events::STAGE_STARTED,
                events::STAGE_COMPLETED,
                events::PIPELINE_COMPLETED,
            ]
        );

        let completed = sink.events_of_type(events::STAGE_COMPLETED);
        let cat = completed[1].1.as_ref().unwrap();
        assert_eq!(cat["stage_name"], "cat");
        assert_eq!(cat["exit_status"], 0);
        assert_eq!(cat["output_bytes"], 1);
    }

    #[tokio::test]
    async fn test_events_for_failed_run() {
        let mut sink = MockEventSink::new();
        sink.expect_emit()
            .withf(|event_type, _| event_type.starts_with("pipeline.started"))
            .times(1)
            .return_const(());
        sink.expect_emit()
            .withf(|event_type, _| event_type.starts_with("stage.started"))
            .times(1)
            .return_const(());
        sink.expect_emit()
            .withf(|event_type, data| {
                event_type.starts_with("stage.failed")
                    && data.as_ref().map_or(false, |d| d["stage_name"] == "procflow-missing")
            })
            .times(1)
            .return_const(());
        sink.expect_emit()
            .withf(|event_type, _| event_type.starts_with("pipeline.failed"))
            .times(1)
            .return_const(());

        let err = Pipeline::new()
            .command(["procflow-missing"])
            .with_event_sink(Arc::new(sink))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.as_execution().map(|e| e.kind), Some(StageErrorKind::Spawn));
    }

    #[test]
    fn test_compose_blocking() {
        let out = compose_blocking(vec![PipelineArg::from("abc"), upper().into()]).unwrap();
        assert_eq!(out.into_output(), b"ABC");
    }

    #[test]
    fn test_debug_hides_input_bytes() {
        let pipeline = Pipeline::new().input("secret").command(["cat"]);
        let rendered = format!("{pipeline:?}");
        assert!(rendered.contains("input_len: Some(6)"));
        assert!(!rendered.contains("secret"));
    }
}
