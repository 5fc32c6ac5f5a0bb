//! Executes a single stage to completion.
//!
//! Command stages are spawned with piped stdout and stderr (and a piped stdin
//! when there is input to send). Writing stdin and draining both output
//! streams happen concurrently: a child that fills its stdout pipe before it
//! has consumed all of its input would otherwise block forever, and so would
//! the runner.

use super::{CommandSpec, Stage};
use crate::config::RunnerConfig;
use crate::core::StageResult;
use crate::errors::{StageErrorKind, StageExecutionError, StageFailure, StreamKind};
use std::io;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, warn};

/// Runs individual stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageRunner {
    config: RunnerConfig,
}

impl StageRunner {
    /// Creates a runner with the given configuration.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Returns the runner's configuration.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs `stage` with `input` as its stdin (or argument, for transforms).
    ///
    /// # Errors
    ///
    /// Command failures come back as [`StageFailure::Execution`]; errors
    /// returned by a transform callable come back untouched as
    /// [`StageFailure::Callable`].
    pub async fn run(&self, input: Option<&[u8]>, stage: &Stage) -> Result<StageResult, StageFailure> {
        match stage {
            Stage::Command(spec) => Ok(self.run_command(input, spec).await?),
            Stage::Transform(transform) => transform
                .apply(input.map(<[u8]>::to_vec))
                .await
                .map(StageResult::from_transform)
                .map_err(StageFailure::Callable),
        }
    }

    /// Spawns `spec`, feeds it `input` and captures its output and exit status.
    ///
    /// Without input the child inherits the caller's stdin. A non-zero exit is
    /// returned as a normal result unless the runner is configured with
    /// `fail_on_nonzero_exit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, if any stream
    /// operation fails, or if waiting for exit fails.
    pub async fn run_command(
        &self,
        input: Option<&[u8]>,
        spec: &CommandSpec,
    ) -> Result<StageResult, StageExecutionError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if spec.env_clear {
            cmd.env_clear();
        }
        cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(ref dir) = spec.current_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // The child handle owns all three pipes; dropping it on an error path
        // closes them and reaps the process.
        cmd.kill_on_drop(self.config.kill_on_drop);

        debug!(
            program = %spec.program,
            args = %spec.quoted_args(),
            piped_stdin = input.is_some(),
            "Spawning command"
        );

        let mut child = cmd
            .spawn()
            .map_err(|e| StageExecutionError::new(StageErrorKind::Spawn, spec, Vec::new(), Some(e)))?;

        let stdin = child.stdin.take();
        let Some(mut stdout) = child.stdout.take() else {
            return Err(missing_pipe(spec, StreamKind::Stdout));
        };
        let Some(mut stderr) = child.stderr.take() else {
            return Err(missing_pipe(spec, StreamKind::Stderr));
        };

        let mut out = Vec::new();
        let mut err = Vec::new();
        let (written, drained_out, drained_err) = tokio::join!(
            write_input(stdin, input, self.config.ignore_broken_pipe),
            drain(&mut stdout, &mut out),
            drain(&mut stderr, &mut err),
        );

        let failed = written
            .map_err(|e| (StreamKind::Stdin, e))
            .and(drained_out.map_err(|e| (StreamKind::Stdout, e)))
            .and(drained_err.map_err(|e| (StreamKind::Stderr, e)));
        if let Err((stream, source)) = failed {
            return Err(StageExecutionError::new(
                StageErrorKind::StreamIo(stream),
                spec,
                err,
                Some(source),
            ));
        }

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                return Err(StageExecutionError::new(StageErrorKind::Wait, spec, err, Some(e)));
            }
        };
        let code = status.code().unwrap_or(-1);

        if code != 0 {
            if self.config.fail_on_nonzero_exit {
                return Err(StageExecutionError::new(
                    StageErrorKind::NonZeroExit(code),
                    spec,
                    err,
                    None,
                ));
            }
            warn!(program = %spec.program, exit_status = code, "Command exited with non-zero status");
        }

        Ok(StageResult::from_command(out, err, code))
    }
}

/// Writes all of `input` to the child's stdin, then closes it.
async fn write_input(
    stdin: Option<ChildStdin>,
    input: Option<&[u8]>,
    ignore_broken_pipe: bool,
) -> io::Result<()> {
    let (Some(mut stdin), Some(data)) = (stdin, input) else {
        return Ok(());
    };

    let result = match stdin.write_all(data).await {
        Ok(()) => stdin.shutdown().await,
        Err(e) => Err(e),
    };
    drop(stdin);

    match result {
        Err(e) if ignore_broken_pipe && e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Reads `stream` to EOF. Bytes read before an error stay in `buf`.
async fn drain<R>(stream: &mut R, buf: &mut Vec<u8>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    stream.read_to_end(buf).await.map(|_| ())
}

fn missing_pipe(spec: &CommandSpec, stream: StreamKind) -> StageExecutionError {
    StageExecutionError::new(
        StageErrorKind::StreamIo(stream),
        spec,
        Vec::new(),
        Some(io::Error::other(format!("{stream} was not captured"))),
    )
}
