//! Stage specifications and the stage runner.
//!
//! A pipeline position is either an external [`CommandSpec`] or an in-process
//! [`Transform`]. The kind is fixed when the [`Stage`] is constructed and every
//! consumer matches on it exhaustively.

mod runner;

pub use runner::StageRunner;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// The boxed future a transform returns.
pub type TransformFuture = BoxFuture<'static, anyhow::Result<Vec<u8>>>;

type TransformFn = dyn Fn(Option<Vec<u8>>) -> TransformFuture + Send + Sync;

/// Label given to transforms that were not named explicitly.
pub const DEFAULT_TRANSFORM_NAME: &str = "transform";

/// An external program invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// The program to run, resolved through `PATH`.
    pub program: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the child.
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Start the child with an empty environment.
    #[serde(default)]
    pub env_clear: bool,
    /// Working directory for the child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Creates a specification for `program` without arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Creates a specification from an argv: program name first, then arguments.
    ///
    /// An empty argv yields an empty program, which the pipeline rejects
    /// before running anything.
    #[must_use]
    pub fn from_argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next().unwrap_or_default();
        Self {
            program,
            args: argv.collect(),
            ..Self::default()
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Starts the child with an empty environment.
    #[must_use]
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self
    }

    /// Sets the child's working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// The arguments joined into one shell-quoted string.
    #[must_use]
    pub fn quoted_args(&self) -> String {
        shlex::try_join(self.args.iter().map(String::as_str))
            .unwrap_or_else(|_| format!("{:?}", self.args))
    }

    /// The program followed by its quoted arguments.
    #[must_use]
    pub fn display_command(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.quoted_args())
        }
    }
}

/// An in-process transformation of the previous stage's output.
///
/// The callable receives `None` when it is the first stage and the pipeline
/// was started without input.
#[derive(Clone)]
pub struct Transform {
    name: String,
    func: Arc<TransformFn>,
}

impl Transform {
    /// Creates a transform from a synchronous callable.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Option<Vec<u8>>) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            name: DEFAULT_TRANSFORM_NAME.to_string(),
            func: Arc::new(move |input| futures::future::ready(func(input)).boxed()),
        }
    }

    /// Creates a transform from an async callable.
    ///
    /// The callable may itself compose and run pipelines.
    pub fn new_async<F, Fut>(func: F) -> Self
    where
        F: Fn(Option<Vec<u8>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
    {
        Self {
            name: DEFAULT_TRANSFORM_NAME.to_string(),
            func: Arc::new(move |input| func(input).boxed()),
        }
    }

    /// Sets the label used in logs, events and errors.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the transform's label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the callable.
    ///
    /// # Errors
    ///
    /// Returns whatever error the callable produced.
    pub async fn apply(&self, input: Option<Vec<u8>>) -> anyhow::Result<Vec<u8>> {
        (self.func)(input).await
    }
}

impl Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One pipeline position.
#[derive(Debug, Clone)]
pub enum Stage {
    /// Run an external program.
    Command(CommandSpec),
    /// Call an in-process function.
    Transform(Transform),
}

impl Stage {
    /// Creates a command stage from an argv.
    #[must_use]
    pub fn command<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Command(CommandSpec::from_argv(argv))
    }

    /// Creates a transform stage from a synchronous callable.
    pub fn transform<F>(func: F) -> Self
    where
        F: Fn(Option<Vec<u8>>) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self::Transform(Transform::new(func))
    }

    /// Creates a transform stage from an async callable.
    pub fn transform_async<F, Fut>(func: F) -> Self
    where
        F: Fn(Option<Vec<u8>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
    {
        Self::Transform(Transform::new_async(func))
    }

    /// The label used in logs, events and errors: the program name for
    /// commands, the transform's name otherwise.
    pub fn label(&self) -> &str {
        match self {
            Self::Command(spec) => &spec.program,
            Self::Transform(transform) => transform.name(),
        }
    }

    /// Short name of the stage kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Transform(_) => "transform",
        }
    }
}

impl From<CommandSpec> for Stage {
    fn from(spec: CommandSpec) -> Self {
        Self::Command(spec)
    }
}

impl From<Transform> for Stage {
    fn from(transform: Transform) -> Self {
        Self::Transform(transform)
    }
}

impl<const N: usize> From<[&str; N]> for Stage {
    fn from(argv: [&str; N]) -> Self {
        Self::command(argv)
    }
}

impl From<Vec<String>> for Stage {
    fn from(argv: Vec<String>) -> Self {
        Self::command(argv)
    }
}

impl From<Vec<&str>> for Stage {
    fn from(argv: Vec<&str>) -> Self {
        Self::command(argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_from_argv() {
        let stage = Stage::command(["grep", "-n", "needle"]);
        match stage {
            Stage::Command(ref spec) => {
                assert_eq!(spec.program, "grep");
                assert_eq!(spec.args, vec!["-n", "needle"]);
            }
            Stage::Transform(_) => panic!("expected a command"),
        }
        assert_eq!(stage.label(), "grep");
        assert_eq!(stage.kind(), "command");
    }

    #[test]
    fn test_empty_argv_has_empty_program() {
        let spec = CommandSpec::from_argv(Vec::<String>::new());
        assert!(spec.program.is_empty());
        assert!(spec.args.is_empty());
    }

    #[test]
    fn test_command_builder() {
        let spec = CommandSpec::new("env")
            .arg("-0")
            .env("A", "1")
            .env_clear()
            .current_dir("/tmp");

        assert_eq!(spec.args, vec!["-0"]);
        assert_eq!(spec.env, vec![("A".to_string(), "1".to_string())]);
        assert!(spec.env_clear);
        assert_eq!(spec.current_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_display_command_quotes_arguments() {
        let spec = CommandSpec::from_argv(["echo", "hello world"]);
        assert!(spec.display_command().starts_with("echo "));
        assert!(spec.quoted_args().contains("hello world"));
        assert_ne!(spec.quoted_args(), "hello world");
        assert_eq!(CommandSpec::new("cat").display_command(), "cat");
    }

    #[tokio::test]
    async fn test_sync_transform() {
        let transform = Transform::new(|input| Ok(input.unwrap_or_default().to_ascii_uppercase()))
            .named("upper");

        assert_eq!(transform.name(), "upper");
        assert_eq!(transform.apply(Some(b"abc".to_vec())).await.unwrap(), b"ABC");
        assert_eq!(transform.apply(None).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn test_async_transform() {
        let stage = Stage::transform_async(|input| async move {
            let mut bytes = input.unwrap_or_default();
            bytes.reverse();
            Ok(bytes)
        });

        assert_eq!(stage.label(), DEFAULT_TRANSFORM_NAME);
        let Stage::Transform(transform) = stage else {
            panic!("expected a transform");
        };
        assert_eq!(transform.apply(Some(b"abc".to_vec())).await.unwrap(), b"cba");
    }

    #[tokio::test]
    async fn test_transform_error_is_returned() {
        let transform = Transform::new(|_| anyhow::bail!("refused"));
        let err = transform.apply(None).await.unwrap_err();
        assert_eq!(err.to_string(), "refused");
    }

    #[test]
    fn test_transform_debug_shows_name() {
        let transform = Transform::new(|_| Ok(Vec::new())).named("noop");
        assert!(format!("{transform:?}").contains("noop"));
    }
}
