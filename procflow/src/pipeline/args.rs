//! Mixed argument lists accepted by [`compose`](super::compose).

use crate::core::{OutputMode, PipelineOutput};
use crate::errors::PipelineValidationError;
use crate::stages::{CommandSpec, Stage, Transform};

/// One element of a composition argument list.
///
/// A list is an optional leading [`Input`](Self::Input), any number of
/// [`Stage`](Self::Stage)s and an optional trailing [`Mode`](Self::Mode).
#[derive(Debug, Clone)]
pub enum PipelineArg {
    /// Raw bytes fed to the first stage.
    Input(Vec<u8>),
    /// A pipeline stage.
    Stage(Stage),
    /// The output mode.
    Mode(OutputMode),
}

/// An argument list split into its parts.
#[derive(Debug, Default)]
pub(crate) struct ParsedArgs {
    pub input: Option<Vec<u8>>,
    pub stages: Vec<Stage>,
    pub mode: OutputMode,
}

/// Splits `args` into initial input, stages and output mode.
pub(crate) fn parse_args(args: Vec<PipelineArg>) -> Result<ParsedArgs, PipelineValidationError> {
    let mut parsed = ParsedArgs::default();
    let last = args.len().saturating_sub(1);

    for (index, arg) in args.into_iter().enumerate() {
        match arg {
            PipelineArg::Input(bytes) if index == 0 => parsed.input = Some(bytes),
            PipelineArg::Input(_) => {
                return Err(PipelineValidationError::new(format!(
                    "raw input is only accepted as the first argument (found at {index})"
                ))
                .at(index));
            }
            PipelineArg::Mode(mode) if index == last => parsed.mode = mode,
            PipelineArg::Mode(_) => {
                return Err(PipelineValidationError::new(format!(
                    "output mode is only accepted as the last argument (found at {index})"
                ))
                .at(index));
            }
            PipelineArg::Stage(stage) => parsed.stages.push(stage),
        }
    }

    Ok(parsed)
}

impl From<&str> for PipelineArg {
    fn from(input: &str) -> Self {
        Self::Input(input.as_bytes().to_vec())
    }
}

impl From<String> for PipelineArg {
    fn from(input: String) -> Self {
        Self::Input(input.into_bytes())
    }
}

impl From<&[u8]> for PipelineArg {
    fn from(input: &[u8]) -> Self {
        Self::Input(input.to_vec())
    }
}

impl From<Vec<u8>> for PipelineArg {
    fn from(input: Vec<u8>) -> Self {
        Self::Input(input)
    }
}

/// The output of one pipeline becomes the input of the next.
impl From<PipelineOutput> for PipelineArg {
    fn from(output: PipelineOutput) -> Self {
        Self::Input(output.into_output())
    }
}

impl From<Stage> for PipelineArg {
    fn from(stage: Stage) -> Self {
        Self::Stage(stage)
    }
}

impl From<CommandSpec> for PipelineArg {
    fn from(spec: CommandSpec) -> Self {
        Self::Stage(Stage::Command(spec))
    }
}

impl From<Transform> for PipelineArg {
    fn from(transform: Transform) -> Self {
        Self::Stage(Stage::Transform(transform))
    }
}

impl<const N: usize> From<[&str; N]> for PipelineArg {
    fn from(argv: [&str; N]) -> Self {
        Self::Stage(Stage::command(argv))
    }
}

impl From<Vec<String>> for PipelineArg {
    fn from(argv: Vec<String>) -> Self {
        Self::Stage(Stage::command(argv))
    }
}

impl From<Vec<&str>> for PipelineArg {
    fn from(argv: Vec<&str>) -> Self {
        Self::Stage(Stage::command(argv))
    }
}

impl From<OutputMode> for PipelineArg {
    fn from(mode: OutputMode) -> Self {
        Self::Mode(mode)
    }
}
