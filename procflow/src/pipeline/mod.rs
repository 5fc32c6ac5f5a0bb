//! Pipeline composition and execution.
//!
//! This module provides:
//! - The mixed argument list accepted by [`compose`]
//! - The [`Pipeline`] builder
//! - The [`pipe!`](crate::pipe) macro

mod args;
mod composer;

pub use args::PipelineArg;
pub use composer::{compose, compose_blocking, Pipeline};

/// Composes and runs a pipeline from a variadic argument list.
///
/// Each argument is converted with [`PipelineArg::from`]: strings and byte
/// vectors are initial input, `[&str; N]` arrays are commands, stages and
/// transforms are stages, and an [`OutputMode`](crate::core::OutputMode)
/// selects the shape of the result. Evaluates to the future returned by
/// [`compose`].
///
/// ```rust,ignore
/// let out = procflow::pipe!["hello", ["tr", "a-z", "A-Z"], OutputMode::Last].await?;
/// ```
#[macro_export]
macro_rules! pipe {
    ($($arg:expr),+ $(,)?) => {
        $crate::pipeline::compose(::std::vec![
            $($crate::pipeline::PipelineArg::from($arg)),+
        ])
    };
}
