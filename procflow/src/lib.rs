//! # Procflow
//!
//! Compose external commands and in-process transforms into pipelines.
//!
//! Each stage's output becomes the next stage's input, like a shell pipe, but
//! every hand-off goes through memory so each stage's stdout, stderr and exit
//! status can be observed before the data moves on. Procflow provides:
//!
//! - **Mixed stages**: external programs and async or sync byte transforms
//! - **Deadlock-free process I/O**: stdin is written while stdout and stderr are drained
//! - **Output modes**: return the final bytes, the last stage result, or the full history
//! - **Nesting**: transforms may run pipelines of their own
//! - **Event-driven observability**: lifecycle events and `tracing` records per stage
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use procflow::prelude::*;
//!
//! let out = pipe![["echo", "hello"], ["tr", "a-z", "A-Z"]].await?;
//! assert_eq!(out.output_str(), "HELLO\n");
//!
//! let state = Pipeline::new()
//!     .input("b\na\n")
//!     .command(["sort"])
//!     .transform(|input| Ok(input.unwrap_or_default().to_ascii_uppercase()))
//!     .mode(OutputMode::Full)
//!     .run()
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::RunnerConfig;
    pub use crate::core::{OutputMode, PipelineOutput, PipelineState, StageResult};
    pub use crate::errors::{
        PipelineError, PipelineValidationError, StageErrorKind, StageExecutionError,
        StreamKind,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::init_tracing;
    pub use crate::pipe;
    pub use crate::pipeline::{compose, compose_blocking, Pipeline, PipelineArg};
    pub use crate::stages::{CommandSpec, Stage, StageRunner, Transform};
}
