//! Skritt core: reusable execution skeleton for maintenance and build scripts.
//!
//! A [`Step`](step::Step) parses its arguments, decides whether its work is
//! needed, runs it, and always cleans up, with named hooks at each stage of
//! that lifecycle. A step's work commonly drives one or more process
//! [`Pipeline`](pipeline::Pipeline)s whose diagnostic output is streamed into
//! the shared [`Logging`](logging::Logging) service.

pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod resource;
pub mod step;

pub use config::Config;
pub use error::{ConfigError, LoggingError, PipelineError, StepError};
pub use logging::{LogLevel, Logging, SinkHandle};
pub use pipeline::{BackgroundRun, Pipeline, StageSpec};
pub use step::{Step, StepArgs, StepBase};
