//! Error taxonomy shared by the step engine, the pipeline runner and the
//! logging service.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::logging::SinkHandle;

/// Failures surfaced by [`Step::invoke`](crate::step::Step::invoke) and friends.
#[derive(Debug, Error)]
pub enum StepError {
    /// Malformed flags or a help/version request. Raised before the step
    /// enters its lifecycle, so no cleanup runs.
    #[error(transparent)]
    Arguments(#[from] clap::Error),

    #[error("hook '{hook}' in lifecycle '{lifecycle}' failed: {cause:#}")]
    Hook {
        lifecycle: String,
        hook: String,
        cause: anyhow::Error,
    },

    #[error("step main failed: {0:#}")]
    Main(anyhow::Error),

    #[error("step teardown failed: {0:#}")]
    Teardown(anyhow::Error),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

impl StepError {
    /// Whether this failure happened before the lifecycle started.
    pub fn is_argument_failure(&self) -> bool {
        matches!(self, StepError::Arguments(_))
    }
}

/// Failures of the logging service.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown log sink handle: {0}")]
    UnknownSink(SinkHandle),

    #[error("failed to open log file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install global log subscriber: {0}")]
    Install(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures of a pipeline run as a whole. Individual stages failing to spawn
/// or exiting non-zero are not errors; they show up in the exit status.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    Empty,

    #[error("failed to create pipe between stages {upstream} and {}: {source}", .upstream + 1)]
    Pipe {
        upstream: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to drain output of process {pid}: {source}")]
    Drain {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for process {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("pipeline cancelled ({} process(es) terminated)", .terminated.len())]
    Cancelled { terminated: Vec<u32> },
}

/// Failures loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("invalid log time format '{0}'")]
    InvalidTimeFormat(String),
}
