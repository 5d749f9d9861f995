//! Shell-style process pipelines.
//!
//! ```text
//! null ─▶ stage 0 ─pipe─▶ stage 1 ─pipe─▶ … ─▶ stage N-1 ─▶ drained to log
//!            │               │                    │
//!            └─stderr──▶ drained to log ◀─────────┘
//! ```
//!
//! All stages are spawned up front and run concurrently. Every stage's stderr,
//! and the last stage's stdout, is read line by line and logged at PROC
//! severity tagged with the child's PID. The run's exit status is the status
//! of the last stage (in spawn order) that exited non-zero, or zero.
//!
//! ## Example
//!
//! ```ignore
//! let status = Pipeline::from_commands([
//!     vec!["zcat", "corpus.gz"],
//!     vec!["sort", "-u"],
//!     vec!["wc", "-l"],
//! ])?
//! .run()
//! .await?;
//! ```

mod background;
mod drain;
mod runner;

pub use background::BackgroundRun;

use std::fmt;
use std::future::Future;

use crate::error::PipelineError;

/// One process in a pipeline: an executable and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl StageSpec {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from an argv-style list; `None` when the list is empty.
    pub fn from_argv<I, A>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next()?;
        Some(Self {
            program,
            args: argv.collect(),
        })
    }

    /// Executable name without its directory, for log lines
    pub fn name(&self) -> &str {
        self.program
            .rsplit(std::path::MAIN_SEPARATOR)
            .next()
            .unwrap_or(&self.program)
    }
}

impl fmt::Display for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Where a stage reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageInput {
    /// Independent stream with nothing to read
    Null,
    /// Read end of the link with this index
    Link(usize),
}

/// Where a stage writes its primary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutput {
    /// Write end of the link with this index
    Link(usize),
    /// Independent stream, drained into the log
    Drained,
}

/// Stream wiring of a single stage. Link `i` connects stage `i` to stage `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageWiring {
    pub stdin: StageInput,
    pub stdout: StageOutput,
    /// stderr is always stage-local and drained
    pub stderr_drained: bool,
}

impl StageWiring {
    pub fn drains(&self) -> usize {
        usize::from(self.stderr_drained) + usize::from(self.stdout == StageOutput::Drained)
    }
}

/// Wiring for a pipeline of `count` stages.
pub fn wiring(count: usize) -> Vec<StageWiring> {
    (0..count)
        .map(|index| StageWiring {
            stdin: if index == 0 {
                StageInput::Null
            } else {
                StageInput::Link(index - 1)
            },
            stdout: if index + 1 == count {
                StageOutput::Drained
            } else {
                StageOutput::Link(index)
            },
            stderr_drained: true,
        })
        .collect()
}

/// An ordered, non-empty list of stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<StageSpec>,
}

impl Pipeline {
    pub fn new(stages: Vec<StageSpec>) -> Result<Self, PipelineError> {
        if stages.is_empty() {
            return Err(PipelineError::Empty);
        }
        Ok(Self { stages })
    }

    pub fn single(stage: StageSpec) -> Self {
        Self {
            stages: vec![stage],
        }
    }

    /// Build from argv-style commands. Empty commands are rejected as an
    /// empty pipeline would be.
    pub fn from_commands<C, I, A>(commands: C) -> Result<Self, PipelineError>
    where
        C: IntoIterator<Item = I>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let stages = commands
            .into_iter()
            .map(StageSpec::from_argv)
            .collect::<Option<Vec<_>>>()
            .ok_or(PipelineError::Empty)?;
        Self::new(stages)
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn wiring(&self) -> Vec<StageWiring> {
        wiring(self.stages.len())
    }

    /// Run to completion and return the aggregate exit status.
    pub async fn run(self) -> Result<i32, PipelineError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until completion or until `cancel` resolves, whichever comes first.
    /// On cancellation every running stage is sent a termination request and
    /// reaped before [`PipelineError::Cancelled`] is returned.
    pub async fn run_until<C>(self, cancel: C) -> Result<i32, PipelineError>
    where
        C: Future<Output = ()>,
    {
        runner::run(self.stages, cancel).await
    }

    /// Run on a background task. See [`BackgroundRun`].
    pub fn spawn(self) -> BackgroundRun {
        BackgroundRun::start(self)
    }
}

/// Aggregate exit status: the last non-zero status in spawn order, else zero.
pub fn aggregate_status<I: IntoIterator<Item = i32>>(statuses: I) -> i32 {
    statuses
        .into_iter()
        .fold(0, |current, status| if status != 0 { status } else { current })
}
