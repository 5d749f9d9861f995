//! The `skritt` step: run a command pipeline, optionally gated on a target path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Arg, ArgAction, Command};
use skritt_core::error::PipelineError;
use skritt_core::pipeline::Pipeline;
use skritt_core::step::{POST_RUN, PRE_RUN, Step, StepBase};
use skritt_core::Logging;
use tracing::{info, warn};

/// Token separating pipeline stages on the command line
pub const STAGE_SEPARATOR: &str = "|";

/// Exit status reported when the pipeline was interrupted
pub const INTERRUPTED: i32 = 130;

pub struct PipeStep {
    base: StepBase<PipeStep>,
    started: Option<Instant>,
}

impl PipeStep {
    pub fn new<I, A>(logging: Arc<Logging>, argv: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let mut step = Self {
            base: StepBase::new("skritt", logging, argv),
            started: None,
        };
        step.add_hook(
            PRE_RUN,
            "start-clock",
            |s: &mut PipeStep| {
                s.started = Some(Instant::now());
                Ok(())
            },
            false,
        );
        step.add_hook(
            POST_RUN,
            "report-elapsed",
            |s: &mut PipeStep| {
                if let Some(started) = s.started {
                    info!("Finished in {:.1}s", started.elapsed().as_secs_f64());
                }
                Ok(())
            },
            false,
        );
        step
    }

    fn creates(&self) -> Option<&Path> {
        self.base
            .matches()
            .and_then(|m| m.get_one::<PathBuf>("creates"))
            .map(PathBuf::as_path)
    }

    fn background(&self) -> bool {
        self.base
            .matches()
            .is_some_and(|m| m.get_flag("background"))
    }

    fn commands(&self) -> Vec<Vec<String>> {
        let tokens: Vec<String> = self
            .base
            .matches()
            .and_then(|m| m.get_many::<String>("command"))
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        split_commands(&tokens)
    }
}

/// Split `a b | c d` into `[[a, b], [c, d]]`. Empty segments are kept so the
/// pipeline can reject them.
pub fn split_commands(tokens: &[String]) -> Vec<Vec<String>> {
    tokens
        .split(|token| token == STAGE_SEPARATOR)
        .map(<[String]>::to_vec)
        .collect()
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[async_trait]
impl Step for PipeStep {
    fn base(&self) -> &StepBase<Self> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StepBase<Self> {
        &mut self.base
    }

    fn augment(&self, command: Command) -> Command {
        command
            .about("Run a command pipeline as a gated, logged step")
            .arg(
                Arg::new("creates")
                    .long("creates")
                    .value_name("PATH")
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Skip the pipeline when PATH already exists"),
            )
            .arg(
                Arg::new("background")
                    .long("background")
                    .action(ArgAction::SetTrue)
                    .help("Run the pipeline on a background task"),
            )
            .arg(
                Arg::new("command")
                    .value_name("CMD")
                    .num_args(1..)
                    .last(true)
                    .required(true)
                    .help("Stages separated by a literal '|' token"),
            )
    }

    fn title(&self) -> String {
        let commands = self.commands();
        match commands.first().and_then(|c| c.first()) {
            Some(program) => format!("skritt: {}", program),
            None => "skritt".to_string(),
        }
    }

    fn needed(&self) -> bool {
        self.creates().is_none_or(|path| !path.exists())
    }

    async fn main(&mut self) -> Result<i32> {
        let pipeline = Pipeline::from_commands(self.commands())?;

        let result = if self.background() {
            let run = pipeline.spawn();
            info!("Pipeline started in background");
            run.join_until(interrupted()).await
        } else {
            pipeline.run_until(interrupted()).await
        };

        let status = match result {
            Ok(status) => status,
            Err(PipelineError::Cancelled { terminated }) => {
                warn!("Interrupted, terminated {} process(es)", terminated.len());
                return Ok(INTERRUPTED);
            }
            Err(e) => return Err(e.into()),
        };

        if status == 0
            && let Some(path) = self.creates()
            && !path.exists()
        {
            warn!("Pipeline succeeded but did not create {}", path.display());
        }
        Ok(status)
    }
}
