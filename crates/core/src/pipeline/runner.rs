//! Pipeline execution: spawn, wire, drain, wait, aggregate

use std::future::Future;
use std::io::{self, PipeReader, PipeWriter};
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tokio::task::JoinSet;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn};

use super::drain::drain;
use super::{StageInput, StageOutput, StageSpec, aggregate_status, wiring};
use crate::error::PipelineError;

/// Status reported for a stage whose executable could not be started
pub const SPAWN_FAILURE_STATUS: i32 = 127;

/// Both ends of the pipe between stage `i` and stage `i + 1`. Each end is
/// handed to exactly one child and our copy goes away with the spawning
/// `Command`.
struct PipeLink {
    reader: Option<PipeReader>,
    writer: Option<PipeWriter>,
}

impl PipeLink {
    fn open(upstream: usize) -> Result<Self, PipelineError> {
        // std pipes are close-on-exec, so only the child that receives an end
        // as one of its stdio streams ever holds it.
        let (reader, writer) =
            io::pipe().map_err(|source| PipelineError::Pipe { upstream, source })?;
        Ok(Self {
            reader: Some(reader),
            writer: Some(writer),
        })
    }
}

/// A spawned (or failed-to-spawn) stage.
struct StageHandle {
    name: String,
    child: Option<Child>,
    pid: Option<u32>,
    status: Option<i32>,
}

impl StageHandle {
    fn running(name: String, child: Child, pid: u32) -> Self {
        Self {
            name,
            child: Some(child),
            pid: Some(pid),
            status: None,
        }
    }

    fn failed(name: String) -> Self {
        Self {
            name,
            child: None,
            pid: None,
            status: Some(SPAWN_FAILURE_STATUS),
        }
    }

    fn label(&self) -> String {
        match self.pid {
            Some(pid) => format!("{}({})", pid, self.name),
            None => format!("-({})", self.name),
        }
    }

    async fn wait(&mut self) -> Result<(), PipelineError> {
        if self.status.is_some() {
            return Ok(());
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        let pid = self.pid.unwrap_or_default();
        let status = child
            .wait()
            .await
            .map_err(|source| PipelineError::Wait { pid, source })?;
        self.status = Some(exit_code(status));
        Ok(())
    }

    /// Ask a still-running stage to terminate. Returns its PID if a request
    /// was sent.
    fn terminate(&mut self) -> Option<u32> {
        if self.status.is_some() {
            return None;
        }
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.status = Some(exit_code(status));
                None
            }
            _ => {
                let pid = self.pid?;
                send_terminate(child, pid);
                Some(pid)
            }
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child, pid: u32) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    debug!("Terminating {}", pid);
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!("SIGTERM to {} failed ({}), killing instead", pid, e);
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, pid: u32) {
    debug!("Terminating {}", pid);
    let _ = child.start_kill();
}

/// Shell-style exit code: the process's own code, or 128 + signal number.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

fn spawn_stage(stage: &StageSpec, stdin: Stdio, stdout: Stdio) -> io::Result<Child> {
    // `command` owns our copies of the pipe ends and drops them on return.
    let mut command = Command::new(&stage.program);
    command
        .args(&stage.args)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command.spawn()
}

async fn drain_all(drains: &mut JoinSet<Result<(), PipelineError>>) -> Result<(), PipelineError> {
    while let Some(joined) = drains.join_next().await {
        joined??;
    }
    Ok(())
}

async fn wait_all(handles: &mut [StageHandle]) -> Result<(), PipelineError> {
    for handle in handles.iter_mut() {
        handle.wait().await?;
    }
    Ok(())
}

/// Wait for every drain and every stage, or for `cancel`. Any failure aborts
/// the remaining drains, then every live stage is terminated and reaped
/// before the error is returned.
async fn supervise<C>(
    drains: &mut JoinSet<Result<(), PipelineError>>,
    handles: &mut [StageHandle],
    cancel: C,
) -> Result<(), PipelineError>
where
    C: Future<Output = ()>,
{
    let outcome = tokio::select! {
        result = async {
            tokio::try_join!(drain_all(&mut *drains), wait_all(&mut *handles)).map(|_| ())
        } => result,
        () = cancel => Err(PipelineError::Cancelled { terminated: Vec::new() }),
    };
    let Err(err) = outcome else {
        return Ok(());
    };

    if !matches!(err, PipelineError::Cancelled { .. }) {
        error!("{}", err);
    }
    drains.abort_all();
    let terminated: Vec<u32> = handles.iter_mut().filter_map(StageHandle::terminate).collect();
    for handle in handles.iter_mut() {
        if let Err(e) = handle.wait().await {
            warn!("{}", e);
        }
    }
    Err(match err {
        PipelineError::Cancelled { .. } => PipelineError::Cancelled { terminated },
        other => other,
    })
}

pub(super) async fn run<C>(stages: Vec<StageSpec>, cancel: C) -> Result<i32, PipelineError>
where
    C: Future<Output = ()>,
{
    if stages.is_empty() {
        return Err(PipelineError::Empty);
    }

    let plan = wiring(stages.len());
    let mut links = (0..stages.len() - 1)
        .map(PipeLink::open)
        .collect::<Result<Vec<_>, _>>()?;

    let mut handles = Vec::with_capacity(stages.len());
    let mut drains = JoinSet::new();

    for (stage, wiring) in stages.iter().zip(&plan) {
        let stdin = match wiring.stdin {
            StageInput::Null => Stdio::null(),
            StageInput::Link(i) => links[i].reader.take().map_or_else(Stdio::null, Stdio::from),
        };
        let stdout = match wiring.stdout {
            StageOutput::Link(i) => links[i].writer.take().map_or_else(Stdio::null, Stdio::from),
            StageOutput::Drained => Stdio::piped(),
        };

        let mut child = match spawn_stage(stage, stdin, stdout) {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn {}: {}", stage, e);
                handles.push(StageHandle::failed(stage.name().to_string()));
                continue;
            }
        };
        let pid = child.id().unwrap_or_default();
        debug!("Spawn {} {}", pid, stage);

        if let Some(stderr) = child.stderr.take() {
            drains.spawn(drain(stderr, pid).with_current_subscriber());
        }
        if let Some(stdout) = child.stdout.take() {
            drains.spawn(drain(stdout, pid).with_current_subscriber());
        }
        handles.push(StageHandle::running(stage.name().to_string(), child, pid));
    }
    drop(links);

    info!(
        "Spawned {}",
        handles
            .iter()
            .map(StageHandle::label)
            .collect::<Vec<_>>()
            .join(" ")
    );

    let outcome = supervise(&mut drains, &mut handles, cancel).await;

    for handle in &handles {
        match (handle.status, handle.pid) {
            (Some(0), _) | (None, _) => {}
            (Some(status), Some(pid)) => error!("Subprocess {} returned {}", pid, status),
            (Some(status), None) => error!("Subprocess ({}) returned {}", handle.name, status),
        }
    }
    let status = aggregate_status(handles.iter().filter_map(|h| h.status));

    outcome.map(|()| status)
}
