//! The step lifecycle engine.
//!
//! A step resolves its arguments, decides whether its work is needed, runs it
//! and always cleans up:
//!
//! ```text
//! invoke
//!  ├─ parse_args:  pre-parse hooks → clap → --debug/--logfile → post-parse hooks
//!  ├─ gate:        --check  → report needed() as 0 / 1
//!  │               --force or needed() → execute
//!  │               otherwise → skip (0)
//!  │    execute:   pre-run hooks → main → post-run hooks (always)
//!  └─ release:     cleanup() → cleanup hooks → detach --logfile   (always,
//!                  once arguments were resolved)
//! ```
//!
//! Failures in a guarded phase are returned only after the guaranteed phases
//! that follow it have run. Panics unwind through the same path.

mod args;
mod hooks;

pub use args::StepArgs;
pub use hooks::{CLEANUP, HookEntry, HookFn, LifecycleTable, POST_PARSE, POST_RUN, PRE_PARSE, PRE_RUN};

use std::any::Any;
use std::io::{self, IsTerminal, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use clap::{ArgMatches, Args, Command, FromArgMatches};
use futures::FutureExt;
use tracing::{debug, error, trace};

use crate::error::StepError;
use crate::logging::{LogLevel, Logging, SinkHandle};

/// Result of `--check` when the work is needed
pub const CHECK_NEEDED: i32 = 0;
/// Result of `--check` when the work is not needed
pub const CHECK_NOT_NEEDED: i32 = 1;
/// Result of a step whose work was not needed
pub const SKIPPED: i32 = 0;

/// State shared by every step: identity, raw arguments, hook table, resolved
/// arguments and the logging service.
pub struct StepBase<S> {
    name: String,
    argv: Vec<String>,
    hooks: LifecycleTable<S>,
    args: Option<StepArgs>,
    matches: Option<ArgMatches>,
    logging: Arc<Logging>,
    logfile: Option<SinkHandle>,
}

impl<S> StepBase<S> {
    pub fn new<N, I, A>(name: N, logging: Arc<Logging>, argv: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            name: name.into(),
            argv: argv.into_iter().map(Into::into).collect(),
            hooks: LifecycleTable::new(),
            args: None,
            matches: None,
            logging,
            logfile: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn hooks(&self) -> &LifecycleTable<S> {
        &self.hooks
    }

    /// Standard flags, once arguments are resolved
    pub fn args(&self) -> Option<&StepArgs> {
        self.args.as_ref()
    }

    /// Full parse result including step-specific arguments
    pub fn matches(&self) -> Option<&ArgMatches> {
        self.matches.as_ref()
    }

    pub fn logging(&self) -> &Arc<Logging> {
        &self.logging
    }

    pub fn is_resolved(&self) -> bool {
        self.args.is_some()
    }
}

/// A runnable unit of work with a hook-driven lifecycle.
///
/// Implementors provide [`base`](Step::base)/[`base_mut`](Step::base_mut) and
/// [`main`](Step::main); everything else has a default.
#[async_trait]
pub trait Step: Send + Sized + 'static {
    fn base(&self) -> &StepBase<Self>;

    fn base_mut(&mut self) -> &mut StepBase<Self>;

    /// Add step-specific arguments to the parser.
    fn augment(&self, command: Command) -> Command {
        command
    }

    /// Shown in the terminal title while the step executes.
    fn title(&self) -> String {
        self.base().name().to_string()
    }

    /// Whether the work still has to be done.
    fn needed(&self) -> bool {
        true
    }

    /// The step's own work. The returned code becomes the result of
    /// [`invoke`](Step::invoke).
    async fn main(&mut self) -> anyhow::Result<i32>;

    /// Step-specific teardown, run before the `cleanup` hooks.
    fn cleanup(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn add_hook<F>(&mut self, lifecycle: &str, name: &str, func: F, at_begin: bool)
    where
        F: Fn(&mut Self) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.base_mut()
            .hooks
            .add(lifecycle, name, Arc::new(func), at_begin);
    }

    fn list_lifecycles(&self) -> Vec<String> {
        self.base().hooks.lifecycles().map(str::to_string).collect()
    }

    fn list_hooks(&self, lifecycle: &str) -> Vec<String> {
        self.base()
            .hooks
            .hooks(lifecycle)
            .iter()
            .map(|hook| hook.name.clone())
            .collect()
    }

    /// Run every hook of `lifecycle` in order, stopping at the first failure.
    fn run_lifecycle(&mut self, lifecycle: &str) -> Result<(), StepError> {
        // Hooks get `&mut self`, so iterate over a snapshot of the table
        let hooks = self.base().hooks.hooks(lifecycle).to_vec();
        for hook in hooks {
            trace!("Hook {}/{}", lifecycle, hook.name);
            (hook.func)(&mut *self).map_err(|cause| StepError::Hook {
                lifecycle: lifecycle.to_string(),
                hook: hook.name.clone(),
                cause,
            })?;
        }
        Ok(())
    }

    /// Resolve arguments. Does nothing once arguments are resolved.
    fn parse_args(&mut self) -> Result<(), StepError> {
        if self.base().is_resolved() {
            return Ok(());
        }
        self.run_lifecycle(PRE_PARSE)?;

        let command = Command::new(self.base().name().to_string()).no_binary_name(true);
        let command = self.augment(StepArgs::augment_args(command));
        let matches = command.try_get_matches_from(self.base().argv().to_vec())?;
        let args = StepArgs::from_arg_matches(&matches)?;

        let base = self.base_mut();
        if args.debug {
            base.logging.set_console_level(LogLevel::Debug);
        }
        if let Some(path) = &args.logfile {
            base.logfile = Some(base.logging.add_file(path)?);
        }
        base.args = Some(args);
        base.matches = Some(matches);

        self.run_lifecycle(POST_PARSE)
    }

    /// `pre-run` hooks, `main`, then `post-run` hooks even if the former
    /// failed.
    async fn execute(&mut self) -> Result<i32, StepError> {
        let title = self.title();
        debug!("Running {}", title);
        if !self.base().args().is_some_and(|args| args.notitle) {
            set_terminal_title(&title);
        }

        let guarded = AssertUnwindSafe(async {
            self.run_lifecycle(PRE_RUN)?;
            self.main().await.map_err(StepError::Main)
        })
        .catch_unwind()
        .await;
        let post_run = self.run_lifecycle(POST_RUN);
        settle(guarded, post_run)
    }

    /// Top-level entry point: resolve arguments, apply the run gate, and
    /// release the step on every exit path.
    async fn invoke(&mut self) -> Result<i32, StepError> {
        if let Err(err) = self.parse_args() {
            // A failing post-parse hook leaves the step resolved
            if self.base().is_resolved()
                && let Err(later) = release(self)
            {
                error!("{}", later);
            }
            return Err(err);
        }

        let gated = AssertUnwindSafe(run_gate(self)).catch_unwind().await;
        let released = release(self);
        settle(gated, released)
    }
}

async fn run_gate<S: Step>(step: &mut S) -> Result<i32, StepError> {
    let args = step.base().args().cloned().unwrap_or_default();
    if args.check {
        let needed = step.needed();
        debug!("{} is {}needed", step.base().name(), if needed { "" } else { "not " });
        return Ok(if needed { CHECK_NEEDED } else { CHECK_NOT_NEEDED });
    }
    if args.force || step.needed() {
        step.execute().await
    } else {
        debug!("Skipping {}: not needed", step.base().name());
        Ok(SKIPPED)
    }
}

/// Teardown, `cleanup` hooks, then detach the step's log file. All three run;
/// the first failure is returned and the rest are logged.
fn release<S: Step>(step: &mut S) -> Result<(), StepError> {
    let teardown = step.cleanup().map_err(StepError::Teardown);
    let hooks = step.run_lifecycle(CLEANUP);
    let base = step.base_mut();
    let detach = match base.logfile.take() {
        Some(handle) => base.logging.remove_sink(handle).map_err(StepError::from),
        None => Ok(()),
    };

    let mut first = None;
    for result in [teardown, hooks, detach] {
        if let Err(err) = result {
            if first.is_none() {
                first = Some(err);
            } else {
                error!("{}", err);
            }
        }
    }
    first.map_or(Ok(()), Err)
}

/// Combine a guarded phase with the guaranteed phase that followed it. The
/// guarded outcome wins; a panic is resumed after the follow-up ran.
fn settle<T>(
    guarded: Result<Result<T, StepError>, Box<dyn Any + Send>>,
    after: Result<(), StepError>,
) -> Result<T, StepError> {
    match guarded {
        Err(payload) => {
            if let Err(err) = after {
                error!("{}", err);
            }
            panic::resume_unwind(payload)
        }
        Ok(Err(err)) => {
            if let Err(later) = after {
                error!("{}", later);
            }
            Err(err)
        }
        Ok(Ok(value)) => after.map(|()| value),
    }
}

fn set_terminal_title(title: &str) {
    let stderr = io::stderr();
    if stderr.is_terminal() {
        write_title(stderr.lock(), title);
    }
}

/// Emit the xterm title sequence. The title is cosmetic, so a failed write
/// is only logged.
fn write_title<W: Write>(mut out: W, title: &str) {
    if let Err(e) = write!(out, "\x1b]0;{}\x07", title).and_then(|()| out.flush()) {
        debug!("Failed to set terminal title: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::testing::captured;
    use clap::Arg;
    use regex::Regex;
    use std::fs;
    use std::path::PathBuf;
    use tracing::info;

    #[derive(Clone, Copy, PartialEq)]
    enum Outcome {
        Return(i32),
        Fail,
        Panic,
    }

    struct TestStep {
        base: StepBase<TestStep>,
        is_needed: bool,
        outcome: Outcome,
        child_logfile: Option<PathBuf>,
        calls: Vec<String>,
    }

    impl TestStep {
        fn new(logging: Arc<Logging>, argv: &[&str]) -> Self {
            Self {
                base: StepBase::new("test-step", logging, argv.iter().copied()),
                is_needed: true,
                outcome: Outcome::Return(42),
                child_logfile: None,
                calls: Vec::new(),
            }
        }

        fn record_all(&mut self) {
            for lifecycle in [PRE_PARSE, POST_PARSE, PRE_RUN, POST_RUN, CLEANUP] {
                self.add_hook(
                    lifecycle,
                    lifecycle,
                    move |s: &mut TestStep| {
                        s.calls.push(lifecycle.to_string());
                        Ok(())
                    },
                    false,
                );
            }
        }

        fn called(&self, name: &str) -> usize {
            self.calls.iter().filter(|c| *c == name).count()
        }
    }

    #[async_trait]
    impl Step for TestStep {
        fn base(&self) -> &StepBase<Self> {
            &self.base
        }

        fn base_mut(&mut self) -> &mut StepBase<Self> {
            &mut self.base
        }

        fn augment(&self, command: Command) -> Command {
            command.arg(Arg::new("target").long("target"))
        }

        fn needed(&self) -> bool {
            self.is_needed
        }

        async fn main(&mut self) -> anyhow::Result<i32> {
            self.calls.push("main".to_string());
            info!("Running main");
            debug!("Debug message from main");

            if let Some(path) = self.child_logfile.clone() {
                debug!("Outer step running");
                let logfile = path.to_string_lossy().into_owned();
                let mut child = TestStep::new(Arc::clone(self.base.logging()), &["--logfile", logfile.as_str()]);
                child.invoke().await?;
            }

            match self.outcome {
                Outcome::Return(code) => Ok(code),
                Outcome::Fail => anyhow::bail!("main blew up"),
                Outcome::Panic => panic!("main panicked"),
            }
        }

        fn cleanup(&mut self) -> anyhow::Result<()> {
            self.calls.push("teardown".to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_lifecycle_in_registration_order() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &[]);
        for name in ["one", "two", "three"] {
            step.add_hook(
                "custom",
                name,
                move |s: &mut TestStep| {
                    s.calls.push(name.to_string());
                    Ok(())
                },
                false,
            );
        }
        step.add_hook(
            "custom",
            "zero",
            |s: &mut TestStep| {
                s.calls.push("zero".to_string());
                Ok(())
            },
            true,
        );

        step.run_lifecycle("custom").unwrap();
        assert_eq!(step.calls, vec!["zero", "one", "two", "three"]);
        assert_eq!(step.list_hooks("custom"), vec!["zero", "one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_empty_lifecycle_not_added() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &[]);
        step.add_hook("preparse", "h1", |_: &mut TestStep| Ok(()), false);
        step.add_hook("prerun", "h2", |_: &mut TestStep| Ok(()), false);

        step.run_lifecycle("nonexistent").unwrap();

        assert!(step.calls.is_empty());
        assert!(step.list_hooks("nonexistent").is_empty());
        assert_eq!(step.list_lifecycles(), vec!["preparse", "prerun"]);
    }

    #[tokio::test]
    async fn test_full_lifecycle_order() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &["--notitle"]);
        step.record_all();

        assert_eq!(step.invoke().await.unwrap(), 42);
        assert_eq!(
            step.calls,
            vec!["pre-parse", "post-parse", "pre-run", "main", "post-run", "teardown", "cleanup"]
        );
    }

    #[tokio::test]
    async fn test_not_needed_skips_main() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &[]);
        step.is_needed = false;
        step.record_all();

        assert_eq!(step.invoke().await.unwrap(), SKIPPED);
        assert_eq!(step.called("main"), 0);
        assert_eq!(step.called("pre-run"), 0);
        assert_eq!(step.called("teardown"), 1);
        assert_eq!(step.called("cleanup"), 1);
    }

    #[tokio::test]
    async fn test_force_runs_unneeded_step() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &["--force", "--notitle"]);
        step.is_needed = false;

        assert_eq!(step.invoke().await.unwrap(), 42);
        assert_eq!(step.called("main"), 1);
        assert_eq!(step.called("teardown"), 1);
    }

    #[tokio::test]
    async fn test_check_flag() {
        for (is_needed, expected) in [(true, CHECK_NEEDED), (false, CHECK_NOT_NEEDED)] {
            let (logging, _buf) = captured();
            let mut step = TestStep::new(logging, &["--check"]);
            step.is_needed = is_needed;
            step.record_all();

            assert_eq!(step.invoke().await.unwrap(), expected);
            assert_eq!(step.called("main"), 0);
            assert_eq!(step.called("teardown"), 1);
            assert_eq!(step.called("cleanup"), 1);
        }
    }

    #[tokio::test]
    async fn test_check_wins_over_force() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &["--check", "--force"]);
        step.is_needed = false;

        assert_eq!(step.invoke().await.unwrap(), CHECK_NOT_NEEDED);
        assert_eq!(step.called("main"), 0);
    }

    #[tokio::test]
    async fn test_failing_main_still_runs_guaranteed_phases() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &["--notitle"]);
        step.outcome = Outcome::Fail;
        step.record_all();

        let err = step.invoke().await.unwrap_err();
        assert!(matches!(err, StepError::Main(_)));
        assert!(err.to_string().contains("main blew up"));
        assert_eq!(
            step.calls,
            vec!["pre-parse", "post-parse", "pre-run", "main", "post-run", "teardown", "cleanup"]
        );
    }

    #[tokio::test]
    async fn test_failing_hook_skips_main() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &["--notitle"]);
        step.record_all();
        step.add_hook(PRE_RUN, "refuse", |_: &mut TestStep| anyhow::bail!("not today"), false);

        let err = step.invoke().await.unwrap_err();
        match &err {
            StepError::Hook { lifecycle, hook, .. } => {
                assert_eq!(lifecycle, PRE_RUN);
                assert_eq!(hook, "refuse");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(step.called("main"), 0);
        assert_eq!(step.called("post-run"), 1);
        assert_eq!(step.called("cleanup"), 1);
    }

    #[tokio::test]
    async fn test_failing_post_run_reported_after_success() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &["--notitle"]);
        step.add_hook(POST_RUN, "sour", |_: &mut TestStep| anyhow::bail!("sour"), false);
        step.record_all();

        let err = step.invoke().await.unwrap_err();
        assert!(matches!(err, StepError::Hook { .. }));
        assert_eq!(step.called("cleanup"), 1);
    }

    #[tokio::test]
    async fn test_main_error_wins_over_cleanup_error() {
        let (logging, buf) = captured();
        let _guard = tracing::subscriber::set_default(logging.subscriber());
        let mut step = TestStep::new(Arc::clone(&logging), &["--notitle"]);
        step.outcome = Outcome::Fail;
        step.add_hook(CLEANUP, "broken", |_: &mut TestStep| anyhow::bail!("cleanup broke"), false);

        let err = step.invoke().await.unwrap_err();
        assert!(matches!(err, StepError::Main(_)));
        assert!(buf.contents().contains("[E] hook 'broken' in lifecycle 'cleanup' failed: cleanup broke"));
    }

    #[tokio::test]
    async fn test_panicking_main_still_cleans_up() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &["--notitle"]);
        step.outcome = Outcome::Panic;
        step.record_all();

        let result = AssertUnwindSafe(step.invoke()).catch_unwind().await;
        assert!(result.is_err());
        assert_eq!(step.called("post-run"), 1);
        assert_eq!(step.called("teardown"), 1);
        assert_eq!(step.called("cleanup"), 1);
    }

    #[tokio::test]
    async fn test_help_request_skips_cleanup() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &["--help"]);
        step.record_all();

        let err = step.invoke().await.unwrap_err();
        assert!(err.is_argument_failure());
        match err {
            StepError::Arguments(e) => assert_eq!(e.kind(), clap::error::ErrorKind::DisplayHelp),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(step.calls, vec!["pre-parse"]);
        assert!(!step.base().is_resolved());
    }

    #[tokio::test]
    async fn test_failing_post_parse_still_releases() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &[]);
        step.add_hook(POST_PARSE, "bad", |_: &mut TestStep| anyhow::bail!("bad"), false);
        step.record_all();

        assert!(step.invoke().await.is_err());
        assert_eq!(step.called("main"), 0);
        assert_eq!(step.called("teardown"), 1);
        assert_eq!(step.called("cleanup"), 1);
    }

    #[tokio::test]
    async fn test_parse_args_is_idempotent() {
        let (logging, _buf) = captured();
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path().to_string_lossy().into_owned();
        let mut step = TestStep::new(Arc::clone(&logging), &["--logfile", path.as_str(), "--target", "dist"]);
        step.record_all();

        step.parse_args().unwrap();
        step.parse_args().unwrap();

        assert_eq!(step.called("pre-parse"), 1);
        assert_eq!(step.called("post-parse"), 1);
        assert_eq!(logging.sink_count(), 2);
        let target = step.base().matches().and_then(|m| m.get_one::<String>("target"));
        assert_eq!(target.map(String::as_str), Some("dist"));

        // invoke reuses the resolved arguments
        step.invoke().await.unwrap();
        assert_eq!(step.called("pre-parse"), 1);
        assert_eq!(logging.sink_count(), 1);
    }

    #[tokio::test]
    async fn test_debug_flag() {
        let (logging, buf) = captured();
        let _guard = tracing::subscriber::set_default(logging.subscriber());

        let mut step = TestStep::new(Arc::clone(&logging), &["--notitle"]);
        step.invoke().await.unwrap();
        assert!(!buf.contents().contains("Debug message"));

        let mut step = TestStep::new(Arc::clone(&logging), &["--notitle", "--debug"]);
        step.invoke().await.unwrap();
        assert!(buf.contents().contains("[D] Debug message from main"));
        assert_eq!(logging.console_level(), Some(LogLevel::Debug));
    }

    #[tokio::test]
    async fn test_logfile_attached_for_invocation_only() {
        let (logging, _buf) = captured();
        let _guard = tracing::subscriber::set_default(logging.subscriber());
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path().to_string_lossy().into_owned();

        let mut step = TestStep::new(Arc::clone(&logging), &["--notitle", "--logfile", path.as_str()]);
        step.invoke().await.unwrap();
        info!("After logfile detached");

        let content = fs::read_to_string(tmp.path()).unwrap();
        assert!(Regex::new(r"\d{8} \d{6} \[D\]").unwrap().is_match(&content));
        assert!(content.contains("Running main"));
        assert!(content.contains("Debug message from main"));
        assert!(!content.contains("After logfile detached"));
    }

    #[tokio::test]
    async fn test_nested_step_logfiles() {
        let (logging, _buf) = captured();
        let _guard = tracing::subscriber::set_default(logging.subscriber());
        let outer_file = tempfile::NamedTempFile::new().unwrap();
        let inner_file = tempfile::NamedTempFile::new().unwrap();
        let outer_path = outer_file.path().to_string_lossy().into_owned();

        let mut outer = TestStep::new(Arc::clone(&logging), &["--notitle", "--logfile", outer_path.as_str()]);
        outer.outcome = Outcome::Return(0);
        outer.child_logfile = Some(inner_file.path().to_path_buf());
        assert_eq!(outer.invoke().await.unwrap(), 0);

        let outer_log = fs::read_to_string(outer_file.path()).unwrap();
        assert!(outer_log.contains("Outer step running"));
        assert!(outer_log.contains("Running main"));
        // the child's lines reach the parent's file too
        assert_eq!(outer_log.matches("Running main").count(), 2);

        let inner_log = fs::read_to_string(inner_file.path()).unwrap();
        assert!(inner_log.contains("Running main"));
        assert!(inner_log.contains("Debug message from main"));
        assert!(!inner_log.contains("Outer step running"));

        assert_eq!(logging.sink_count(), 1);
    }

    #[tokio::test]
    async fn test_unwritable_logfile_is_an_error() {
        let (logging, _buf) = captured();
        let mut step = TestStep::new(logging, &["--logfile", "/nonexistent/dir/step.log"]);
        step.record_all();

        let err = step.invoke().await.unwrap_err();
        assert!(matches!(err, StepError::Logging(_)));
        assert_eq!(step.called("main"), 0);
    }

    #[test]
    fn test_settle_prefers_guarded_error() {
        let guarded: Result<Result<i32, StepError>, Box<dyn Any + Send>> =
            Ok(Err(StepError::Main(anyhow::anyhow!("first"))));
        let err = settle(guarded, Err(StepError::Teardown(anyhow::anyhow!("second")))).unwrap_err();
        assert!(err.to_string().contains("first"));

        let ok: Result<Result<i32, StepError>, Box<dyn Any + Send>> = Ok(Ok(3));
        assert_eq!(settle(ok, Ok(())).unwrap(), 3);
    }

    struct ClosedTerminal;

    impl Write for ClosedTerminal {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_title_sequence() {
        let mut out = Vec::new();
        write_title(&mut out, "skritt: sort");
        assert_eq!(out, b"\x1b]0;skritt: sort\x07");
    }

    #[test]
    fn test_title_write_failure_is_logged() {
        let (logging, buf) = captured();
        let _guard = tracing::subscriber::set_default(logging.subscriber());
        logging.set_console_level(LogLevel::Debug);

        write_title(ClosedTerminal, "skritt");
        assert!(buf.contents().contains("[D] Failed to set terminal title:"));
    }
}
