//! Process-wide logging service.
//!
//! Everything logs through `tracing`. The [`Logging`] service owns a table of
//! sinks (one console sink plus any number of files or writers) that can be
//! attached and detached while the process runs, and renders every event as
//!
//! ```text
//! 20250114 093012 [I] message key=value
//! ```
//!
//! Process output forwarded from pipeline stages uses the dedicated
//! [`PROC_TARGET`] and is ranked between INFO and WARN (see [`LogLevel`]).

mod layer;

pub use layer::SinkLayer;

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::format::{Item, StrftimeItems};
use tracing::{Level, Metadata, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

use crate::config::LoggingConfig;
use crate::env::SKRITT_LOG;
use crate::error::{ConfigError, LoggingError};
use crate::resource;

/// Target carrying output read from child processes.
pub const PROC_TARGET: &str = "skritt::proc";

/// Severity of a rendered log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    /// Output of a child process
    Proc,
    Warn,
    Error,
}

impl LogLevel {
    pub fn of(metadata: &Metadata<'_>) -> Self {
        if metadata.target() == PROC_TARGET {
            return LogLevel::Proc;
        }
        match *metadata.level() {
            Level::TRACE => LogLevel::Trace,
            Level::DEBUG => LogLevel::Debug,
            Level::INFO => LogLevel::Info,
            Level::WARN => LogLevel::Warn,
            Level::ERROR => LogLevel::Error,
        }
    }

    /// Single-letter tag used in rendered lines
    pub fn initial(self) -> char {
        match self {
            LogLevel::Trace => 'T',
            LogLevel::Debug => 'D',
            LogLevel::Info => 'I',
            LogLevel::Proc => 'P',
            LogLevel::Warn => 'W',
            LogLevel::Error => 'E',
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Proc => "proc",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "proc" => Ok(LogLevel::Proc),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLevel(s.to_string())),
        }
    }
}

/// Opaque handle to an attached sink, used to detach it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkHandle(u64);

impl fmt::Display for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct Sink {
    handle: SinkHandle,
    level: LogLevel,
    writer: Box<dyn Write + Send>,
}

#[derive(Default)]
pub(crate) struct SinkTable {
    next_id: u64,
    console: Option<SinkHandle>,
    sinks: Vec<Sink>,
}

impl SinkTable {
    fn insert(&mut self, level: LogLevel, writer: Box<dyn Write + Send>) -> SinkHandle {
        self.next_id += 1;
        let handle = SinkHandle(self.next_id);
        self.sinks.push(Sink {
            handle,
            level,
            writer,
        });
        handle
    }

    fn remove(&mut self, handle: SinkHandle) -> Option<Sink> {
        let index = self.sinks.iter().position(|s| s.handle == handle)?;
        if self.console == Some(handle) {
            self.console = None;
        }
        Some(self.sinks.remove(index))
    }
}

pub(crate) type SharedSinks = Arc<Mutex<SinkTable>>;

pub(crate) fn lock_sinks(sinks: &SharedSinks) -> MutexGuard<'_, SinkTable> {
    sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

type ConsoleFactory = Box<dyn Fn() -> Box<dyn Write + Send> + Send + Sync>;

/// The logging service.
///
/// Construct one per process with [`Logging::init`] at the entry point and
/// pass the returned handle to every component that manages sinks. Tests build
/// their own with [`Logging::with_console`] and install
/// [`Logging::subscriber`] as a scoped default.
pub struct Logging {
    sinks: SharedSinks,
    console: ConsoleFactory,
    file_level: LogLevel,
    time_format: String,
}

impl Logging {
    /// Logging service whose console sink is stderr.
    pub fn new(config: &LoggingConfig) -> Result<Self, ConfigError> {
        Self::with_console(config, io::stderr)
    }

    /// Logging service whose console sink writes to whatever `make_console`
    /// produces. The factory is called again each time the console level
    /// changes.
    pub fn with_console<W, F>(config: &LoggingConfig, make_console: F) -> Result<Self, ConfigError>
    where
        W: Write + Send + 'static,
        F: Fn() -> W + Send + Sync + 'static,
    {
        let console_level = config.console_level()?;
        let file_level = config.file_level()?;
        if StrftimeItems::new(&config.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidTimeFormat(config.time_format.clone()));
        }

        let logging = Self {
            sinks: Arc::new(Mutex::new(SinkTable::default())),
            console: Box::new(move || Box::new(make_console()) as Box<dyn Write + Send>),
            file_level,
            time_format: config.time_format.clone(),
        };
        logging.set_console_level(console_level);
        Ok(logging)
    }

    /// Create the process-wide service and install it as the global
    /// subscriber. Later calls return the already-installed instance.
    pub fn init(config: &LoggingConfig) -> Result<Arc<Self>, LoggingError> {
        resource::try_acquire(|| {
            let logging = Self::new(config)?;
            tracing::subscriber::set_global_default(logging.subscriber())
                .map_err(|e| LoggingError::Install(e.to_string()))?;
            Ok(logging)
        })
    }

    /// Layer rendering events into this service's sinks.
    pub fn layer(&self) -> SinkLayer {
        SinkLayer::new(Arc::clone(&self.sinks), self.time_format.clone())
    }

    /// Subscriber made of this service's layer behind an `EnvFilter` read from
    /// `SKRITT_LOG`. Without the variable every event reaches the sinks, which
    /// apply their own levels.
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
        let filter = EnvFilter::try_from_env(SKRITT_LOG).unwrap_or_else(|_| EnvFilter::new("trace"));
        tracing_subscriber::registry().with(filter).with(self.layer())
    }

    /// Replace the console sink with a fresh one at `level`.
    pub fn set_console_level(&self, level: LogLevel) -> SinkHandle {
        let mut table = lock_sinks(&self.sinks);
        if let Some(previous) = table.console {
            table.remove(previous);
        }
        let handle = table.insert(level, (self.console)());
        table.console = Some(handle);
        handle
    }

    pub fn console_level(&self) -> Option<LogLevel> {
        let table = lock_sinks(&self.sinks);
        let console = table.console?;
        table
            .sinks
            .iter()
            .find(|s| s.handle == console)
            .map(|s| s.level)
    }

    /// Append log lines to `path` at the configured file level.
    pub fn add_file(&self, path: impl AsRef<Path>) -> Result<SinkHandle, LoggingError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LoggingError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let handle = self.add_writer(file, self.file_level);
        tracing::debug!("Attached log file {} as sink {}", path.display(), handle);
        Ok(handle)
    }

    pub fn add_writer<W: Write + Send + 'static>(&self, writer: W, level: LogLevel) -> SinkHandle {
        lock_sinks(&self.sinks).insert(level, Box::new(writer))
    }

    /// Detach a sink. Unknown or already-removed handles are an error.
    pub fn remove_sink(&self, handle: SinkHandle) -> Result<(), LoggingError> {
        let mut sink = lock_sinks(&self.sinks)
            .remove(handle)
            .ok_or(LoggingError::UnknownSink(handle))?;
        let _ = sink.writer.flush();
        Ok(())
    }

    pub fn sink_count(&self) -> usize {
        lock_sinks(&self.sinks).sinks.len()
    }

    /// Flush everything and detach all sinks except the console.
    pub fn shutdown(&self) {
        let mut table = lock_sinks(&self.sinks);
        let console = table.console;
        for sink in table.sinks.iter_mut() {
            let _ = sink.writer.flush();
        }
        table.sinks.retain(|s| Some(s.handle) == console);
    }
}
