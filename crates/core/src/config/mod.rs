use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::env::{DEFAULT_CONFIG_FILE, SKRITT_CONFIG};
use crate::error::ConfigError;
use crate::logging::LogLevel;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Console (stderr) level; `--debug` overrides it with `debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Level for file sinks attached with `--logfile`
    #[serde(default = "default_file_level")]
    pub file_level: String,

    /// chrono format string for the timestamp prefix of every line
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_file_level() -> String {
    "debug".to_string()
}
fn default_time_format() -> String {
    "%Y%m%d %H%M%S".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_level: default_file_level(),
            time_format: default_time_format(),
        }
    }
}

impl LoggingConfig {
    pub fn console_level(&self) -> Result<LogLevel, ConfigError> {
        self.level.parse()
    }

    pub fn file_level(&self) -> Result<LogLevel, ConfigError> {
        self.file_level.parse()
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Resolution order:
    /// 1. `SKRITT_CONFIG` env var (the file must exist)
    /// 2. `skritt.toml` in the working directory, if present
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(SKRITT_CONFIG) {
            return Self::load_from(Path::new(&path));
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::load_from(&local);
        }

        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.logging.console_level()?;
        config.logging.file_level()?;
        Ok(config)
    }
}
