//! Configuration module
//!
//! Handles loading and managing configuration. Values are resolved from the
//! config file, then `LITMUS_*` environment variables, then CLI flags.

pub mod env;
mod file;

pub use env::EnvConfig;
pub use file::{expand_path, CONFIG_LOCATIONS};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::output::OutputFormat;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scheduling and execution settings
    pub session: SessionConfig,

    /// Report rendering settings
    pub output: OutputConfig,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Settings for a test session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period after the last registration before a batch runs
    pub debounce_ms: u64,

    /// Per-test time limit; tests run unbounded when unset
    pub timeout_ms: Option<u64>,

    /// Only run tests whose name or suite contains this substring
    pub filter: Option<String>,

    /// Buffered events per subscriber before the oldest are dropped
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            timeout_ms: None,
            filter: None,
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Report rendering settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format (table, json, json-pretty, csv, summary)
    pub format: String,

    /// Colorize table output
    pub color: bool,

    /// Print each test transition as it happens
    pub live: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "table".to_string(),
            color: true,
            live: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            output: OutputConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Override values with any `LITMUS_*` variables that are set
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(debounce) = env.debounce_ms {
            self.session.debounce_ms = debounce;
        }
        if env.timeout_ms.is_some() {
            self.session.timeout_ms = env.timeout_ms;
        }
        if env.filter.is_some() {
            self.session.filter = env.filter.clone();
        }
        if let Some(format) = &env.format {
            self.output.format = format.clone();
        }
        if let Some(color) = env.color {
            self.output.color = color;
        }
        if let Some(level) = &env.log_level {
            self.log_level = level.clone();
        }
    }

    /// Parsed output format
    pub fn output_format(&self) -> Result<OutputFormat> {
        match OutputFormat::from_str(&self.output.format) {
            Some(format) => Ok(format),
            None => bail!(
                "Unknown output format '{}'. Use table, json, json-pretty, csv, or summary",
                self.output.format
            ),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.output_format()?;

        if self.session.event_capacity == 0 {
            bail!("session.event_capacity must be at least 1");
        }
        if self.session.timeout_ms == Some(0) {
            bail!("session.timeout_ms must be greater than 0 when set");
        }
        if crate::utils::LogLevel::from_str(&self.log_level).is_none() {
            bail!("Unknown log level '{}'", self.log_level);
        }

        Ok(())
    }
}
