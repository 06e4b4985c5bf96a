//! Logger setup for the `litmus` binary
//!
//! Session, suite and unit activity is logged under the `litmus` target to
//! stderr, so reports on stdout stay machine-readable. `RUST_LOG` overrides
//! the configured level.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Verbosity of session logging
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// `--verbose` forces debug; unknown configured levels fall back to info
    pub fn resolve(verbose: bool, configured: &str) -> Self {
        if verbose {
            LogLevel::Debug
        } else {
            LogLevel::from_str(configured).unwrap_or(LogLevel::Info)
        }
    }

    /// Filter directive scoping this level to the crate's own events
    pub fn directive(self) -> String {
        format!("litmus={}", self.to_tracing_level())
    }
}

/// Install the stderr subscriber for a run.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_logger(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
