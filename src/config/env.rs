//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LITMUS";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Debounce delay from LITMUS_DEBOUNCE_MS
    pub debounce_ms: Option<u64>,
    /// Per-test timeout from LITMUS_TIMEOUT_MS
    pub timeout_ms: Option<u64>,
    /// Name filter from LITMUS_FILTER
    pub filter: Option<String>,
    /// Output format from LITMUS_FORMAT
    pub format: Option<String>,
    /// Colored output from LITMUS_COLOR
    pub color: Option<bool>,
    /// Log level from LITMUS_LOG
    pub log_level: Option<String>,
    /// Config file from LITMUS_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            debounce_ms: get_env_parse("DEBOUNCE_MS"),
            timeout_ms: get_env_parse("TIMEOUT_MS"),
            filter: get_env("FILTER"),
            format: get_env("FORMAT"),
            color: get_env_bool("COLOR"),
            log_level: get_env("LOG"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.debounce_ms.is_some()
            || self.timeout_ms.is_some()
            || self.filter.is_some()
            || self.format.is_some()
            || self.color.is_some()
            || self.log_level.is_some()
            || self.config_file.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {ENV_PREFIX}_DEBOUNCE_MS: {:?}", self.debounce_ms);
        println!("  {ENV_PREFIX}_TIMEOUT_MS:  {:?}", self.timeout_ms);
        println!("  {ENV_PREFIX}_FILTER:      {:?}", self.filter);
        println!("  {ENV_PREFIX}_FORMAT:      {:?}", self.format);
        println!("  {ENV_PREFIX}_COLOR:       {:?}", self.color);
        println!("  {ENV_PREFIX}_LOG:         {:?}", self.log_level);
        println!("  {ENV_PREFIX}_CONFIG:      {:?}", self.config_file);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all LITMUS environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_DEBOUNCE_MS   Quiet period before a batch runs");
    println!("  {ENV_PREFIX}_TIMEOUT_MS    Per-test time limit");
    println!("  {ENV_PREFIX}_FILTER        Only run tests whose name or suite matches");
    println!("  {ENV_PREFIX}_FORMAT        Output format (table, json, json-pretty, csv, summary)");
    println!("  {ENV_PREFIX}_COLOR         Colored output (true/false)");
    println!("  {ENV_PREFIX}_LOG           Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_CONFIG        Path to configuration file");
    println!("  RUST_LOG              Full tracing filter, overrides {ENV_PREFIX}_LOG");
}
