//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Debounced test runner with Jest-style matchers
#[derive(Parser, Debug)]
#[command(name = "litmus")]
#[command(version)]
#[command(about = "Run the bundled sample tests through a debounced session")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register the sample tests and print the batch report
    Run(RunArgs),

    /// Inspect or create configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Quiet period in milliseconds before a batch runs
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Per-test time limit in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Only run tests whose name or suite contains this text
    #[arg(long)]
    pub filter: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print each test result as it settles
    #[arg(long)]
    pub live: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Also list LITMUS_* environment variables
        #[arg(long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Write a configuration file with default values
    Init {
        /// Output file path
        #[arg(short, long, default_value = "litmus.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
