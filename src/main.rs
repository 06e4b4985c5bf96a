//! litmus - debounced test runner
//!
//! Registers the bundled sample tests on a session, waits for the debounced
//! batch to finish, and prints the report.
//!
//! ## Usage
//!
//! ```bash
//! # Run the samples and print a table
//! litmus run
//!
//! # Stream results as they settle, then print JSON
//! litmus run --live --format json-pretty
//!
//! # Only run the stack suite, with a 100ms limit per test
//! litmus run --filter stack --timeout-ms 100
//!
//! # Write a config file with defaults
//! litmus config init
//! ```

use anyhow::{bail, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use litmus::config::{env::print_env_help, AppConfig, EnvConfig};
use litmus::output::ResultFormatter;
use litmus::utils::{init_logger, LogLevel};
use litmus::{samples, Session};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();
    let config = load_config(args.config.as_deref(), &env)?;

    init_logger(LogLevel::resolve(args.verbose, &config.log_level));

    match args.command {
        cli::Command::Run(run_args) => {
            if !run_samples(config, run_args).await? {
                std::process::exit(1);
            }
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, config)?;
        }
    }

    Ok(())
}

/// Config file (explicit, `LITMUS_CONFIG`, or discovered), then environment
fn load_config(path: Option<&str>, env: &EnvConfig) -> Result<AppConfig> {
    let mut config = match path.or(env.config_file.as_deref()) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_default()?,
    };
    config.apply_env(env);
    Ok(config)
}

/// Returns whether every test passed
async fn run_samples(mut config: AppConfig, args: cli::RunArgs) -> Result<bool> {
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(debounce) = args.debounce_ms {
        config.session.debounce_ms = debounce;
    }
    if args.timeout_ms.is_some() {
        config.session.timeout_ms = args.timeout_ms;
    }
    if args.filter.is_some() {
        config.session.filter = args.filter;
    }
    if args.no_color {
        config.output.color = false;
    }
    config.output.live |= args.live;
    config.validate()?;

    let mut formatter = ResultFormatter::new(config.output_format()?);
    if !config.output.color {
        formatter = formatter.no_color();
    }

    let session = Session::new(config.session.clone());
    let printer = config.output.live.then(|| {
        let mut events = session.subscribe();
        let mut formatter = ResultFormatter::default();
        if !config.output.color {
            formatter = formatter.no_color();
        }
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(line) = formatter.format_event(&event) {
                            eprintln!("{line}");
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Live output fell behind, skipped {} events", missed)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    samples::register(&session);
    info!(
        "Registered {} units, waiting {}ms for registrations to settle",
        session.units().len(),
        config.session.debounce_ms
    );

    let report = session.settled().await;
    debug!("Session settled after {} batches", session.batches_run());

    // closing the event channel lets the printer drain and exit
    drop(session);
    if let Some(printer) = printer {
        if let Err(e) = printer.await {
            warn!("Live output task failed: {}", e);
        }
    }

    debug!("Printing report as {:?}", formatter.format());
    println!("{}", formatter.format_report(&report)?);
    Ok(report.is_successful())
}

fn manage_config(args: cli::ConfigArgs, config: AppConfig) -> Result<()> {
    use std::path::Path;

    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                bail!("Configuration file already exists: {output}. Use --force to overwrite.");
            }

            AppConfig::default().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env, format } => {
            if env {
                EnvConfig::load().print_summary();
                println!();
                print_env_help();
            } else {
                let yaml = match format.as_str() {
                    "yaml" | "yml" => true,
                    "json" => false,
                    other => bail!("Unknown config format '{other}'. Use yaml or json"),
                };
                println!("{}", config.render(yaml)?);
            }
        }
    }

    Ok(())
}
