//! Allure Relay CLI - Main Entry Point
//!
//! Replays runner event streams into Allure results and manages the
//! reporter configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod events;
mod output;

use allure_relay::ReporterConfig;
use commands::{config, report};

/// Allure Relay - Allure results from browser test runs
#[derive(Parser)]
#[command(name = "allure-relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Reporter configuration file
    #[arg(long, env = "ALLURE_RELAY_CONFIG", default_value = "allure-relay.toml", global = true)]
    config: PathBuf,

    /// Override the results directory from the configuration
    #[arg(long, global = true)]
    results_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a runner event stream into Allure results
    Report(report::ReportArgs),

    /// Manage the reporter configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut reporter_config = ReporterConfig::load(&cli.config)?;
    if let Some(dir) = cli.results_dir {
        reporter_config.result_dir = dir;
    }

    match cli.command {
        Commands::Report(args) => report::execute(args, reporter_config, cli.format)?,
        Commands::Config(cmd) => config::execute(cmd, &cli.config, &reporter_config)?,
        Commands::Version => {
            println!("Allure Relay v{}", allure_relay::VERSION);
        }
    }

    Ok(())
}
