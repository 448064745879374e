//! Config Commands

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::path::Path;

use allure_relay::ReporterConfig;

use crate::output::print_success;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

pub fn execute(cmd: ConfigCommands, path: &Path, config: &ReporterConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ReporterConfig::default()
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Wrote {}", path.display()));
        }
        ConfigCommands::Show => {
            let content = toml::to_string_pretty(config).context("Failed to encode configuration")?;
            println!("{}", content);
        }
    }
    Ok(())
}
