//! Config command - view and change settings in ~/.evidence/config.yaml.

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;

use evidence_cli::config::{Config, CONFIG_KEYS};

#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence config                              Show all settings\n    \
    evidence config get export_format            Print one value\n    \
    evidence config set export_format markdown   Change a value\n    \
    evidence config set default_session ''       Clear a value")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        Some(ConfigCommand::Show) | None => show_config(),
        Some(ConfigCommand::Get { key }) => get_config(&key),
        Some(ConfigCommand::Set { key, value }) => set_config(&key, &value),
    }
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    let path = Config::config_path()?;

    println!("{}", "Evidence Configuration".bold());
    println!();
    println!("  {}  {}", "File:".dimmed(), path.display());
    println!();

    for key in CONFIG_KEYS {
        let value = config.get(key).unwrap_or_else(|| "(not set)".to_string());
        println!("  {:<22} {}", format!("{key}:").dimmed(), value);
    }

    Ok(())
}

fn get_config(key: &str) -> Result<()> {
    if !CONFIG_KEYS.contains(&key) {
        bail!(
            "Unknown config key '{}'. Valid keys: {}",
            key,
            CONFIG_KEYS.join(", ")
        );
    }

    let config = Config::load()?;
    match config.get(key) {
        Some(value) => println!("{value}"),
        None => println!("{}", format!("Config key '{key}' is not set").yellow()),
    }
    Ok(())
}

fn set_config(key: &str, value: &str) -> Result<()> {
    let path = Config::config_path()?;
    // Environment overrides are not persisted
    let mut config = Config::load_from(&path)?;
    config.set(key, value)?;
    config.save_to(&path)?;

    println!("{} {} = {}", "Set".green(), key, value);
    Ok(())
}
