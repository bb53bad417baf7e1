use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{ConfigOverrides, ShelfConfig};

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML (password redacted)
    Show(ShowArgs),
    /// Print the built-in defaults as TOML
    Defaults,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show(args) => run_show(args),
        ConfigCommands::Defaults => run_defaults(),
    }
}

fn run_show(args: ShowArgs) -> Result<()> {
    let config = ShelfConfig::load(&args.overrides)?;
    print!("{}", config.to_redacted_toml()?);
    Ok(())
}

fn run_defaults() -> Result<()> {
    print!("{}", ShelfConfig::default().to_redacted_toml()?);
    Ok(())
}
