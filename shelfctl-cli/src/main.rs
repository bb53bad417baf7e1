//! shelfctl CLI - run and inspect the shelfctl service
//!
//! - `serve`: start the HTTP service, drain on SIGINT/SIGTERM
//! - `config`: print the effective or default configuration

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod tracing_setup;

use tracing_setup::{LogFormat, TracingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "shelfctl",
    author,
    version,
    about = "Accounts and book catalogue service with graceful lifecycle"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, env = "SHELFCTL_LOG_FORMAT", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(commands::ServeArgs),
    /// Inspect configuration (show, defaults)
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is a layer below the real environment; a missing file is fine.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        format: cli.log_format,
    })
    .ok();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Config(args) => commands::run_config(args)?,
    }
    Ok(())
}
