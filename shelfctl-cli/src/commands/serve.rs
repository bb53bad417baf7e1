//! HTTP server command
//!
//! Runs the service until SIGINT/SIGTERM, then drains and exits.

use anyhow::{Context, Result};
use clap::Parser;
use shelfctl_server::{run_server, DrainOutcome, Shutdown};

use crate::config::{ConfigOverrides, ShelfConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = ShelfConfig::load(&args.overrides)?;
    let service = config.to_service_config()?;

    tracing::info!(
        bind = %service.bind_addr,
        max_open = service.pool.max_open,
        max_idle = service.pool.max_idle,
        drain_timeout = ?service.lifecycle.drain_timeout,
        "starting shelfctl server"
    );

    // Blocks until shutdown
    let outcome = run_server(service, Shutdown::new())
        .await
        .context("Server error")?;

    if let DrainOutcome::Forced { abandoned } = outcome {
        tracing::warn!(abandoned, "shutdown forced before all requests finished");
    }

    Ok(())
}
