use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

use crate::application::system::System;
use crate::config::{self, Config};
use crate::domain::ports::QuoteAdapter;
use crate::infrastructure::adapter::MockAdapter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Mode {
    Mock,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Gold-pricing technical-analysis and paper-trading engine", long_about = None)]
pub struct Cli {
    /// Tick source to drive ingestion from.
    #[arg(long, value_enum, default_value = "mock")]
    pub mode: Mode,

    /// Optional TOML overlay for the simulation grid; replaces the seeded
    /// default grid when the store has no simulations yet.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overrides `DATABASE_URL` from the environment.
    #[arg(long)]
    pub db: Option<String>,

    /// Seed for the deterministic mock adapter.
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
}

/// Stdout-only `tracing` registry, matching the headless server entrypoint:
/// no UI channel, `RUST_LOG` controls verbosity via `EnvFilter`.
pub fn init_tracing() {
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();
}

/// Loads configuration, builds the system, drives it with the selected
/// adapter, and blocks until a shutdown signal arrives.
pub async fn run(cli: Cli) -> Result<()> {
    info!("altinrade {} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.database_url = db;
    }
    info!(database_url = %config.database_url, interval_s = config.collection_interval_s, "configuration loaded");

    let adapter: Box<dyn QuoteAdapter> = match cli.mode {
        Mode::Mock => Box::new(MockAdapter::new(cli.seed)),
    };
    let grid_overlay = cli.config.as_deref().map(config::load_simulation_grid_overlay).transpose()?;

    let system = System::build(config).await?;
    let handle = system.start(adapter, grid_overlay).await?;
    info!("system running, press Ctrl+C to shut down");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = handle.shutdown.send(true);

    Ok(())
}
