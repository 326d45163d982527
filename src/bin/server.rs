//! Headless entrypoint, suitable for container/server deployments.
//!
//! Identical wiring to the `altinrade` binary; kept as a separate target so
//! deployment tooling can reference a stable `server` binary name regardless
//! of what the package binary is called.
//!
//! ```sh
//! DATABASE_URL=sqlite://altinrade.db cargo run --bin server -- --mode mock
//! ```

use altinrade::application::cli::{self, Cli};
use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    cli::init_tracing();
    let cli = Cli::parse();
    cli::run(cli).await
}
