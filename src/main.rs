use altinrade::application::cli::{self, Cli};
use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    cli::init_tracing();
    let cli = Cli::parse();
    cli::run(cli).await
}
