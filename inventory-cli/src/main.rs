use anyhow::Result;
use clap::Parser;

use inventory_cli::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    log::debug!("Starting inventory-cli {}", env!("CARGO_PKG_VERSION"));
    cli::run(args).await
}
