//! Command-line interface

pub mod commands;
pub mod context;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{ImageCommands, RecordCommands, WorkbookCommands};
use context::AppContext;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "inventory-cli")]
#[command(about = "Reconcile a physical equipment inventory against a spreadsheet of record")]
#[command(version)]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to <config dir>/inventory-cli/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Workbook(WorkbookCommands),

    #[command(flatten)]
    Record(RecordCommands),

    #[command(flatten)]
    Image(ImageCommands),
}

/// Load config, open the stored session and dispatch
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let mut ctx = AppContext::open(config).await?;

    match cli.command {
        Commands::Workbook(cmd) => commands::workbook::handle_workbook_command(&mut ctx, cmd).await,
        Commands::Record(cmd) => commands::record::handle_record_command(&mut ctx, cmd).await,
        Commands::Image(cmd) => commands::image::handle_image_command(&mut ctx, cmd).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_nested_commands() {
        let cli = Cli::parse_from(["inventory-cli", "-v", "images", "export"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Image(_)));

        let cli = Cli::parse_from(["inventory-cli", "update", "5", "--location", "Sala 2"]);
        assert!(matches!(cli.command, Commands::Record(_)));
    }
}
