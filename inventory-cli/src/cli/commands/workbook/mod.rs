//! Workbook-level commands: import, export, sheets and session state

mod handler;

pub use handler::handle_workbook_command;

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum WorkbookCommands {
    /// Load a spreadsheet, replacing the stored workbook
    Import {
        /// xlsx, xls or ods file
        file: PathBuf,
    },

    /// Write the workbook to a spreadsheet
    Export {
        /// Output path (defaults to export.file_name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the current sheet as CSV instead
        #[arg(long)]
        csv: bool,
    },

    /// List sheets
    Sheets,

    /// Make another sheet current
    UseSheet {
        name: String,
    },

    /// List records of the current sheet
    Show {
        /// Only rows whose serial contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Maximum rows to print
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Show storage and session state
    Status,

    /// Drop the stored workbook (images are kept)
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}
