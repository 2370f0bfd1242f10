//! Record-level commands: lookup, registration, edits and verification

mod handler;

pub use handler::{handle_record_command, print_record};

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum RecordCommands {
    /// Look up an ID or serial in the current sheet
    Find {
        query: String,
    },

    /// Resolve a scanned code (URL-encoded paths are decoded)
    Scan {
        code: String,

        /// Offer to register the equipment when nothing matches
        #[arg(short, long)]
        register: bool,
    },

    /// Show one record by spreadsheet row number
    View {
        row: usize,
    },

    /// Create a record, or update the one with the same serial
    Register {
        #[arg(short, long)]
        serial: String,

        #[arg(short, long)]
        location: String,

        #[arg(short, long, default_value = "")]
        observation: String,

        /// Photo to attach (PNG or JPEG)
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Edit calibration date, location or observations of a row
    Update {
        row: usize,

        /// Calibration date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[arg(short, long)]
        location: Option<String>,

        /// Observation edit as COLUMN=TEXT (repeatable)
        #[arg(short, long = "observation", value_parser = parse_column_value)]
        observations: Vec<(String, String)>,
    },

    /// Add another observation column to the current sheet
    AddObservation,

    /// Mark a scanned record as verified now
    Verify {
        code: String,
    },

    /// List known locations
    Locations,
}

fn parse_column_value(s: &str) -> Result<(String, String), String> {
    let (column, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=TEXT, got '{}'", s))?;
    if column.trim().is_empty() {
        return Err("column name is empty".to_string());
    }
    Ok((column.trim().to_string(), value.to_string()))
}
