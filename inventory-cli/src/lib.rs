//! Reconcile a physical equipment inventory against a spreadsheet of record
//!
//! Spreadsheets are imported as-is; column roles are inferred from their
//! headers, scanned identifiers are resolved against the current sheet, and
//! every edit is kept in a local SQLite store until the workbook is exported
//! again.

pub mod cli;
pub mod config;
pub mod imaging;
pub mod inventory;
pub mod persistence;
pub mod transfer;
