//! Moving inventories in and out of spreadsheet files
//!
//! Readers and writers only deal with flat tabular documents; role
//! inference and identity resolution happen in the inventory engine.

pub mod csv;
pub mod excel;

pub use self::csv::write_sheet_csv;
pub use excel::{read_workbook_excel, write_workbook_excel};
