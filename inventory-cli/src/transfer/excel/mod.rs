//! Excel import/export for spreadsheets of record

pub mod reader;
pub mod writer;

pub use reader::{read_workbook_excel, rows_to_tabular};
pub use writer::write_workbook_excel;
