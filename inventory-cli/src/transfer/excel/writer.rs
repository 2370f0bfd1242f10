//! Write tabular documents to xlsx

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};

use crate::inventory::types::{Cell, TabularDocument, TabularSheet};

/// Number format applied to date cells
pub const DATE_FORMAT: &str = "dd/mm/yyyy";

/// Write every sheet of a document, in order
///
/// Headers come from the first row of each sheet. A document without sheets
/// still produces a valid file with one empty sheet named `default_sheet_name`.
pub fn write_workbook_excel<P: AsRef<Path>>(
    document: &TabularDocument,
    path: P,
    default_sheet_name: &str,
) -> Result<()> {
    let path = path.as_ref();
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    if document.sheets.is_empty() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(default_sheet_name)?;
    }

    for sheet in &document.sheets {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&sheet.name)
            .with_context(|| format!("Invalid sheet name: {}", sheet.name))?;
        write_sheet(worksheet, sheet, &date_format)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;

    log::info!(
        "Wrote {} sheet(s) to {}",
        document.sheets.len().max(1),
        path.display()
    );
    Ok(())
}

fn write_sheet(ws: &mut Worksheet, sheet: &TabularSheet, date_format: &Format) -> Result<()> {
    let headers = sheet.headers();

    for (col, name) in headers.iter().enumerate() {
        ws.write_string(0, col as u16, name)?;
    }

    for (row_idx, row) in sheet.rows.iter().enumerate() {
        let row_num = (row_idx + 1) as u32;
        for (key, cell) in row {
            // Rows may list keys in a different order than the first row
            let Some(col) = headers.iter().position(|h| h == key) else {
                log::warn!("Sheet '{}': dropping value under unknown column '{}'", sheet.name, key);
                continue;
            };
            write_cell(ws, row_num, col as u16, cell, date_format)?;
        }
    }

    ws.autofit();
    Ok(())
}

fn write_cell(ws: &mut Worksheet, row: u32, col: u16, cell: &Cell, date_format: &Format) -> Result<()> {
    match cell {
        Cell::Empty => { /* Leave cell empty */ }
        Cell::Text(s) => { ws.write_string(row, col, s)?; }
        Cell::Number(n) => { ws.write_number(row, col, *n)?; }
        Cell::Date(dt) => { ws.write_datetime_with_format(row, col, &to_excel_datetime(dt)?, date_format)?; }
    }
    Ok(())
}

fn to_excel_datetime(dt: &NaiveDateTime) -> Result<ExcelDateTime> {
    let value = ExcelDateTime::from_ymd(dt.year() as u16, dt.month() as u8, dt.day() as u8)?
        .and_hms(dt.hour() as u16, dt.minute() as u8, dt.second() as f64)?;
    Ok(value)
}
