//! Read spreadsheets of record into tabular documents

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime};

use crate::inventory::types::{Cell, TabularDocument, TabularRow, TabularSheet};

/// Header given to columns whose header cell is blank
pub const EMPTY_HEADER: &str = "__EMPTY";

/// Read every sheet of a workbook (xlsx, xlsm, xls, ods), in workbook order
///
/// The first row of each sheet is the header row; every data row carries
/// all headers, blank cells as empty. Fully blank rows are skipped.
pub fn read_workbook_excel<P: AsRef<Path>>(path: P) -> Result<TabularDocument> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open spreadsheet: {}", path.display()))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(sheet_names.len());

    for sheet_name in sheet_names {
        let range = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

        let rows: Vec<&[Data]> = range.rows().collect();
        let sheet = rows_to_tabular(&sheet_name, &rows);
        log::debug!("Read sheet '{}' ({} rows)", sheet_name, sheet.rows.len());
        sheets.push(sheet);
    }

    Ok(TabularDocument::new(sheets))
}

/// Convert raw rows (header first) into a tabular sheet
pub fn rows_to_tabular(name: &str, rows: &[&[Data]]) -> TabularSheet {
    let Some((header_row, data_rows)) = rows.split_first() else {
        return TabularSheet::new(name, Vec::new());
    };

    let headers = parse_header(header_row);
    let data_rows: Vec<&[Data]> = data_rows
        .iter()
        .copied()
        .filter(|row| row.iter().any(|c| !data_to_cell(c).is_empty()))
        .collect();

    // Blank-headed columns that never hold data are range padding
    let columns: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(col, header)| {
            !header.starts_with(EMPTY_HEADER)
                || data_rows
                    .iter()
                    .any(|row| row.get(*col).is_some_and(|c| !data_to_cell(c).is_empty()))
        })
        .collect();

    let rows: Vec<TabularRow> = data_rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|(col, header)| {
                    let cell = row.get(*col).map(data_to_cell).unwrap_or_default();
                    ((*header).clone(), cell)
                })
                .collect()
        })
        .collect();

    TabularSheet::new(name, rows)
}

/// Header names with blanks named `__EMPTY` and duplicates suffixed `_1`, `_2`, ...
fn parse_header(row: &[Data]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut headers = Vec::with_capacity(row.len());

    for cell in row {
        let text = data_to_cell(cell).to_text();
        let base = if text.trim().is_empty() {
            EMPTY_HEADER.to_string()
        } else {
            text.trim().to_string()
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        headers.push(name);
    }

    headers
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => Cell::Date(value),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_iso(s).map(Cell::Date).unwrap_or_else(|| Cell::text(s.clone())),
        Data::DurationIso(s) => Cell::text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}
