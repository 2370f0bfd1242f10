//! CSV export of a single sheet

use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;

use crate::inventory::types::TabularSheet;

/// Write one sheet as CSV: header row, then one line per record
///
/// Dates are rendered the way the technician sees them (`d/m/yyyy`).
pub fn write_sheet_csv<P: AsRef<Path>>(sheet: &TabularSheet, path: P) -> Result<()> {
    let path = path.as_ref();
    let headers = sheet.headers();

    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    if !headers.is_empty() {
        wtr.write_record(&headers)
            .context("Failed to write CSV header")?;
    }

    for (idx, row) in sheet.rows.iter().enumerate() {
        let values: Vec<String> = headers
            .iter()
            .map(|h| {
                row.iter()
                    .find(|(key, _)| key == h)
                    .map(|(_, cell)| cell.display())
                    .unwrap_or_default()
            })
            .collect();
        wtr.write_record(&values)
            .with_context(|| format!("Failed to write row {}", idx + 2))?;
    }

    wtr.flush()
        .context("Failed to flush CSV writer")?;

    log::info!("CSV file exported to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::types::Cell;
    use chrono::NaiveDate;

    #[test]
    fn test_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equipos.csv");

        let sheet = TabularSheet::new(
            "Equipos",
            vec![
                vec![
                    ("Serie".to_string(), Cell::text("ABC-100")),
                    ("Fecha".to_string(), Cell::date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())),
                    ("Observaciones".to_string(), Cell::text("golpe, revisar")),
                ],
                vec![
                    ("Serie".to_string(), Cell::text("XYZ-200")),
                    ("Fecha".to_string(), Cell::Empty),
                    ("Observaciones".to_string(), Cell::Empty),
                ],
            ],
        );

        write_sheet_csv(&sheet, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["Serie", "Fecha", "Observaciones"]);

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][1], "5/1/2024");
        assert_eq!(&records[0][2], "golpe, revisar");
        assert_eq!(&records[1][1], "");
    }

    #[test]
    fn test_empty_sheet_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vacio.csv");

        write_sheet_csv(&TabularSheet::new("Vacia", Vec::new()), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
