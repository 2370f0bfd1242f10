//! Workbook, sheet and record model

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Cell;

const EMPTY_CELL: &Cell = &Cell::Empty;

/// A single row, keyed by header name
///
/// A record stored in a [`Sheet`] always carries exactly the sheet's header
/// keys. Schema growth goes through [`crate::inventory::mutator`], which
/// backfills every record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: HashMap<String, Cell>,
}

impl Record {
    /// Create a record with every header set to empty
    pub fn blank(headers: &[String]) -> Self {
        Record {
            values: headers
                .iter()
                .map(|h| (h.clone(), Cell::Empty))
                .collect(),
        }
    }

    /// Get a cell by header name
    pub fn get(&self, header: &str) -> Option<&Cell> {
        self.values.get(header)
    }

    /// Get a cell by header name, treating unknown headers as empty
    pub fn cell(&self, header: &str) -> &Cell {
        self.values.get(header).unwrap_or(EMPTY_CELL)
    }

    /// Set an existing field. Returns false if the header is not part of this record.
    pub fn set(&mut self, header: &str, cell: impl Into<Cell>) -> bool {
        match self.values.get_mut(header) {
            Some(slot) => {
                *slot = cell.into();
                true
            }
            None => false,
        }
    }

    /// Check if the record has a key for this header
    pub fn contains(&self, header: &str) -> bool {
        self.values.contains_key(header)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the record has no fields at all
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Add a key with an empty value if missing (schema backfill)
    pub(crate) fn backfill(&mut self, header: &str) {
        self.values
            .entry(header.to_string())
            .or_insert(Cell::Empty);
    }

    /// Headers missing from this record and keys that don't belong to `headers`
    pub(crate) fn shape_diff(&self, headers: &[String]) -> (Vec<String>, Vec<String>) {
        let missing = headers
            .iter()
            .filter(|h| !self.values.contains_key(*h))
            .cloned()
            .collect();
        let mut extra: Vec<String> = self
            .values
            .keys()
            .filter(|k| !headers.contains(k))
            .cloned()
            .collect();
        extra.sort();
        (missing, extra)
    }
}

impl FromIterator<(String, Cell)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Cell)>>(iter: I) -> Self {
        Record {
            values: iter.into_iter().collect(),
        }
    }
}

/// A named sheet: ordered headers plus ordered records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    name: String,
    headers: Vec<String>,
    records: Vec<Record>,
}

impl Sheet {
    /// Create an empty sheet with no headers
    pub fn new(name: impl Into<String>) -> Self {
        Sheet {
            name: name.into(),
            headers: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Create an empty sheet with the given headers
    pub fn with_headers(name: impl Into<String>, headers: Vec<String>) -> Self {
        Sheet {
            name: name.into(),
            headers,
            records: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_header(&self, header: &str) -> bool {
        self.headers.iter().any(|h| h == header)
    }

    /// A record shaped for this sheet with every field empty
    pub fn blank_record(&self) -> Record {
        Record::blank(&self.headers)
    }

    pub(crate) fn record_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.records.get_mut(index)
    }

    pub(crate) fn push_record(&mut self, record: Record) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Append a header and backfill every record with an empty value
    pub(crate) fn push_header(&mut self, header: String) {
        for record in &mut self.records {
            record.backfill(&header);
        }
        self.headers.push(header);
    }
}

/// Ordered collection of sheets with a current-sheet pointer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workbook {
    sheets: Vec<Sheet>,
    current_sheet: Option<String>,
}

impl Workbook {
    /// Create an empty workbook
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a workbook from sheets; the first sheet becomes current
    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        let current_sheet = sheets.first().map(|s| s.name.clone());
        Workbook {
            sheets,
            current_sheet,
        }
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn current_sheet_name(&self) -> Option<&str> {
        self.current_sheet.as_deref()
    }

    pub fn current_sheet(&self) -> Option<&Sheet> {
        self.current_sheet.as_deref().and_then(|name| self.sheet(name))
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Total record count across all sheets
    pub fn total_records(&self) -> usize {
        self.sheets.iter().map(|s| s.len()).sum()
    }

    pub(crate) fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub(crate) fn set_current(&mut self, name: &str) {
        self.current_sheet = Some(name.to_string());
    }
}
