//! Plain row-list documents exchanged with the tabular codec

use super::Cell;

/// A flat row: ordered `(header, cell)` pairs
pub type TabularRow = Vec<(String, Cell)>;

/// One sheet as produced or consumed by the codec
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularSheet {
    pub name: String,
    pub rows: Vec<TabularRow>,
}

impl TabularSheet {
    pub fn new(name: impl Into<String>, rows: Vec<TabularRow>) -> Self {
        TabularSheet {
            name: name.into(),
            rows,
        }
    }

    /// Header names in key order of the first row (empty when there are no rows)
    pub fn headers(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }
}

/// Ordered list of sheets
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularDocument {
    pub sheets: Vec<TabularSheet>,
}

impl TabularDocument {
    pub fn new(sheets: Vec<TabularSheet>) -> Self {
        TabularDocument { sheets }
    }

    pub fn sheet(&self, name: &str) -> Option<&TabularSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}
