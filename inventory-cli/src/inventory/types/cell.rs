//! Cell value representation for inventory sheets

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Format used when a date is shown to a technician (es-ES short date)
pub const DISPLAY_DATE_FORMAT: &str = "%-d/%-m/%Y";

/// Format used when a date is edited or typed (`YYYY-MM-DD`)
pub const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Cell {
    /// Empty cell (the spreadsheet's empty string)
    #[default]
    Empty,
    /// Free text
    Text(String),
    /// Numeric value (integers are stored as whole floats)
    Number(f64),
    /// Date, optionally with a time component
    Date(NaiveDateTime),
}

impl Cell {
    /// Build a text cell, collapsing the empty string into `Cell::Empty`
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    /// Build a date cell at midnight
    pub fn date(date: NaiveDate) -> Self {
        Cell::Date(date.and_time(chrono::NaiveTime::MIN))
    }

    /// Check if the cell carries no value
    ///
    /// Whitespace-only text counts as empty, mirroring how the spreadsheet
    /// treats blank-looking cells when looking for free slots.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Try to get as date
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Date(dt) => Some(*dt),
            Cell::Text(s) => parse_date_text(s),
            _ => None,
        }
    }

    /// Plain-text rendering used for comparisons and CSV export
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Date(dt) => format_date_text(dt),
        }
    }

    /// Rendering for tables shown to the technician
    pub fn display(&self) -> String {
        match self {
            Cell::Date(dt) => dt.format(DISPLAY_DATE_FORMAT).to_string(),
            other => other.to_text(),
        }
    }

    /// Date in `YYYY-MM-DD` form for editing; empty when the cell holds no date
    pub fn to_input_date(&self) -> String {
        self.as_date()
            .map(|dt| dt.format(INPUT_DATE_FORMAT).to_string())
            .unwrap_or_default()
    }

    /// Parse from a JSON value (legacy snapshots store rows as plain JSON)
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Cell::Empty,
            serde_json::Value::Bool(b) => Cell::Text(b.to_string()),
            serde_json::Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or_default(),
            serde_json::Value::String(s) => {
                // Dates were serialized as ISO-8601 strings
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Cell::Date(dt.naive_utc());
                }
                Cell::text(s.clone())
            }
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Cell::Text(json.to_string())
            }
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::Date(value)
    }
}

/// Whole numbers print without a fractional part (`1` rather than `1.0`)
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn format_date_text(dt: &NaiveDateTime) -> String {
    if dt.time() == chrono::NaiveTime::MIN {
        dt.format(INPUT_DATE_FORMAT).to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, INPUT_DATE_FORMAT)
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_collapses() {
        assert_eq!(Cell::text(""), Cell::Empty);
        assert!(Cell::Text("   ".to_string()).is_empty());
        assert!(!Cell::Number(0.0).is_empty());
    }

    #[test]
    fn test_number_text_rendering() {
        assert_eq!(Cell::Number(1.0).to_text(), "1");
        assert_eq!(Cell::Number(1.5).to_text(), "1.5");
        assert_eq!(Cell::Number(-42.0).to_text(), "-42");
    }

    #[test]
    fn test_date_rendering() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let cell = Cell::date(date);
        assert_eq!(cell.display(), "5/1/2024");
        assert_eq!(cell.to_input_date(), "2024-01-05");
        assert_eq!(cell.to_text(), "2024-01-05");
    }

    #[test]
    fn test_text_dates_are_editable() {
        let cell = Cell::text("2023-11-30");
        assert_eq!(cell.to_input_date(), "2023-11-30");
        assert_eq!(Cell::text("not a date").to_input_date(), "");
    }

    #[test]
    fn test_from_json_values() {
        assert_eq!(Cell::from_json(&serde_json::json!(null)), Cell::Empty);
        assert_eq!(Cell::from_json(&serde_json::json!(3)), Cell::Number(3.0));
        assert_eq!(Cell::from_json(&serde_json::json!("Bomba")), Cell::text("Bomba"));
        assert_eq!(Cell::from_json(&serde_json::json!("")), Cell::Empty);

        let date = Cell::from_json(&serde_json::json!("2024-01-01T00:00:00.000Z"));
        assert_eq!(date.to_input_date(), "2024-01-01");
    }
}
