//! Versioned workbook snapshots
//!
//! Current snapshots are a JSON envelope `{version, savedAt, workbook}`.
//! Version 1 (or no version at all) is the single-sheet layout written by
//! older builds: `{sheetName, headers?, data: [row, ...], savedAt}`. It is
//! upgraded into a one-sheet workbook on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PersistenceError;
use crate::inventory::types::{Cell, Record, Sheet, Workbook};

/// Version written by this build
pub const SNAPSHOT_VERSION: u32 = 2;

/// A serialized workbook plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub workbook: Workbook,
}

impl Snapshot {
    /// Snapshot of a workbook taken now
    pub fn new(workbook: Workbook) -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            workbook,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PersistenceError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode any known snapshot layout
    pub fn decode(bytes: &[u8]) -> Result<Self, PersistenceError> {
        let value: Value = serde_json::from_slice(bytes)?;

        let version = match value.get("version") {
            None | Some(Value::Null) => 1,
            Some(v) => v
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| PersistenceError::Malformed(format!("bad version field: {}", v)))?,
        };

        match version {
            1 => decode_legacy(&value),
            SNAPSHOT_VERSION => Ok(serde_json::from_value(value)?),
            other => Err(PersistenceError::UnsupportedVersion(other)),
        }
    }
}

/// Upgrade a single-sheet snapshot
///
/// Without an explicit `headers` list the header order is the key order of
/// the first row, in the order the keys appear in the stored JSON.
fn decode_legacy(value: &Value) -> Result<Snapshot, PersistenceError> {
    let sheet_name = value
        .get("sheetName")
        .and_then(Value::as_str)
        .ok_or_else(|| PersistenceError::Malformed("legacy snapshot without sheetName".to_string()))?;

    let rows = match value.get("data") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(rows)) => rows.iter().filter_map(Value::as_object).collect(),
        Some(_) => {
            return Err(PersistenceError::Malformed(
                "legacy snapshot data is not a list".to_string(),
            ));
        }
    };

    let headers: Vec<String> = match value.get("headers").and_then(Value::as_array) {
        Some(list) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        None => rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default(),
    };

    let mut sheet = Sheet::with_headers(sheet_name, headers.clone());
    for row in rows {
        let record: Record = headers
            .iter()
            .map(|h| {
                let cell = row.get(h).map(Cell::from_json).unwrap_or_default();
                (h.clone(), cell)
            })
            .collect();
        sheet.push_record(record);
    }

    let saved_at = value
        .get("savedAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    log::info!(
        "Upgraded legacy snapshot for sheet '{}' ({} records)",
        sheet_name,
        sheet.len()
    );

    Ok(Snapshot {
        version: SNAPSHOT_VERSION,
        saved_at,
        workbook: Workbook::from_sheets(vec![sheet]),
    })
}
