//! Dynamic schema growth
//!
//! Observation and image slots are flat numbered columns ("Observaciones",
//! "Observaciones 2", ...). New slots are appended to the header list and
//! every existing record is backfilled so record shapes stay aligned.

use regex::Regex;
use std::sync::LazyLock;

use super::schema::normalize_name;
use super::types::Sheet;

static TRAILING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s+(\d+)$").expect("static pattern"));

/// Ensure a column exists. Returns true if it was added.
///
/// Idempotent: a second call with the same name changes nothing.
pub fn ensure_column(name: &str, sheet: &mut Sheet) -> bool {
    if sheet.has_header(name) {
        return false;
    }
    log::debug!("Adding column '{}' to sheet '{}'", name, sheet.name());
    sheet.push_header(name.to_string());
    true
}

/// Name of the next numbered column for a prefix
///
/// Scans headers of the form `<prefix> <N>` (prefix compared accent- and
/// case-insensitively) and returns `<prefix> <max N + 1>`. The bare prefix
/// counts as slot 1, so the first numbered column is `<prefix> 2`.
/// Returns `None` once the suffix would overflow.
pub fn next_numbered_column(prefix: &str, sheet: &Sheet) -> Option<String> {
    let prefix = prefix.trim();
    let wanted = normalize_name(prefix);

    let max = sheet
        .headers()
        .iter()
        .filter_map(|header| {
            let caps = TRAILING_NUMBER.captures(header.trim())?;
            if normalize_name(&caps[1]) != wanted {
                return None;
            }
            caps[2].parse::<u32>().ok()
        })
        .max()
        .unwrap_or(1);

    let next = max.checked_add(1)?;
    Some(format!("{} {}", prefix, next))
}

/// Add the next numbered column for a prefix and return its name
pub fn add_numbered_column(prefix: &str, sheet: &mut Sheet) -> Option<String> {
    let name = next_numbered_column(prefix, sheet)?;
    ensure_column(&name, sheet);
    Some(name)
}

/// Slot number of a column within its role (1-based, header order)
pub fn slot_number(column: &str, slots: &[String]) -> Option<usize> {
    slots.iter().position(|c| c == column).map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::types::Cell;

    fn sheet(names: &[&str]) -> Sheet {
        Sheet::with_headers("Equipos", names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_ensure_column_is_idempotent() {
        let mut s = sheet(&["ID", "Serie"]);
        s.push_record(s.blank_record());

        assert!(ensure_column("Verificado", &mut s));
        assert!(!ensure_column("Verificado", &mut s));

        assert_eq!(s.headers(), &["ID", "Serie", "Verificado"]);
        assert_eq!(s.record(0).unwrap().get("Verificado"), Some(&Cell::Empty));
    }

    #[test]
    fn test_ensure_column_backfills_all_records() {
        let mut s = sheet(&["ID"]);
        for _ in 0..3 {
            s.push_record(s.blank_record());
        }
        ensure_column("Imagen", &mut s);
        for record in s.records() {
            assert_eq!(record.len(), 2);
            assert!(record.contains("Imagen"));
        }
    }

    #[test]
    fn test_next_numbered_default() {
        let s = sheet(&["Observaciones"]);
        assert_eq!(next_numbered_column("Observaciones", &s).as_deref(), Some("Observaciones 2"));

        let s = sheet(&["ID"]);
        assert_eq!(next_numbered_column("Imagen", &s).as_deref(), Some("Imagen 2"));
    }

    #[test]
    fn test_next_numbered_uses_max() {
        let s = sheet(&["Observaciones", "Observaciones 2", "Observaciones 4"]);
        assert_eq!(next_numbered_column("Observaciones", &s).as_deref(), Some("Observaciones 5"));
    }

    #[test]
    fn test_next_numbered_ignores_other_prefixes() {
        let s = sheet(&["Imagen 7", "Observaciones 3", "Observaciones Extra 9"]);
        assert_eq!(next_numbered_column("Observaciones", &s).as_deref(), Some("Observaciones 4"));
    }

    #[test]
    fn test_next_numbered_is_accent_insensitive() {
        let s = sheet(&["Observación", "OBSERVACION 3"]);
        assert_eq!(next_numbered_column("Observación", &s).as_deref(), Some("Observación 4"));
    }

    #[test]
    fn test_next_numbered_stops_at_suffix_limit() {
        let s = sheet(&["Observaciones 4294967295"]);
        assert_eq!(next_numbered_column("Observaciones", &s), None);

        let mut s = sheet(&["ID", "Observaciones 4294967295"]);
        assert_eq!(add_numbered_column("Observaciones", &mut s), None);
        assert_eq!(s.headers().len(), 2);
    }

    #[test]
    fn test_next_numbered_skips_unparseable_suffix() {
        let s = sheet(&["Observaciones 99999999999", "Observaciones 3"]);
        assert_eq!(next_numbered_column("Observaciones", &s).as_deref(), Some("Observaciones 4"));
    }

    #[test]
    fn test_add_numbered_column() {
        let mut s = sheet(&["ID", "Observaciones"]);
        s.push_record(s.blank_record());

        let name = add_numbered_column("Observaciones", &mut s).unwrap();
        assert_eq!(name, "Observaciones 2");
        assert!(s.has_header("Observaciones 2"));
        assert!(s.record(0).unwrap().contains("Observaciones 2"));
    }

    #[test]
    fn test_slot_number() {
        let slots = vec!["Imagen".to_string(), "Imagen 2".to_string()];
        assert_eq!(slot_number("Imagen 2", &slots), Some(2));
        assert_eq!(slot_number("Foto", &slots), None);
    }
}
