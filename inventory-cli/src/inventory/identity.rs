//! Tiered identifier lookup
//!
//! A scanned or typed identifier is resolved against the primary column
//! (header #0) first, then against the serial column, and finally by
//! substring over serials. Partial hits are suggestions only and are never
//! selected automatically.

use serde::{Deserialize, Serialize};

use super::schema::SchemaResolver;
use super::types::{Cell, LogicalRole, Sheet};

/// How a lookup was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchTier {
    /// Exact match on the primary identifier column
    ExactId,
    /// Exact match on the serial column
    ExactSecondary,
    /// Serial contains the query (suggestions)
    Partial,
    /// Nothing matched
    None,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::ExactId => "exact-id",
            MatchTier::ExactSecondary => "exact-secondary",
            MatchTier::Partial => "partial",
            MatchTier::None => "none",
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, MatchTier::ExactId | MatchTier::ExactSecondary)
    }
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a lookup
///
/// Exact tiers carry exactly one index in `matches` (the first hit in row
/// order). Further rows with the same identifier are listed in `shadowed`
/// so callers can warn about duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMatch {
    pub tier: MatchTier,
    pub matches: Vec<usize>,
    pub shadowed: Vec<usize>,
}

impl IdentityMatch {
    pub fn none() -> Self {
        IdentityMatch {
            tier: MatchTier::None,
            matches: Vec::new(),
            shadowed: Vec::new(),
        }
    }

    fn exact(tier: MatchTier, hits: Vec<usize>) -> Self {
        let mut hits = hits.into_iter();
        IdentityMatch {
            tier,
            matches: hits.next().into_iter().collect(),
            shadowed: hits.collect(),
        }
    }

    /// The selected record, only for exact tiers
    pub fn primary(&self) -> Option<usize> {
        if self.tier.is_exact() {
            self.matches.first().copied()
        } else {
            None
        }
    }

    pub fn has_duplicates(&self) -> bool {
        !self.shadowed.is_empty()
    }
}

/// Trim and uppercase, the comparison form for identifiers
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_uppercase()
}

fn normalize_cell(cell: &Cell) -> String {
    normalize_identifier(&cell.to_text())
}

/// Normalize an identifier coming from a symbol decoder
///
/// Codes encoding a path (`.../%2F...`) carry the identifier in their last
/// segment; any remaining `%` becomes `-`.
pub fn decode_identifier(raw: &str) -> String {
    if !raw.contains("%2F") && !raw.contains("%2f") {
        return raw.to_string();
    }
    let last = raw
        .split("%2F")
        .flat_map(|part| part.split("%2f"))
        .last()
        .unwrap_or_default();
    last.replace('%', "-")
}

/// Tiered record lookup for one sheet
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    schema: SchemaResolver,
}

impl IdentityResolver {
    pub fn new(schema: SchemaResolver) -> Self {
        IdentityResolver { schema }
    }

    /// Resolve a query to a record index (or partial suggestions)
    pub fn find(&self, query: &str, sheet: &Sheet) -> IdentityMatch {
        let target = normalize_identifier(query);
        if target.is_empty() || sheet.is_empty() {
            return IdentityMatch::none();
        }

        let headers = sheet.headers();

        // 1. Primary identifier (header #0)
        if let Some(id_key) = self.schema.column(LogicalRole::Id, headers) {
            let hits = exact_hits(sheet, id_key, &target);
            if !hits.is_empty() {
                log::debug!("'{}' matched {} row(s) by ID", target, hits.len());
                return IdentityMatch::exact(MatchTier::ExactId, hits);
            }
        }

        let Some(serial_key) = self.schema.column(LogicalRole::Serial, headers) else {
            log::debug!("No serial column in sheet '{}'", sheet.name());
            return IdentityMatch::none();
        };

        // 2. Serial
        let hits = exact_hits(sheet, serial_key, &target);
        if !hits.is_empty() {
            log::debug!("'{}' matched {} row(s) by serial", target, hits.len());
            return IdentityMatch::exact(MatchTier::ExactSecondary, hits);
        }

        // 3. Serial contains query
        let partial: Vec<usize> = sheet
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| normalize_cell(r.cell(serial_key)).contains(&target))
            .map(|(i, _)| i)
            .collect();

        if partial.is_empty() {
            IdentityMatch::none()
        } else {
            IdentityMatch {
                tier: MatchTier::Partial,
                matches: partial,
                shadowed: Vec::new(),
            }
        }
    }

    /// First row whose serial equals the query exactly (registration upsert)
    pub fn exact_serial(&self, serial: &str, sheet: &Sheet) -> Option<usize> {
        let target = normalize_identifier(serial);
        if target.is_empty() {
            return None;
        }
        let key = self.schema.column(LogicalRole::Serial, sheet.headers())?;
        exact_hits(sheet, key, &target).into_iter().next()
    }
}

fn exact_hits(sheet: &Sheet, key: &str, target: &str) -> Vec<usize> {
    sheet
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| normalize_cell(r.cell(key)) == target)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::types::Record;

    fn sheet(rows: &[(&str, &str)]) -> Sheet {
        let mut s = Sheet::with_headers(
            "Equipos",
            vec!["ID".to_string(), "Serie".to_string(), "Equipo".to_string()],
        );
        for (id, serial) in rows {
            let record: Record = [
                ("ID".to_string(), Cell::text(*id)),
                ("Serie".to_string(), Cell::text(*serial)),
                ("Equipo".to_string(), Cell::Empty),
            ]
            .into_iter()
            .collect();
            s.push_record(record);
        }
        s
    }

    #[test]
    fn test_exact_secondary_ignores_case_and_whitespace() {
        let s = sheet(&[("1", "ABC-123"), ("2", "XYZ-9")]);
        let result = IdentityResolver::default().find(" abc-123 ", &s);
        assert_eq!(result.tier, MatchTier::ExactSecondary);
        assert_eq!(result.matches, vec![0]);
        assert_eq!(result.primary(), Some(0));
    }

    #[test]
    fn test_id_tier_wins_over_serial() {
        let s = sheet(&[("A1", "B2"), ("B2", "C3")]);
        let result = IdentityResolver::default().find("b2", &s);
        assert_eq!(result.tier, MatchTier::ExactId);
        assert_eq!(result.matches, vec![1]);
    }

    #[test]
    fn test_numeric_ids_match() {
        let mut s = Sheet::with_headers("S", vec!["ID".to_string()]);
        let record: Record = [("ID".to_string(), Cell::Number(42.0))].into_iter().collect();
        s.push_record(record);

        let result = IdentityResolver::default().find("42", &s);
        assert_eq!(result.tier, MatchTier::ExactId);
    }

    #[test]
    fn test_partial_suggestions() {
        let s = sheet(&[("1", "ABC-100"), ("2", "ABC-200"), ("3", "XYZ")]);
        let result = IdentityResolver::default().find("abc", &s);
        assert_eq!(result.tier, MatchTier::Partial);
        assert_eq!(result.matches, vec![0, 1]);
        assert_eq!(result.primary(), None);
    }

    #[test]
    fn test_none_cases() {
        let resolver = IdentityResolver::default();
        let s = sheet(&[("1", "ABC")]);
        assert_eq!(resolver.find("zzz", &s), IdentityMatch::none());
        assert_eq!(resolver.find("   ", &s), IdentityMatch::none());
        assert_eq!(resolver.find("ABC", &sheet(&[])), IdentityMatch::none());
    }

    #[test]
    fn test_unresolved_serial_still_checks_id() {
        let mut s = Sheet::with_headers("S", vec!["Codigo".to_string(), "Equipo".to_string()]);
        let record: Record = [
            ("Codigo".to_string(), Cell::text("K-1")),
            ("Equipo".to_string(), Cell::text("Bomba")),
        ]
        .into_iter()
        .collect();
        s.push_record(record);

        let resolver = IdentityResolver::default();
        assert_eq!(resolver.find("k-1", &s).tier, MatchTier::ExactId);
        assert_eq!(resolver.find("k", &s), IdentityMatch::none());
    }

    #[test]
    fn test_duplicates_return_first_and_report_rest() {
        let s = sheet(&[("1", "DUP"), ("2", "DUP"), ("3", "DUP")]);
        let result = IdentityResolver::default().find("dup", &s);
        assert_eq!(result.matches, vec![0]);
        assert_eq!(result.shadowed, vec![1, 2]);
        assert!(result.has_duplicates());
    }

    #[test]
    fn test_exact_serial() {
        let s = sheet(&[("1", "AAA"), ("2", "BBB")]);
        let resolver = IdentityResolver::default();
        assert_eq!(resolver.exact_serial("bbb", &s), Some(1));
        assert_eq!(resolver.exact_serial("BB", &s), None);
        assert_eq!(resolver.exact_serial("", &s), None);
    }

    #[test]
    fn test_decode_identifier() {
        assert_eq!(decode_identifier("ABC-123"), "ABC-123");
        assert_eq!(decode_identifier("https%3A%2F%2Fhost%2Fitem%2FSN%20001"), "SN-20001");
        assert_eq!(decode_identifier("a%2fb%2FC"), "C");
    }
}
