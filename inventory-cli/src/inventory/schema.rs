//! Column role inference
//!
//! Spreadsheets of record never agree on column names: "Ubicación Técnica",
//! "UBICACION", "Nº Serie". Roles are resolved by accent- and case-insensitive
//! substring match against the current headers, first match in header order
//! wins. Nothing here is cached: every call works on the headers it is given,
//! so header growth is always observed.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::types::LogicalRole;

/// Lower-case and strip diacritics (canonical decomposition, combining marks dropped)
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Resolve a logical name to the first header containing it
///
/// An empty logical name never matches.
pub fn resolve<'h>(logical_name: &str, headers: &'h [String]) -> Option<&'h str> {
    let needle = normalize_name(logical_name);
    if needle.is_empty() {
        return None;
    }
    headers
        .iter()
        .find(|h| normalize_name(h).contains(&needle))
        .map(|h| h.as_str())
}

/// Try candidate names in priority order, returning the first that resolves
pub fn resolve_any<'h, S: AsRef<str>>(candidates: &[S], headers: &'h [String]) -> Option<&'h str> {
    candidates
        .iter()
        .find_map(|c| resolve(c.as_ref(), headers))
}

/// Every header matching any candidate, in header order
pub fn resolve_all<'h, S: AsRef<str>>(candidates: &[S], headers: &'h [String]) -> Vec<&'h str> {
    let needles: Vec<String> = candidates
        .iter()
        .map(|c| normalize_name(c.as_ref()))
        .filter(|n| !n.is_empty())
        .collect();

    headers
        .iter()
        .filter(|h| {
            let normalized = normalize_name(h);
            needles.iter().any(|n| normalized.contains(n.as_str()))
        })
        .map(|h| h.as_str())
        .collect()
}

/// Candidate logical names per role, in priority order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleAliases {
    pub serial: Vec<String>,
    pub equipment_name: Vec<String>,
    pub location: Vec<String>,
    pub calibration_date: Vec<String>,
    pub observation: Vec<String>,
    pub image: Vec<String>,
    pub verified: Vec<String>,
}

impl Default for RoleAliases {
    fn default() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        RoleAliases {
            serial: names(&["serie", "serial"]),
            equipment_name: names(&["equipo", "equipment"]),
            location: names(&["ubicacion", "tecnica", "location"]),
            calibration_date: names(&["calibracion", "fecha"]),
            observation: names(&["observacion"]),
            image: names(&["imagen", "foto"]),
            verified: names(&["verificado", "verified"]),
        }
    }
}

impl RoleAliases {
    /// Candidates for a role. `Id` is positional and has none.
    pub fn candidates(&self, role: LogicalRole) -> &[String] {
        match role {
            LogicalRole::Id => &[],
            LogicalRole::Serial => &self.serial,
            LogicalRole::EquipmentName => &self.equipment_name,
            LogicalRole::Location => &self.location,
            LogicalRole::CalibrationDate => &self.calibration_date,
            LogicalRole::Observation => &self.observation,
            LogicalRole::Image => &self.image,
            LogicalRole::Verified => &self.verified,
        }
    }
}

/// Role lookups against a header set
#[derive(Debug, Clone, Default)]
pub struct SchemaResolver {
    aliases: RoleAliases,
}

impl SchemaResolver {
    pub fn new(aliases: RoleAliases) -> Self {
        SchemaResolver { aliases }
    }

    /// Column for a role, or `None` when the sheet has no such column
    pub fn column<'h>(&self, role: LogicalRole, headers: &'h [String]) -> Option<&'h str> {
        match role {
            LogicalRole::Id => headers.first().map(|h| h.as_str()),
            _ => resolve_any(self.aliases.candidates(role), headers),
        }
    }

    /// All columns for a repeatable role (observations, images) in header order
    pub fn columns<'h>(&self, role: LogicalRole, headers: &'h [String]) -> Vec<&'h str> {
        match role {
            LogicalRole::Id => headers.first().map(|h| vec![h.as_str()]).unwrap_or_default(),
            _ if role.is_repeatable() => resolve_all(self.aliases.candidates(role), headers),
            _ => self.column(role, headers).into_iter().collect(),
        }
    }

    /// Resolve every role at once for the given headers
    pub fn schema(&self, headers: &[String]) -> SheetSchema {
        let owned = |role: LogicalRole| self.column(role, headers).map(str::to_string);
        let owned_all = |role: LogicalRole| -> Vec<String> {
            self.columns(role, headers)
                .into_iter()
                .map(str::to_string)
                .collect()
        };

        SheetSchema {
            id: owned(LogicalRole::Id),
            serial: owned(LogicalRole::Serial),
            equipment_name: owned(LogicalRole::EquipmentName),
            location: owned(LogicalRole::Location),
            calibration_date: owned(LogicalRole::CalibrationDate),
            verified: owned(LogicalRole::Verified),
            observations: owned_all(LogicalRole::Observation),
            images: owned_all(LogicalRole::Image),
        }
    }
}

/// Roles resolved against one header set
///
/// A value computed on demand; it goes stale as soon as the headers change
/// and must be recomputed rather than kept around.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetSchema {
    pub id: Option<String>,
    pub serial: Option<String>,
    pub equipment_name: Option<String>,
    pub location: Option<String>,
    pub calibration_date: Option<String>,
    pub verified: Option<String>,
    pub observations: Vec<String>,
    pub images: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_strips_accents() {
        assert_eq!(normalize_name("Ubicación Técnica"), "ubicacion tecnica");
        assert_eq!(normalize_name("CALIBRACIÓN"), "calibracion");
        assert_eq!(normalize_name("Nº Serie"), "nº serie");
    }

    #[test]
    fn test_resolve_is_accent_and_case_insensitive() {
        let h = headers(&["Ubicacion Tecnica"]);
        assert_eq!(resolve("ubicación", &h), Some("Ubicacion Tecnica"));

        let h = headers(&["ID", "UBICACIÓN"]);
        assert_eq!(resolve("Ubicacion", &h), Some("UBICACIÓN"));
    }

    #[test]
    fn test_first_match_wins() {
        let h = headers(&["Fecha Alta", "Fecha Calibracion"]);
        assert_eq!(resolve("fecha", &h), Some("Fecha Alta"));
        assert_eq!(
            resolve_any(&["calibracion", "fecha"], &h),
            Some("Fecha Calibracion")
        );
    }

    #[test]
    fn test_unresolved_is_none() {
        let h = headers(&["ID", "Equipo"]);
        assert_eq!(resolve("serie", &h), None);
        assert_eq!(resolve("", &h), None);
        assert_eq!(resolve("serie", &[]), None);
    }

    #[test]
    fn test_location_fallback_chain() {
        let resolver = SchemaResolver::default();
        let h = headers(&["ID", "Area Tecnica"]);
        assert_eq!(resolver.column(LogicalRole::Location, &h), Some("Area Tecnica"));

        let h = headers(&["ID", "Location"]);
        assert_eq!(resolver.column(LogicalRole::Location, &h), Some("Location"));
    }

    #[test]
    fn test_id_is_first_header() {
        let resolver = SchemaResolver::default();
        let h = headers(&["Codigo", "Serie"]);
        assert_eq!(resolver.column(LogicalRole::Id, &h), Some("Codigo"));
        assert_eq!(resolver.column(LogicalRole::Id, &[]), None);
    }

    #[test]
    fn test_repeatable_columns() {
        let resolver = SchemaResolver::default();
        let h = headers(&["ID", "Observaciones", "Foto", "Observaciones 2", "Imagen 2"]);
        let schema = resolver.schema(&h);

        assert_eq!(schema.observations, vec!["Observaciones", "Observaciones 2"]);
        assert_eq!(schema.images, vec!["Foto", "Imagen 2"]);
        assert_eq!(schema.id.as_deref(), Some("ID"));
        assert_eq!(schema.serial, None);
    }

    #[test]
    fn test_custom_aliases() {
        let aliases = RoleAliases {
            serial: vec!["n/s".to_string()],
            ..RoleAliases::default()
        };
        let resolver = SchemaResolver::new(aliases);
        let h = headers(&["ID", "Serie", "N/S Fabricante"]);
        assert_eq!(resolver.column(LogicalRole::Serial, &h), Some("N/S Fabricante"));
    }

    proptest! {
        #[test]
        fn prop_resolve_is_deterministic(
            names in proptest::collection::vec("[A-Za-zÁÉÍÓÚáéíóú ]{0,12}", 0..8),
            logical in "[a-záéíóú]{1,6}",
        ) {
            let first = resolve(&logical, &names);
            let second = resolve(&logical, &names);
            prop_assert_eq!(first, second);
            if let Some(found) = first {
                prop_assert!(normalize_name(found).contains(&normalize_name(&logical)));
            }
        }
    }
}
