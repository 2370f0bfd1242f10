//! Logical roles a spreadsheet column can play

use serde::{Deserialize, Serialize};

/// Semantic meaning of a column, independent of its literal header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogicalRole {
    /// Primary identifier, always header #0
    Id,
    /// Serial number (secondary key)
    Serial,
    /// Human readable equipment name
    EquipmentName,
    /// Technical location
    Location,
    /// Last calibration date
    CalibrationDate,
    /// Observation text slots (repeatable)
    Observation,
    /// Image reference slots (repeatable)
    Image,
    /// Verification timestamp
    Verified,
}

impl LogicalRole {
    /// Stable kebab-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalRole::Id => "id",
            LogicalRole::Serial => "serial",
            LogicalRole::EquipmentName => "equipment-name",
            LogicalRole::Location => "location",
            LogicalRole::CalibrationDate => "calibration-date",
            LogicalRole::Observation => "observation",
            LogicalRole::Image => "image",
            LogicalRole::Verified => "verified",
        }
    }

    /// Roles that may occupy several numbered columns
    pub fn is_repeatable(&self) -> bool {
        matches!(self, LogicalRole::Observation | LogicalRole::Image)
    }

    /// Header created when a role has no column yet
    pub fn default_header(&self) -> &'static str {
        match self {
            LogicalRole::Id => "ID",
            LogicalRole::Serial => "Serie",
            LogicalRole::EquipmentName => "Equipo",
            LogicalRole::Location => "Ubicacion Tecnica",
            LogicalRole::CalibrationDate => "Fecha Calibracion",
            LogicalRole::Observation => "Observaciones",
            LogicalRole::Image => "Imagen",
            LogicalRole::Verified => "Verificado",
        }
    }
}

impl std::fmt::Display for LogicalRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
