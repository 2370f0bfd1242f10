//! User configuration loaded from `config.toml`
//!
//! Every section is optional; a missing file means all defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::inventory::{LookupOptions, RoleAliases};

const APP_DIR: &str = "inventory-cli";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "inventory.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub roles: RoleAliases,
    pub lookup: LookupOptions,
    pub export: ExportConfig,
    pub recognition: RecognitionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding the session snapshot and images
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            database_path: data_dir().join(DATABASE_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub file_name: String,
    /// Name given to the only sheet of an export with no sheets
    pub default_sheet_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            file_name: "Equipos_Actualizados.xlsx".to_string(),
            default_sheet_name: "Sheet1".to_string(),
        }
    }
}

/// External recognition program; without a command, recognition is unavailable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
}

impl Config {
    /// Load from `path`, or from the default location when `None`
    ///
    /// An explicit path must exist; the default one may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// `<config_dir>/inventory-cli/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
