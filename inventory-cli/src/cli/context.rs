//! Per-invocation state shared by command handlers

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::imaging::{self, CommandRecognizer};
use crate::inventory::{InventorySession, SchemaResolver};
use crate::persistence::SqliteGateway;

pub struct AppContext {
    pub config: Config,
    pub session: InventorySession,
    /// When the restored snapshot was saved, if there was one
    pub restored_at: Option<DateTime<Utc>>,
    /// Why the stored snapshot could not be restored
    pub restore_error: Option<String>,
}

impl AppContext {
    /// Open the configured database and restore the last snapshot
    ///
    /// An unreadable snapshot is not fatal: the session starts empty so
    /// `import` or `clear` can replace it.
    pub async fn open(config: Config) -> Result<Self> {
        let gateway = SqliteGateway::connect(&config.storage.database_path)
            .await
            .context("Failed to open inventory storage")?;

        let mut session = InventorySession::new(
            Arc::new(gateway),
            SchemaResolver::new(config.roles.clone()),
            config.lookup,
        );
        let (restored_at, restore_error) = match session.store_mut().restore().await {
            Ok(restored_at) => (restored_at, None),
            Err(e) => {
                log::warn!("Failed to restore the stored workbook, starting empty: {}", e);
                (None, Some(e.to_string()))
            }
        };

        Ok(AppContext {
            config,
            session,
            restored_at,
            restore_error,
        })
    }

    /// Bail when nothing has been imported yet
    pub fn require_workbook(&self) -> Result<()> {
        if self.session.store().workbook().is_empty() {
            anyhow::bail!("No workbook loaded. Use 'inventory-cli import <file>' first.");
        }
        Ok(())
    }

    /// Persist pending edits, if any
    pub async fn save(&mut self) -> Result<()> {
        if self.session.store().is_dirty() {
            self.session
                .persist()
                .await
                .context("Failed to save the workbook")?;
        }
        Ok(())
    }

    /// Recognizer built from the `[recognition]` section
    pub fn recognizer(&self) -> Result<CommandRecognizer> {
        let Some(command) = &self.config.recognition.command else {
            anyhow::bail!(
                "Text recognition is not configured. Set [recognition] command in {}",
                crate::config::default_config_path().display()
            );
        };
        Ok(CommandRecognizer::new(
            command.clone(),
            self.config.recognition.args.clone(),
        ))
    }
}

/// Read a photo from disk, rejecting anything that is not a PNG or JPEG
pub async fn read_image(path: &Path) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    imaging::decode(&bytes)
        .with_context(|| format!("Not a PNG or JPEG image: {}", path.display()))?;
    Ok(bytes)
}

/// Spreadsheet row number (header is row 1) to record index
pub fn row_to_index(row: usize) -> Result<usize> {
    if row < 2 {
        anyhow::bail!("Row {} is the header or invalid; data rows start at 2", row);
    }
    Ok(row - 2)
}

/// Record index to spreadsheet row number
pub fn index_to_row(index: usize) -> usize {
    index + 2
}
