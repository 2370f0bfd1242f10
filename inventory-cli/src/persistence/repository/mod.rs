//! Repository layer for database operations

pub mod blobs;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

/// Create tables if they don't exist yet
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value BLOB NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create kv_store table")?;

    Ok(())
}
