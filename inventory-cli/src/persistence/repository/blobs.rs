//! Repository for key-value blob operations

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Get a value by key
pub async fn get_value(pool: &SqlitePool, key: &str) -> Result<Option<Vec<u8>>> {
    let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to read key '{}'", key))?;

    match row {
        Some(row) => Ok(Some(row.try_get("value")?)),
        None => Ok(None),
    }
}

/// Insert or replace a value
pub async fn put_value(pool: &SqlitePool, key: &str, value: &[u8]) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO kv_store (key, value, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .with_context(|| format!("Failed to write key '{}'", key))?;

    Ok(())
}

/// Delete a value (no-op when absent)
pub async fn delete_value(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM kv_store WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete key '{}'", key))?;

    Ok(())
}

/// List keys starting with a prefix, sorted
pub async fn list_keys(pool: &SqlitePool, prefix: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
    )
    .bind(prefix)
    .fetch_all(pool)
    .await
    .context("Failed to list keys")?;

    let mut keys = Vec::with_capacity(rows.len());
    for row in rows {
        keys.push(row.try_get("key")?);
    }
    Ok(keys)
}
