//! SQLite-backed gateway

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::repository::{self, blobs};
use super::{PersistenceError, PersistenceGateway};

#[derive(Debug, Clone)]
pub struct SqliteGateway {
    pool: SqlitePool,
}

impl SqliteGateway {
    /// Open (or create) a database file and make sure the schema exists
    pub async fn connect(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        log::debug!("Opened inventory database at {}", path.display());
        Self::from_pool(pool).await
    }

    /// Private in-memory database (one connection, gone on drop)
    pub async fn in_memory() -> Result<Self, PersistenceError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, PersistenceError> {
        repository::init_schema(&pool).await?;
        Ok(SqliteGateway { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(blobs::get_value(&self.pool, key).await?)
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        Ok(blobs::put_value(&self.pool, key, value).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        Ok(blobs::delete_value(&self.pool, key).await?)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        Ok(blobs::list_keys(&self.pool, prefix).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("inventory.db");

        {
            let gateway = SqliteGateway::connect(&path).await.unwrap();
            gateway.put("images/x_1.jpg", b"jpeg").await.unwrap();
            gateway.pool().close().await;
        }

        let gateway = SqliteGateway::connect(&path).await.unwrap();
        assert_eq!(
            gateway.get("images/x_1.jpg").await.unwrap(),
            Some(b"jpeg".to_vec())
        );
        assert_eq!(gateway.keys("images/").await.unwrap(), vec!["images/x_1.jpg"]);
    }

    #[tokio::test]
    async fn test_in_memory_gateway() {
        let gateway = SqliteGateway::in_memory().await.unwrap();
        gateway.put("k", b"v").await.unwrap();
        gateway.delete("k").await.unwrap();
        assert_eq!(gateway.get("k").await.unwrap(), None);
    }
}
