//! Durable key-value storage for workbook snapshots and image blobs

pub mod backup;
mod memory;
pub mod repository;
pub mod snapshot;
mod sqlite;

pub use memory::MemoryGateway;
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
pub use sqlite::SqliteGateway;

use async_trait::async_trait;
use thiserror::Error;

/// Key holding the current workbook snapshot
pub const SNAPSHOT_KEY: &str = "workbook/current";

/// Prefix for image blobs
pub const IMAGE_PREFIX: &str = "images/";

/// Storage key for an image filename
pub fn image_key(filename: &str) -> String {
    format!("{}{}", IMAGE_PREFIX, filename)
}

/// Errors raised by a persistence gateway
///
/// These are soft failures: the in-memory workbook stays authoritative and
/// the caller may retry.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("storage backend error: {0:#}")]
    Backend(#[from] anyhow::Error),

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("malformed snapshot: {0}")]
    Malformed(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Byte-oriented key-value store addressed by string keys
///
/// Writes are whole-value replacements; the last writer wins.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError>;

    async fn delete(&self, key: &str) -> Result<(), PersistenceError>;

    /// All keys starting with `prefix`, sorted
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, PersistenceError>;
}
