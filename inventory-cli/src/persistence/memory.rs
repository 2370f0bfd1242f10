//! In-process gateway for tests and throwaway sessions

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PersistenceError, PersistenceGateway};

#[derive(Debug, Default)]
pub struct MemoryGateway {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    offline: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable store: every call fails with `Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        self.check()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        self.check()?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        self.check()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        self.check()?;
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let gateway = MemoryGateway::new();
        gateway.put("images/a.jpg", b"abc").await.unwrap();
        assert_eq!(gateway.get("images/a.jpg").await.unwrap(), Some(b"abc".to_vec()));

        gateway.put("images/a.jpg", b"xyz").await.unwrap();
        assert_eq!(gateway.get("images/a.jpg").await.unwrap(), Some(b"xyz".to_vec()));

        gateway.delete("images/a.jpg").await.unwrap();
        assert_eq!(gateway.get("images/a.jpg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_by_prefix() {
        let gateway = MemoryGateway::new();
        gateway.put("images/b.jpg", b"1").await.unwrap();
        gateway.put("images/a.jpg", b"2").await.unwrap();
        gateway.put("workbook/current", b"{}").await.unwrap();

        assert_eq!(
            gateway.keys("images/").await.unwrap(),
            vec!["images/a.jpg", "images/b.jpg"]
        );
    }

    #[tokio::test]
    async fn test_offline_fails() {
        let gateway = MemoryGateway::new();
        gateway.set_offline(true);
        assert!(matches!(
            gateway.put("k", b"v").await,
            Err(PersistenceError::Unavailable(_))
        ));
    }
}
