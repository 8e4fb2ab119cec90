//! In-process blob store for development and tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::BlobStore;
use crate::errors::AppError;

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Bytes>>,
    /// Writes to this key fail, to exercise error paths
    failing_key: Mutex<Option<String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put` of `key` fail until cleared with `None`.
    pub fn fail_puts_to(&self, key: Option<&str>) {
        if let Ok(mut failing) = self.failing_key.lock() {
            *failing = key.map(str::to_string);
        }
    }

    fn put_should_fail(&self, key: &str) -> bool {
        self.failing_key
            .lock()
            .map(|failing| failing.as_deref() == Some(key))
            .unwrap_or(false)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), AppError> {
        if self.put_should_fail(key) {
            return Err(AppError::StoreUnavailable(format!(
                "Simulated write failure for {}",
                key
            )));
        }
        self.blobs.write().await.insert(key.to_string(), body);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .blobs
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.blobs.write().await.remove(key);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_list_delete() {
        let store = MemoryBlobStore::new();
        store.put("data.csv", Bytes::from_static(b"ID")).await.unwrap();
        store
            .put("rosters/b.csv", Bytes::from_static(b"b"))
            .await
            .unwrap();
        store
            .put("rosters/a.csv", Bytes::from_static(b"a"))
            .await
            .unwrap();

        assert_eq!(
            store.get("data.csv").await.unwrap(),
            Some(Bytes::from_static(b"ID"))
        );
        assert_eq!(
            store.list("rosters/").await.unwrap(),
            vec!["rosters/a.csv", "rosters/b.csv"]
        );

        store.delete("rosters/a.csv").await.unwrap();
        store.delete("rosters/missing.csv").await.unwrap();
        assert!(store.get("rosters/a.csv").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let store = MemoryBlobStore::new();
        store.fail_puts_to(Some("data.csv"));
        let err = store
            .put("data.csv", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert!(store.get("data.csv").await.unwrap().is_none());

        store.fail_puts_to(None);
        store.put("data.csv", Bytes::from_static(b"x")).await.unwrap();
    }
}
