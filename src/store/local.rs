//! Blob store backed by a directory on local disk.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::BlobStore;
use crate::errors::AppError;

pub struct LocalBlobStore {
    root: PathBuf,
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    tracing::error!("Local store {} failed for {:?}: {:?}", action, path, err);
    AppError::StoreUnavailable(format!("Failed to {} {}: {}", action, path.display(), err))
}

impl LocalBlobStore {
    /// Open the store, creating the root directory if needed.
    pub async fn open(root: &Path) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| io_error("create", root, e))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Map a key to a path below the root, refusing keys that escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(AppError::BadRequest(format!("Invalid blob key {:?}", key)));
        }
        Ok(self.root.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create", parent, e))?;
        }
        // write beside the target, then rename over it
        let staging = path.with_extension("partial");
        tokio::fs::write(&staging, &body)
            .await
            .map_err(|e| io_error("write", &staging, e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| io_error("rename", &path, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error("list", &dir, e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_error("list", &dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| io_error("inspect", &path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "partial") {
                    continue;
                } else if let Some(key) = self.key_for(&path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", &path, e)),
        }
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_and_nested_listing() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalBlobStore::open(temp_dir.path()).await.unwrap();

        store
            .put("data.csv", Bytes::from_static(b"ID,Name"))
            .await
            .unwrap();
        store
            .put(
                "rosters/misdinar_Sabtu Sore_Saturday, 08 March 2025.csv",
                Bytes::from_static(b"roster"),
            )
            .await
            .unwrap();

        assert_eq!(
            store.get("data.csv").await.unwrap(),
            Some(Bytes::from_static(b"ID,Name"))
        );
        assert_eq!(
            store.list("rosters/").await.unwrap(),
            vec!["rosters/misdinar_Sabtu Sore_Saturday, 08 March 2025.csv"]
        );
        assert_eq!(store.list("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalBlobStore::open(temp_dir.path()).await.unwrap();

        assert!(store.get("rosters/none.csv").await.unwrap().is_none());
        assert!(store.list("rosters/").await.unwrap().is_empty());
        store.delete("rosters/none.csv").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalBlobStore::open(&temp_dir.path().join("store"))
            .await
            .unwrap();

        let err = store
            .put("../outside.csv", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(store.get("/etc/passwd").await.is_err());
    }
}
