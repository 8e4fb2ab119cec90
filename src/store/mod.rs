//! Blob storage for the master table and roster snapshots.
//!
//! Every backend treats a call as atomic: it either completes or fails with
//! `AppError::StoreUnavailable`. Nothing is retried.

mod local;
mod memory;
mod s3;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::StoreBackend;
use crate::errors::AppError;

/// Key-value store of opaque blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a blob, `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError>;

    /// Create or overwrite a blob.
    async fn put(&self, key: &str, body: Bytes) -> Result<(), AppError>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, AppError>;

    /// Remove a blob; removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Backend name for logs.
    fn describe(&self) -> String;
}

/// Open the configured backend.
pub async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn BlobStore>, AppError> {
    let store: Arc<dyn BlobStore> = match backend {
        StoreBackend::S3(settings) => Arc::new(S3BlobStore::new(settings)),
        StoreBackend::Local(root) => Arc::new(LocalBlobStore::open(root).await?),
        StoreBackend::Memory => Arc::new(MemoryBlobStore::new()),
    };
    tracing::info!("Blob store: {}", store.describe());
    Ok(store)
}
