//! Blob store backed by an S3 bucket.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::BlobStore;
use crate::config::S3Settings;
use crate::errors::AppError;

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

fn unavailable(action: &str, key: &str, err: impl std::fmt::Debug) -> AppError {
    tracing::error!("S3 {} failed for {}: {:?}", action, key, err);
    AppError::StoreUnavailable(format!("S3 {} failed for {}", action, key))
}

impl S3BlobStore {
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "misdinar",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(unavailable("get", key, service_err));
            }
        };
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| unavailable("read", key, e))?;
        Ok(Some(data.into_bytes()))
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("text/csv")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| unavailable("put", key, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| unavailable("list", prefix, e))?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(str::to_string),
            );

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| unavailable("delete", key, e))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3 bucket {}", self.bucket)
    }
}
