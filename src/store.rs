//! Object-storage capability: presigned PUT issuance and object deletion.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region, SharedCredentialsProvider};
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::presigning::PresigningConfig;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ServeArgs;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Provider(String),
}

/// The storage operations the API endpoints depend on. The server holds one
/// implementation for its whole lifetime; implementations must be stateless
/// per call.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Issue a write-capable URL for `key`, scoped to the given content type
    /// and size and expiring after `ttl`.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        size: u64,
        ttl: Duration,
    ) -> Result<String, StoreError>;

    /// Delete the object stored under `key`. Deleting a key that does not
    /// exist follows the provider's idempotent-delete semantics.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Storage key for an upload: a fresh random identifier combined with the
/// original file name.
pub fn unique_key(file_name: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), file_name)
}

/// S3-backed store. Works against AWS proper or any S3-compatible endpoint
/// (MinIO, R2) via `--endpoint`.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub async fn connect(args: &ServeArgs) -> Result<Self, StoreError> {
        let bucket = args.bucket.trim();
        if bucket.is_empty() {
            return Err(StoreError::Provider("bucket is not configured".into()));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(args.region.clone()));
        if let (Some(access), Some(secret)) = (args.access_key.as_deref(), args.secret_key.as_deref())
        {
            loader = loader.credentials_provider(SharedCredentialsProvider::new(
                Credentials::new(access, secret, None, None, "drop-gate"),
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = args.endpoint.as_deref() {
            // Path-style addressing keeps bucket names out of DNS for
            // self-hosted endpoints.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        size: u64,
        ttl: Duration,
    ) -> Result<String, StoreError> {
        let presign_config =
            PresigningConfig::expires_in(ttl).map_err(|err| StoreError::Provider(err.to_string()))?;
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .presigned(presign_config)
            .await
            .map_err(|err| StoreError::Provider(provider_message(&err)))?;
        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StoreError::Provider(provider_message(&err)))?;
        Ok(())
    }
}

fn provider_message<E>(err: &E) -> String
where
    E: ProvideErrorMetadata + std::fmt::Display,
{
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}


#[cfg(test)]
mod tests {
    use super::unique_key;

    #[test]
    fn unique_key_keeps_file_name_and_never_repeats() {
        let first = unique_key("report.pdf");
        let second = unique_key("report.pdf");
        assert!(first.ends_with("-report.pdf"));
        assert!(second.ends_with("-report.pdf"));
        assert_ne!(first, second);
    }
}
