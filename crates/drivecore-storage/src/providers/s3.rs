//! S3-compatible blob store (requires the `s3` feature).

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{debug, info};

use drivecore_core::config::S3StorageConfig;
use drivecore_core::error::{AppError, ErrorKind};
use drivecore_core::result::AppResult;
use drivecore_core::traits::{BlobStore, UrlDisposition};

/// Blob store backed by an S3 bucket. Storage paths are object keys.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Create a store from configuration.
    pub async fn new(config: &S3StorageConfig) -> AppResult<Self> {
        if config.bucket.is_empty() {
            return Err(AppError::configuration("storage.s3.bucket must be set"));
        }
        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket = %config.bucket,
            "Initializing S3 blob store"
        );

        let mut loader = aws_config::from_env().region(Region::new(config.region.clone()));
        if !config.endpoint.is_empty() {
            loader = loader.endpoint_url(&config.endpoint);
        }
        if !config.access_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "drivecore-config",
            ));
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(!config.endpoint.is_empty())
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    fn key(path: &str) -> AppResult<&str> {
        let key = path.trim_start_matches('/');
        if key.is_empty() {
            return Err(AppError::validation("Storage path must not be empty"));
        }
        Ok(key)
    }
}

fn s3_error(message: String, e: impl std::error::Error + Send + Sync + 'static) -> AppError {
    AppError::with_source(ErrorKind::BlobStore, message, e)
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn put(&self, data: Bytes, path_hint: &str) -> AppResult<String> {
        let key = Self::key(path_hint)?;
        let len = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| s3_error(format!("Failed to upload object: {key}"), e))?;

        debug!(key, bytes = len, "Uploaded object");
        Ok(key.to_string())
    }

    async fn get(&self, storage_path: &str) -> AppResult<Bytes> {
        let key = Self::key(storage_path)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| s3_error(format!("Failed to fetch object: {key}"), e))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| s3_error(format!("Failed to read object body: {key}"), e))?;
        Ok(body.into_bytes())
    }

    async fn delete(&self, storage_path: &str) -> AppResult<()> {
        let key = Self::key(storage_path)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| s3_error(format!("Failed to delete object: {key}"), e))?;

        debug!(key, "Deleted object");
        Ok(())
    }

    async fn sign_url(
        &self,
        storage_path: &str,
        disposition: UrlDisposition,
        ttl: Duration,
    ) -> AppResult<String> {
        let key = Self::key(storage_path)?;
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| s3_error("Invalid presigning lifetime".to_string(), e))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_disposition(disposition.as_str())
            .presigned(presigning)
            .await
            .map_err(|e| s3_error(format!("Failed to presign object: {key}"), e))?;

        Ok(request.uri().to_string())
    }
}
