//! Local filesystem blob store.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::fs;
use tracing::debug;

use drivecore_core::config::LocalStorageConfig;
use drivecore_core::error::{AppError, ErrorKind};
use drivecore_core::result::AppResult;
use drivecore_core::traits::{BlobStore, UrlDisposition};

use crate::signer::UrlSigner;

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    /// Root directory for all blobs.
    root: PathBuf,
    /// Base URL of the endpoint that serves blobs from `root`.
    public_base_url: String,
    signer: UrlSigner,
}

impl LocalBlobStore {
    /// Create a store from configuration, creating the root if needed.
    pub async fn new(config: &LocalStorageConfig) -> AppResult<Self> {
        let root = PathBuf::from(&config.root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::BlobStore,
                format!("Failed to create blob root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self {
            root,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            signer: UrlSigner::new(config.signing_secret.clone()),
        })
    }

    /// The signer used for blob URLs.
    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    /// Normalize a storage path, rejecting anything that escapes the root.
    fn clean(path: &str) -> AppResult<String> {
        let clean = path.trim_start_matches('/');
        let escapes = Path::new(clean)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if clean.is_empty() || escapes {
            return Err(AppError::validation(format!("Invalid storage path: '{path}'")));
        }
        Ok(clean.to_string())
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        Ok(self.root.join(Self::clean(path)?))
    }

    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::BlobStore,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn put(&self, data: Bytes, path_hint: &str) -> AppResult<String> {
        let storage_path = Self::clean(path_hint)?;
        let full_path = self.root.join(&storage_path);
        self.ensure_parent(&full_path).await?;

        fs::write(&full_path, &data).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::BlobStore,
                format!("Failed to write blob: {storage_path}"),
                e,
            )
        })?;

        debug!(path = %storage_path, bytes = data.len(), "Wrote blob");
        Ok(storage_path)
    }

    async fn get(&self, storage_path: &str) -> AppResult<Bytes> {
        let full_path = self.resolve(storage_path)?;
        let data = fs::read(&full_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::BlobStore,
                format!("Failed to read blob: {storage_path}"),
                e,
            )
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, storage_path: &str) -> AppResult<()> {
        let full_path = self.resolve(storage_path)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => {
                debug!(path = %storage_path, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::BlobStore,
                format!("Failed to delete blob: {storage_path}"),
                e,
            )),
        }
    }

    async fn sign_url(
        &self,
        storage_path: &str,
        disposition: UrlDisposition,
        ttl: Duration,
    ) -> AppResult<String> {
        let path = Self::clean(storage_path)?;
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| AppError::validation("URL lifetime is too long"))?;
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        let signature = self.signer.sign(&path, disposition, expires);

        Ok(format!(
            "{}/{}?disposition={}&expires={}&signature={}",
            self.public_base_url,
            path,
            disposition.as_str(),
            expires,
            signature
        ))
    }
}
