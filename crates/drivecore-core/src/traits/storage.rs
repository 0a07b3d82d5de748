//! Blob store adapter trait for pluggable byte storage backends.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// How a signed URL asks the client to present the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlDisposition {
    /// Render in the browser.
    Inline,
    /// Download as a file.
    Attachment,
}

impl UrlDisposition {
    /// Return the disposition as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// Durable, path-addressed byte storage.
///
/// The storage core never interprets blob contents; it only stores the
/// opaque `storage_path` handle returned by [`BlobStore::put`]. Paths are
/// exact keys: writing to an existing path replaces its bytes, which is how
/// content replacement keeps a file's `storage_path` stable.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "s3").
    fn provider_type(&self) -> &str;

    /// Store `data` under `path_hint` and return the storage path.
    async fn put(&self, data: Bytes, path_hint: &str) -> AppResult<String>;

    /// Read a blob into memory.
    async fn get(&self, storage_path: &str) -> AppResult<Bytes>;

    /// Delete a blob. Deleting a missing blob succeeds.
    async fn delete(&self, storage_path: &str) -> AppResult<()>;

    /// Produce a time-limited URL for direct client access.
    async fn sign_url(
        &self,
        storage_path: &str,
        disposition: UrlDisposition,
        ttl: Duration,
    ) -> AppResult<String>;
}
