//! # drivecore-storage
//!
//! Blob store adapters for DriveCore: a local filesystem store with signed
//! URLs, and an S3-compatible store behind the `s3` feature.

pub mod providers;
pub mod signer;

use std::sync::Arc;

use tracing::info;

use drivecore_core::config::StorageConfig;
use drivecore_core::error::AppError;
use drivecore_core::result::AppResult;
use drivecore_core::traits::BlobStore;

pub use providers::LocalBlobStore;
pub use signer::UrlSigner;

/// Build the configured blob store.
pub async fn build_blob_store(config: &StorageConfig) -> AppResult<Arc<dyn BlobStore>> {
    info!(provider = %config.provider, "Initializing blob store");
    match config.provider.as_str() {
        "local" => Ok(Arc::new(LocalBlobStore::new(&config.local).await?)),
        #[cfg(feature = "s3")]
        "s3" => Ok(Arc::new(providers::S3BlobStore::new(&config.s3).await?)),
        other => Err(AppError::configuration(format!(
            "Unsupported blob store provider: '{other}'"
        ))),
    }
}
