//! Blob store configuration.

use serde::{Deserialize, Serialize};

/// Top-level blob store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Blob store backend: `"local"` or `"s3"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Local filesystem blob store configuration.
    #[serde(default)]
    pub local: LocalStorageConfig,
    /// S3-compatible blob store configuration.
    #[serde(default)]
    pub s3: S3StorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            local: LocalStorageConfig::default(),
            s3: S3StorageConfig::default(),
        }
    }
}

/// Local filesystem blob store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Root path for blob files.
    #[serde(default = "default_local_root")]
    pub root_path: String,
    /// Base URL under which signed blob URLs are served.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Secret mixed into URL signatures.
    #[serde(default = "default_signing_secret")]
    pub signing_secret: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root_path: default_local_root(),
            public_base_url: default_public_base_url(),
            signing_secret: default_signing_secret(),
        }
    }
}

/// S3-compatible object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S3StorageConfig {
    /// S3 endpoint URL (for non-AWS services like MinIO).
    #[serde(default)]
    pub endpoint: String,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// S3 bucket name.
    #[serde(default)]
    pub bucket: String,
    /// Access key ID.
    #[serde(default)]
    pub access_key: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_key: String,
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_local_root() -> String {
    "./data/blobs".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/blobs".to_string()
}

fn default_signing_secret() -> String {
    "change-me".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}
