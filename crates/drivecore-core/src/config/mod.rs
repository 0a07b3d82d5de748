//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod logging;
pub mod share;
pub mod storage;
pub mod tree;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::share::ShareConfig;
pub use self::storage::{LocalStorageConfig, S3StorageConfig, StorageConfig};
pub use self::tree::{TrashConfig, TreeConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (base file + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Blob store settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Tree traversal and naming limits.
    #[serde(default)]
    pub tree: TreeConfig,
    /// Trash behaviour.
    #[serde(default)]
    pub trash: TrashConfig,
    /// Share token settings.
    #[serde(default)]
    pub share: ShareConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the base configuration at `config_path` with an optional
    /// `config/{env}.toml` overlay and environment variables prefixed with
    /// `DRIVECORE__` (for example `DRIVECORE__DATABASE__URL`).
    pub fn load(config_path: &str, env: Option<&str>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false));

        if let Some(env) = env {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{env}")).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("DRIVECORE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject configurations that would weaken tree or token invariants.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.tree.max_depth == 0 {
            return Err(AppError::configuration("tree.max_depth must be positive"));
        }
        if self.share.token_bytes < share::MIN_TOKEN_BYTES {
            return Err(AppError::configuration(format!(
                "share.token_bytes must be at least {}",
                share::MIN_TOKEN_BYTES
            )));
        }
        if self.trash.blob_delete_attempts == 0 {
            return Err(AppError::configuration(
                "trash.blob_delete_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}
