//! CLI command definitions and dispatch.

pub mod migrate;
pub mod shares;
pub mod trash;
pub mod tree;
pub mod usage;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::PgPool;
use uuid::Uuid;

use drivecore_core::config::AppConfig;
use drivecore_core::error::AppError;
use drivecore_database::{PgTreeStore, TreeStore};
use drivecore_service::DriveServices;

use crate::output::OutputFormat;

/// DriveCore: hierarchical file storage administration
#[derive(Debug, Parser)]
#[command(name = "drivecore", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Storage usage reporting and repair
    Usage(usage::UsageArgs),
    /// Trash inspection and cleanup
    Trash(trash::TrashArgs),
    /// Share and grant maintenance
    Shares(shares::SharesArgs),
    /// Folder tree inspection
    Tree(tree::TreeArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, config).await,
            Commands::Usage(args) => usage::execute(args, config, self.format).await,
            Commands::Trash(args) => trash::execute(args, config, self.format).await,
            Commands::Shares(args) => shares::execute(args, config).await,
            Commands::Tree(args) => tree::execute(args, config, self.format).await,
        }
    }
}

/// Connect to the database
pub async fn connect(config: &AppConfig) -> Result<PgPool, AppError> {
    drivecore_database::connection::connect(&config.database).await
}

/// Build the service stack over PostgreSQL and the configured blob store
pub async fn build_services(config: &AppConfig) -> Result<DriveServices, AppError> {
    let pool = connect(config).await?;
    let store: Arc<dyn TreeStore> = Arc::new(PgTreeStore::new(pool));
    let blobs = drivecore_storage::build_blob_store(&config.storage).await?;
    Ok(DriveServices::new(config, store, blobs))
}

/// Resolve a `--user` argument given as a UUID or an email address
pub async fn resolve_user(services: &DriveServices, user: &str) -> Result<Uuid, AppError> {
    if let Ok(id) = Uuid::parse_str(user) {
        return Ok(services.users.get_user(id).await?.id);
    }
    Ok(services.users.find_by_email(user).await?.id)
}
