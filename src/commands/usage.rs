//! Storage usage commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use drivecore_core::config::AppConfig;
use drivecore_core::error::AppError;
use drivecore_entity::storage::StorageUsage;

use crate::output::{self, OutputFormat};

/// Arguments for usage commands
#[derive(Debug, Args)]
pub struct UsageArgs {
    /// Usage subcommand
    #[command(subcommand)]
    pub command: UsageCommand,
}

/// Usage subcommands
#[derive(Debug, Subcommand)]
pub enum UsageCommand {
    /// Show the recorded usage of a user
    Show {
        /// User ID or email
        #[arg(short, long)]
        user: String,
    },
    /// Recompute a user's usage from their live files
    Recompute {
        /// User ID or email
        #[arg(short, long)]
        user: String,
    },
}

/// Usage display row
#[derive(Debug, Serialize, Tabled)]
struct UsageRow {
    /// User ID
    user_id: String,
    /// Total bytes
    total_size: i64,
    /// Human-readable size
    human: String,
    /// Live file count
    files: i64,
    /// Last computed
    calculated: String,
}

impl From<&StorageUsage> for UsageRow {
    fn from(usage: &StorageUsage) -> Self {
        Self {
            user_id: usage.user_id.to_string(),
            total_size: usage.total_size,
            human: usage.total_size_human(),
            files: usage.file_count,
            calculated: usage.last_calculated.to_rfc3339(),
        }
    }
}

/// Execute usage commands
pub async fn execute(
    args: &UsageArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = super::build_services(config).await?;

    match &args.command {
        UsageCommand::Show { user } => {
            let user_id = super::resolve_user(&services, user).await?;
            let usage = services.accounting.usage(user_id).await?;
            output::print_item(&UsageRow::from(&usage), format);
        }
        UsageCommand::Recompute { user } => {
            let user_id = super::resolve_user(&services, user).await?;
            let usage = services.accounting.recompute(user_id).await?;
            output::print_item(&UsageRow::from(&usage), format);
            output::print_success("Usage recomputed.");
        }
    }
    Ok(())
}
