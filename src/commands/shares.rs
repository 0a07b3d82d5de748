//! Share and grant maintenance commands.

use chrono::Utc;
use clap::{Args, Subcommand};

use drivecore_core::config::AppConfig;
use drivecore_core::error::AppError;

use crate::output;

/// Arguments for share commands
#[derive(Debug, Args)]
pub struct SharesArgs {
    /// Share subcommand
    #[command(subcommand)]
    pub command: SharesCommand,
}

/// Share subcommands
#[derive(Debug, Subcommand)]
pub enum SharesCommand {
    /// Delete expired grants and expired or revoked share tokens
    PurgeExpired,
}

/// Execute share commands
pub async fn execute(args: &SharesArgs, config: &AppConfig) -> Result<(), AppError> {
    let services = super::build_services(config).await?;

    match &args.command {
        SharesCommand::PurgeExpired => {
            let (permissions, shares) = services.shares.purge_expired(Utc::now()).await?;
            if permissions == 0 && shares == 0 {
                output::print_warning("Nothing to purge.");
            } else {
                output::print_success(&format!(
                    "Removed {permissions} grant(s) and {shares} share(s)."
                ));
            }
        }
    }
    Ok(())
}
