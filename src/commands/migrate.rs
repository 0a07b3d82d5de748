//! Database migration commands.

use clap::{Args, Subcommand};

use drivecore_core::config::AppConfig;
use drivecore_core::error::AppError;
use drivecore_database::connection::describe_target;

use crate::output;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    match &args.command {
        MigrateCommand::Run => {
            println!(
                "Running migrations against {}...",
                describe_target(&config.database.url)?
            );
            let pool = super::connect(config).await?;
            drivecore_database::migration::run_migrations(&pool).await?;
            pool.close().await;
            output::print_success("All migrations applied successfully.");
        }
    }
    Ok(())
}
