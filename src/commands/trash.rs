//! Trash inspection and cleanup commands.

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use drivecore_core::config::AppConfig;
use drivecore_core::error::AppError;
use drivecore_core::types::PageRequest;
use drivecore_service::RequestContext;

use crate::output::{self, OutputFormat};

/// Arguments for trash commands
#[derive(Debug, Args)]
pub struct TrashArgs {
    /// Trash subcommand
    #[command(subcommand)]
    pub command: TrashCommand,
}

/// Trash subcommands
#[derive(Debug, Subcommand)]
pub enum TrashCommand {
    /// List a user's trashed files and folders
    List {
        /// User ID or email
        #[arg(short, long)]
        user: String,
        /// Page size
        #[arg(long, default_value_t = 50)]
        limit: u64,
        /// Page offset
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// Permanently delete everything in a user's trash
    Empty {
        /// User ID or email
        #[arg(short, long)]
        user: String,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// Trash display row
#[derive(Debug, Serialize, Tabled)]
struct TrashRow {
    /// Kind
    kind: &'static str,
    /// ID
    id: String,
    /// Name
    name: String,
    /// Size
    size: String,
    /// Deleted at
    deleted_at: String,
}

fn stamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
}

/// Execute trash commands
pub async fn execute(
    args: &TrashArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = super::build_services(config).await?;

    match &args.command {
        TrashCommand::List {
            user,
            limit,
            offset,
        } => {
            let user_id = super::resolve_user(&services, user).await?;
            let ctx = RequestContext::user(user_id);
            let listing = services
                .trash
                .list_trash(&ctx, &PageRequest::new(*limit, *offset))
                .await?;

            let mut rows: Vec<TrashRow> = listing
                .folders
                .items
                .iter()
                .map(|f| TrashRow {
                    kind: "folder",
                    id: f.id.to_string(),
                    name: f.name.clone(),
                    size: "-".to_string(),
                    deleted_at: stamp(f.deleted_at),
                })
                .collect();
            rows.extend(listing.files.items.iter().map(|f| TrashRow {
                kind: "file",
                id: f.id.to_string(),
                name: f.name.clone(),
                size: f.size.to_string(),
                deleted_at: stamp(f.deleted_at),
            }));

            output::print_list(&rows, format);
            if format == OutputFormat::Table {
                println!(
                    "{} folder(s), {} file(s) in trash",
                    listing.folders.total, listing.files.total
                );
            }
        }
        TrashCommand::Empty { user, force } => {
            let user_id = super::resolve_user(&services, user).await?;

            if !force {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Permanently delete everything in the trash of {user}? This cannot be undone"
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?;
                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let report = services
                .trash
                .empty_trash(&RequestContext::user(user_id))
                .await?;
            output::print_success(&format!(
                "Removed {} file(s) and {} folder(s).",
                report.files, report.folders
            ));
        }
    }
    Ok(())
}
