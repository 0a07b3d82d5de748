//! Folder tree inspection commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use drivecore_core::config::AppConfig;
use drivecore_core::error::AppError;
use drivecore_service::RequestContext;

use crate::output::{self, OutputFormat};

/// Arguments for tree commands
#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Tree subcommand
    #[command(subcommand)]
    pub command: TreeCommand,
}

/// Tree subcommands
#[derive(Debug, Subcommand)]
pub enum TreeCommand {
    /// List the live children of a folder, or of the user's root
    Ls {
        /// User ID or email
        #[arg(short, long)]
        user: String,
        /// Folder ID (omit for the root)
        folder: Option<Uuid>,
    },
    /// Print the path from the root to a folder
    Path {
        /// User ID or email
        #[arg(short, long)]
        user: String,
        /// Folder ID
        folder: Uuid,
    },
}

/// Tree entry display row
#[derive(Debug, Serialize, Tabled)]
struct EntryRow {
    /// Kind
    kind: &'static str,
    /// ID
    id: String,
    /// Name
    name: String,
    /// Size
    size: String,
    /// Updated
    updated: String,
}

/// Execute tree commands
pub async fn execute(
    args: &TreeArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = super::build_services(config).await?;

    match &args.command {
        TreeCommand::Ls { user, folder } => {
            let user_id = super::resolve_user(&services, user).await?;
            let children = services
                .folders
                .get_children(&RequestContext::user(user_id), *folder)
                .await?;

            let mut rows: Vec<EntryRow> = children
                .folders
                .iter()
                .map(|f| EntryRow {
                    kind: "folder",
                    id: f.id.to_string(),
                    name: f.name.clone(),
                    size: "-".to_string(),
                    updated: f.updated_at.to_rfc3339(),
                })
                .collect();
            rows.extend(children.files.iter().map(|f| EntryRow {
                kind: "file",
                id: f.id.to_string(),
                name: f.name.clone(),
                size: f.size.to_string(),
                updated: f.updated_at.to_rfc3339(),
            }));
            output::print_list(&rows, format);
        }
        TreeCommand::Path { user, folder } => {
            let user_id = super::resolve_user(&services, user).await?;
            let path = services
                .folders
                .get_path(&RequestContext::user(user_id), *folder)
                .await?;

            match format {
                OutputFormat::Table => {
                    let names: Vec<&str> = path.iter().map(|f| f.name.as_str()).collect();
                    println!("/{}", names.join("/"));
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&path)?);
                }
            }
        }
    }
    Ok(())
}
