//! Folder creation, listing, renaming, and moving with access checks.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use drivecore_core::config::TreeConfig;
use drivecore_core::error::{AppError, ErrorKind};
use drivecore_core::result::AppResult;
use drivecore_database::{Children, TreeStore};
use drivecore_entity::{Resource, ResourceRef};
use drivecore_entity::folder::{CreateFolder, Folder};
use drivecore_entity::naming::validate_name;
use drivecore_entity::permission::Operation;

use crate::context::RequestContext;
use crate::permission::{AccessSource, PermissionEngine};

/// Manages the folder hierarchy.
#[derive(Debug, Clone)]
pub struct FolderService {
    /// Tree store.
    store: Arc<dyn TreeStore>,
    /// Permission engine.
    engine: Arc<PermissionEngine>,
    /// Depth and name limits.
    tree: TreeConfig,
}

impl FolderService {
    /// Creates a new folder service.
    pub fn new(store: Arc<dyn TreeStore>, engine: Arc<PermissionEngine>, tree: TreeConfig) -> Self {
        Self {
            store,
            engine,
            tree,
        }
    }

    /// Creates a folder owned by the caller.
    ///
    /// `parent_id` of `None` places the folder at the caller's root. A
    /// parent owned by someone else is rejected with `InvalidParent`.
    pub async fn create_folder(
        &self,
        ctx: &RequestContext,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> AppResult<Folder> {
        let owner_id = ctx.require_user()?;
        let name = validate_name(name, self.tree.max_name_length)?;

        let folder = self
            .store
            .insert_folder(&CreateFolder {
                owner_id,
                parent_id,
                name,
            })
            .await?;

        info!(
            user_id = %owner_id,
            folder_id = %folder.id,
            parent_id = ?folder.parent_id,
            "Folder created"
        );

        Ok(folder)
    }

    /// Gets a folder by ID.
    pub async fn get_folder(&self, ctx: &RequestContext, folder_id: Uuid) -> AppResult<Folder> {
        let (resource, _) = self
            .engine
            .authorize(ctx, ResourceRef::folder(folder_id), Operation::View)
            .await?;
        into_folder(resource)
    }

    /// Lists the live children of a folder, or of the caller's root.
    pub async fn get_children(
        &self,
        ctx: &RequestContext,
        folder_id: Option<Uuid>,
    ) -> AppResult<Children> {
        match folder_id {
            None => {
                let owner_id = ctx.require_user()?;
                self.store.list_children(owner_id, None).await
            }
            Some(id) => {
                let (resource, _) = self
                    .engine
                    .authorize(ctx, ResourceRef::folder(id), Operation::List)
                    .await?;
                self.store
                    .list_children(resource.owner_id(), Some(id))
                    .await
            }
        }
    }

    /// Renames a folder.
    pub async fn rename_folder(
        &self,
        ctx: &RequestContext,
        folder_id: Uuid,
        new_name: &str,
    ) -> AppResult<Folder> {
        let (resource, _) = self
            .engine
            .authorize(ctx, ResourceRef::folder(folder_id), Operation::Rename)
            .await?;
        let name = validate_name(new_name, self.tree.max_name_length)?;

        let folder = self
            .store
            .rename_folder(resource.owner_id(), folder_id, &name)
            .await?;

        info!(folder_id = %folder_id, "Folder renamed");
        Ok(folder)
    }

    /// Moves a folder under a new parent, or to the owner's root.
    ///
    /// Requires write access on the folder and on the destination.
    pub async fn move_folder(
        &self,
        ctx: &RequestContext,
        folder_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> AppResult<Folder> {
        let (resource, _) = self
            .engine
            .authorize(ctx, ResourceRef::folder(folder_id), Operation::Move)
            .await?;
        if let Some(parent_id) = new_parent_id {
            self.engine
                .authorize(ctx, ResourceRef::folder(parent_id), Operation::Move)
                .await?;
        }

        let folder = self
            .store
            .move_folder(
                resource.owner_id(),
                folder_id,
                new_parent_id,
                self.tree.max_depth,
            )
            .await?;

        info!(
            folder_id = %folder_id,
            new_parent_id = ?new_parent_id,
            "Folder moved"
        );
        Ok(folder)
    }

    /// The folders from the root down to `folder_id`, inclusive.
    ///
    /// Callers other than the owner get only the trailing run of folders
    /// they can view; the path is cut at the first ancestor they cannot.
    pub async fn get_path(&self, ctx: &RequestContext, folder_id: Uuid) -> AppResult<Vec<Folder>> {
        let (resource, access) = self
            .engine
            .authorize(ctx, ResourceRef::folder(folder_id), Operation::View)
            .await?;
        let path = self
            .store
            .folder_path(resource.owner_id(), folder_id, self.tree.max_depth)
            .await?;
        if access.source == AccessSource::Owner {
            return Ok(path);
        }

        let mut visible = Vec::with_capacity(path.len());
        for folder in path.into_iter().rev() {
            if folder.id != folder_id {
                let ancestor = Resource::Folder(folder.clone());
                let viewable = match self.engine.effective_access(ctx, &ancestor).await {
                    Ok(access) => access.is_some() && !ancestor.is_deleted(),
                    Err(e) if e.kind == ErrorKind::PermissionDenied => false,
                    Err(e) => return Err(e),
                };
                if !viewable {
                    break;
                }
            }
            visible.push(folder);
        }
        visible.reverse();
        Ok(visible)
    }
}

fn into_folder(resource: Resource) -> AppResult<Folder> {
    let id = resource.id();
    resource
        .into_folder()
        .ok_or_else(|| AppError::internal(format!("Resource {id} is not a folder")))
}
