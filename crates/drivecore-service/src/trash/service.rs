//! Trash lifecycle management.
//!
//! Soft deletes stamp a resource, and for folders every live descendant,
//! with one `deleted_at` instant. Permanent deletion removes blobs first
//! and rows second: a row is only removed once its blob is gone, so a
//! failed purge leaves the record in the trash where it can be retried.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use drivecore_core::config::{TrashConfig, TreeConfig};
use drivecore_core::error::{AppError, ErrorKind};
use drivecore_core::result::AppResult;
use drivecore_core::traits::BlobStore;
use drivecore_core::types::PageRequest;
use drivecore_database::{TrashListing, TreeStore};
use drivecore_entity::file::File;
use drivecore_entity::folder::Folder;
use drivecore_entity::permission::Operation;
use drivecore_entity::{Resource, ResourceRef};

use crate::context::RequestContext;
use crate::permission::PermissionEngine;

/// Page size used when walking an owner's whole trash.
const TRASH_SCAN_PAGE: u64 = 500;

/// What a delete request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Records were moved into the trash.
    Trashed {
        /// Number of records marked.
        records: u64,
    },
    /// The store has no trash columns; the resource was purged instead.
    Purged(PurgeReport),
}

/// Counts of records removed by a purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// File rows removed (and their blobs).
    pub files: u64,
    /// Folder rows removed.
    pub folders: u64,
}

impl PurgeReport {
    fn add(&mut self, other: PurgeReport) {
        self.files += other.files;
        self.folders += other.folders;
    }
}

/// Manages the trash.
#[derive(Debug, Clone)]
pub struct TrashService {
    /// Tree store.
    store: Arc<dyn TreeStore>,
    /// Blob store.
    blobs: Arc<dyn BlobStore>,
    /// Permission engine.
    engine: Arc<PermissionEngine>,
    /// Traversal bound.
    tree: TreeConfig,
    /// Restore and purge settings.
    trash: TrashConfig,
}

impl TrashService {
    /// Creates a new trash service.
    pub fn new(
        store: Arc<dyn TreeStore>,
        blobs: Arc<dyn BlobStore>,
        engine: Arc<PermissionEngine>,
        tree: TreeConfig,
        trash: TrashConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            engine,
            tree,
            trash,
        }
    }

    /// Moves a resource into the trash.
    ///
    /// Against a store without trash support the resource is purged
    /// instead and a warning is logged.
    pub async fn soft_delete(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
    ) -> AppResult<DeleteOutcome> {
        let (resource, _) = self
            .engine
            .authorize(ctx, target, Operation::Delete)
            .await?;

        if !self.store.supports_soft_delete().await? {
            warn!(
                resource_id = %target.id,
                resource_type = %target.resource_type,
                backend = self.store.backend(),
                "Store has no trash support, deleting permanently"
            );
            let report = self.purge_resource(&resource).await?;
            return Ok(DeleteOutcome::Purged(report));
        }

        let deleted_at = Utc::now();
        let records = match &resource {
            Resource::File(file) => {
                self.store
                    .soft_delete_file(file.owner_id, file.id, deleted_at)
                    .await?;
                1
            }
            Resource::Folder(folder) => {
                self.store
                    .soft_delete_folder(folder.owner_id, folder.id, deleted_at, self.tree.max_depth)
                    .await?
            }
        };

        info!(
            resource_id = %target.id,
            resource_type = %target.resource_type,
            records,
            "Moved to trash"
        );
        Ok(DeleteOutcome::Trashed { records })
    }

    /// Takes a resource out of the trash.
    ///
    /// Folder restores bring back descendants trashed by the same delete
    /// only when `trash.cascade_restore` is enabled.
    pub async fn restore(&self, ctx: &RequestContext, target: ResourceRef) -> AppResult<Resource> {
        let (resource, _) = self
            .engine
            .authorize(ctx, target, Operation::Restore)
            .await?;

        let restored = match resource {
            Resource::File(file) => Resource::File(
                self.store.restore_file(file.owner_id, file.id).await?,
            ),
            Resource::Folder(folder) => Resource::Folder(
                self.store
                    .restore_folder(
                        folder.owner_id,
                        folder.id,
                        self.trash.cascade_restore,
                        self.tree.max_depth,
                    )
                    .await?,
            ),
        };

        info!(
            resource_id = %target.id,
            resource_type = %target.resource_type,
            cascade = self.trash.cascade_restore,
            "Restored from trash"
        );
        Ok(restored)
    }

    /// Irreversibly removes a resource, its descendants, and their blobs.
    pub async fn permanently_delete(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
    ) -> AppResult<PurgeReport> {
        let (resource, _) = self
            .engine
            .authorize(ctx, target, Operation::Purge)
            .await?;
        let report = self.purge_resource(&resource).await?;

        info!(
            resource_id = %target.id,
            resource_type = %target.resource_type,
            files = report.files,
            folders = report.folders,
            "Permanently deleted"
        );
        Ok(report)
    }

    /// Lists the caller's trash.
    pub async fn list_trash(
        &self,
        ctx: &RequestContext,
        page: &PageRequest,
    ) -> AppResult<TrashListing> {
        let owner_id = ctx.require_user()?;
        self.store.list_trash(owner_id, page).await
    }

    /// Purges everything in the caller's trash.
    pub async fn empty_trash(&self, ctx: &RequestContext) -> AppResult<PurgeReport> {
        let owner_id = ctx.require_user()?;
        let report = self.empty_trash_for(owner_id).await?;
        info!(
            user_id = %owner_id,
            files = report.files,
            folders = report.folders,
            "Trash emptied"
        );
        Ok(report)
    }

    /// Purges everything in an owner's trash without a request context.
    ///
    /// Used by maintenance commands.
    pub async fn empty_trash_for(&self, owner_id: Uuid) -> AppResult<PurgeReport> {
        let (folders, files) = self.scan_trash(owner_id).await?;
        let trashed_ids: HashSet<Uuid> = folders.iter().map(|f| f.id).collect();

        let mut report = PurgeReport::default();

        // Top-level trashed folders take their trashed descendants with them.
        for folder in folders
            .iter()
            .filter(|f| f.parent_id.is_none_or(|p| !trashed_ids.contains(&p)))
        {
            report.add(self.purge_folder(folder).await?);
        }

        for file in files {
            // Files inside purged folders are already gone.
            if self.store.find_file(file.id).await?.is_none() {
                continue;
            }
            report.add(self.purge_file(&file).await?);
        }

        Ok(report)
    }

    async fn scan_trash(&self, owner_id: Uuid) -> AppResult<(Vec<Folder>, Vec<File>)> {
        let mut folders = Vec::new();
        let mut files = Vec::new();
        let mut offset = 0;

        loop {
            let listing = self
                .store
                .list_trash(owner_id, &PageRequest::new(TRASH_SCAN_PAGE, offset))
                .await?;
            let fetched = listing.folders.items.len().max(listing.files.items.len());
            folders.extend(listing.folders.items);
            files.extend(listing.files.items);

            if fetched < TRASH_SCAN_PAGE as usize {
                break;
            }
            offset += TRASH_SCAN_PAGE;
        }

        Ok((folders, files))
    }

    async fn purge_resource(&self, resource: &Resource) -> AppResult<PurgeReport> {
        match resource {
            Resource::File(file) => self.purge_file(file).await,
            Resource::Folder(folder) => self.purge_folder(folder).await,
        }
    }

    async fn purge_folder(&self, folder: &Folder) -> AppResult<PurgeReport> {
        let subtree = self
            .store
            .collect_subtree(folder.owner_id, folder.id, self.tree.max_depth)
            .await?;

        let mut report = PurgeReport::default();
        for file in &subtree.files {
            report.add(self.purge_file(file).await?);
        }

        let ids = subtree.folder_ids_deepest_first();
        self.store
            .delete_folder_rows(folder.owner_id, &ids)
            .await?;
        report.folders = ids.len() as u64;
        Ok(report)
    }

    async fn purge_file(&self, file: &File) -> AppResult<PurgeReport> {
        self.delete_blob(&file.storage_path).await?;
        self.store.delete_file_row(file.owner_id, file.id).await?;
        Ok(PurgeReport {
            files: 1,
            folders: 0,
        })
    }

    /// Deletes a blob with a per-attempt timeout and linear backoff.
    async fn delete_blob(&self, storage_path: &str) -> AppResult<()> {
        let attempts = self.trash.blob_delete_attempts.max(1);
        let timeout = Duration::from_secs(self.trash.blob_delete_timeout_seconds);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let error = match tokio::time::timeout(timeout, self.blobs.delete(storage_path)).await
            {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => e,
                Err(_) => AppError::blob_store(format!(
                    "Blob delete timed out after {}s",
                    timeout.as_secs()
                )),
            };

            warn!(
                path = %storage_path,
                attempt,
                attempts,
                error = %error,
                "Blob delete failed"
            );
            last_error = Some(error);

            if attempt < attempts {
                let backoff = self.trash.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        let message = format!("Failed to delete blob {storage_path} after {attempts} attempts");
        let error = match last_error {
            Some(source) => AppError::with_source(ErrorKind::BlobStore, message, source),
            None => AppError::blob_store(message),
        };
        Err(error.retryable())
    }
}
