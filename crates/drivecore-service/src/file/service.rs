//! File CRUD and content operations with access checks.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use drivecore_core::config::{ShareConfig, TreeConfig};
use drivecore_core::error::AppError;
use drivecore_core::result::AppResult;
use drivecore_core::traits::{BlobStore, UrlDisposition};
use drivecore_database::TreeStore;
use drivecore_entity::file::{CreateFile, File, ReplaceContent};
use drivecore_entity::naming::validate_name;
use drivecore_entity::permission::Operation;
use drivecore_entity::{Resource, ResourceRef};

use crate::context::RequestContext;
use crate::permission::PermissionEngine;

/// MIME type recorded when the caller supplies none.
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Metadata for a file whose blob has already been written.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NewFile {
    /// Containing folder (None for the caller's root).
    pub folder_id: Option<Uuid>,
    /// File name.
    pub name: String,
    /// Content size in bytes.
    pub size: i64,
    /// Content type.
    pub mime_type: String,
    /// Blob handle returned by the blob store.
    pub storage_path: String,
}

/// A file's content together with its record.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// File record.
    pub file: File,
    /// Content bytes.
    pub data: Bytes,
}

/// Handles file records and their blobs.
#[derive(Debug, Clone)]
pub struct FileService {
    /// Tree store.
    store: Arc<dyn TreeStore>,
    /// Blob store.
    blobs: Arc<dyn BlobStore>,
    /// Permission engine.
    engine: Arc<PermissionEngine>,
    /// Name limits.
    tree: TreeConfig,
    /// Signed URL defaults.
    share: ShareConfig,
}

impl FileService {
    /// Creates a new file service.
    pub fn new(
        store: Arc<dyn TreeStore>,
        blobs: Arc<dyn BlobStore>,
        engine: Arc<PermissionEngine>,
        tree: TreeConfig,
        share: ShareConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            engine,
            tree,
            share,
        }
    }

    /// Records a file whose content is already in the blob store.
    pub async fn create_file(&self, ctx: &RequestContext, req: NewFile) -> AppResult<File> {
        let owner_id = ctx.require_user()?;
        let name = validate_name(&req.name, self.tree.max_name_length)?;
        if req.size < 0 {
            return Err(AppError::validation("File size must not be negative"));
        }
        if req.storage_path.trim().is_empty() {
            return Err(AppError::validation("Storage path must not be empty"));
        }

        let file = self
            .store
            .insert_file(&CreateFile {
                id: Uuid::new_v4(),
                owner_id,
                folder_id: req.folder_id,
                name,
                size: req.size,
                mime_type: mime_or_default(req.mime_type),
                storage_path: req.storage_path,
            })
            .await?;

        info!(
            user_id = %owner_id,
            file_id = %file.id,
            size = file.size,
            "File created"
        );
        Ok(file)
    }

    /// Writes `data` to the blob store and records the file.
    ///
    /// If the record cannot be inserted the blob is removed again.
    pub async fn upload_file(
        &self,
        ctx: &RequestContext,
        folder_id: Option<Uuid>,
        name: &str,
        mime_type: &str,
        data: Bytes,
    ) -> AppResult<File> {
        let owner_id = ctx.require_user()?;
        let name = validate_name(name, self.tree.max_name_length)?;
        let size = content_size(&data)?;

        let id = Uuid::new_v4();
        let storage_path = self
            .blobs
            .put(data, &format!("{owner_id}/{id}"))
            .await?;

        let record = CreateFile {
            id,
            owner_id,
            folder_id,
            name,
            size,
            mime_type: mime_or_default(mime_type.to_string()),
            storage_path: storage_path.clone(),
        };

        match self.store.insert_file(&record).await {
            Ok(file) => {
                info!(
                    user_id = %owner_id,
                    file_id = %file.id,
                    size = file.size,
                    "File uploaded"
                );
                Ok(file)
            }
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&storage_path).await {
                    warn!(
                        path = %storage_path,
                        error = %cleanup,
                        "Failed to remove blob after rejected upload"
                    );
                }
                Err(e)
            }
        }
    }

    /// Gets a file by ID.
    pub async fn get_file(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let (resource, _) = self
            .engine
            .authorize(ctx, ResourceRef::file(file_id), Operation::View)
            .await?;
        into_file(resource)
    }

    /// Replaces a file's content, keeping its ID.
    ///
    /// The new bytes go to a fresh blob; the record is swapped onto it in
    /// one store update, and the previous blob is deleted afterwards. If
    /// the update fails the file keeps its old content.
    pub async fn replace_content(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        mime_type: &str,
        data: Bytes,
    ) -> AppResult<File> {
        let (resource, _) = self
            .engine
            .authorize(ctx, ResourceRef::file(file_id), Operation::UploadVersion)
            .await?;
        let current = into_file(resource)?;
        let size = content_size(&data)?;

        let storage_path = self
            .blobs
            .put(
                data,
                &format!("{}/{}.v{}", current.owner_id, file_id, current.version + 1),
            )
            .await?;

        let updated = self
            .store
            .replace_file_content(
                current.owner_id,
                file_id,
                &ReplaceContent {
                    size,
                    mime_type: mime_or_default(mime_type.to_string()),
                    storage_path: storage_path.clone(),
                },
            )
            .await;

        let file = match updated {
            Ok(file) => file,
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&storage_path).await {
                    warn!(
                        path = %storage_path,
                        error = %cleanup,
                        "Failed to remove blob of rejected content replacement"
                    );
                }
                return Err(e);
            }
        };

        if current.storage_path != storage_path {
            if let Err(e) = self.blobs.delete(&current.storage_path).await {
                warn!(
                    file_id = %file_id,
                    path = %current.storage_path,
                    error = %e,
                    "Failed to remove superseded blob"
                );
            }
        }

        info!(
            file_id = %file_id,
            version = file.version,
            size = file.size,
            "File content replaced"
        );
        Ok(file)
    }

    /// Reads a file's content.
    pub async fn read_content(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
    ) -> AppResult<DownloadResult> {
        let (resource, _) = self
            .engine
            .authorize(ctx, ResourceRef::file(file_id), Operation::Download)
            .await?;
        let file = into_file(resource)?;
        let data = self.blobs.get(&file.storage_path).await?;
        Ok(DownloadResult { file, data })
    }

    /// Issues a time-limited URL for the file's blob.
    ///
    /// `ttl` defaults to the configured signed URL lifetime.
    pub async fn download_url(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        disposition: UrlDisposition,
        ttl: Option<Duration>,
    ) -> AppResult<String> {
        let (resource, _) = self
            .engine
            .authorize(ctx, ResourceRef::file(file_id), Operation::Download)
            .await?;
        let file = into_file(resource)?;
        let ttl =
            ttl.unwrap_or_else(|| Duration::from_secs(self.share.default_url_ttl_seconds));
        self.blobs
            .sign_url(&file.storage_path, disposition, ttl)
            .await
    }

    /// Renames a file.
    pub async fn rename_file(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        new_name: &str,
    ) -> AppResult<File> {
        let (resource, _) = self
            .engine
            .authorize(ctx, ResourceRef::file(file_id), Operation::Rename)
            .await?;
        let name = validate_name(new_name, self.tree.max_name_length)?;

        let file = self
            .store
            .rename_file(resource.owner_id(), file_id, &name)
            .await?;
        info!(file_id = %file_id, "File renamed");
        Ok(file)
    }

    /// Moves a file to another folder, or to the owner's root.
    ///
    /// Requires write access on the file and on the destination.
    pub async fn move_file(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        new_folder_id: Option<Uuid>,
    ) -> AppResult<File> {
        let (resource, _) = self
            .engine
            .authorize(ctx, ResourceRef::file(file_id), Operation::Move)
            .await?;
        if let Some(folder_id) = new_folder_id {
            self.engine
                .authorize(ctx, ResourceRef::folder(folder_id), Operation::Move)
                .await?;
        }

        let file = self
            .store
            .move_file(resource.owner_id(), file_id, new_folder_id)
            .await?;
        info!(
            file_id = %file_id,
            new_folder_id = ?new_folder_id,
            "File moved"
        );
        Ok(file)
    }
}

fn into_file(resource: Resource) -> AppResult<File> {
    let id = resource.id();
    resource
        .into_file()
        .ok_or_else(|| AppError::internal(format!("Resource {id} is not a file")))
}

fn content_size(data: &Bytes) -> AppResult<i64> {
    i64::try_from(data.len()).map_err(|_| AppError::validation("Content is too large"))
}

fn mime_or_default(mime_type: String) -> String {
    let trimmed = mime_type.trim();
    if trimmed.is_empty() {
        DEFAULT_MIME_TYPE.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_default() {
        assert_eq!(mime_or_default(String::new()), DEFAULT_MIME_TYPE);
        assert_eq!(mime_or_default(" text/plain ".into()), "text/plain");
    }
}
