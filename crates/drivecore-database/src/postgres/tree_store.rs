//! Transactional [`TreeStore`] over PostgreSQL.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use drivecore_core::error::AppError;
use drivecore_core::result::AppResult;
use drivecore_core::types::PageRequest;
use drivecore_entity::ResourceRef;
use drivecore_entity::file::{CreateFile, File, ReplaceContent};
use drivecore_entity::folder::{CreateFolder, Folder};
use drivecore_entity::permission::{GrantPermission, Permission, ResourceType};
use drivecore_entity::share::{CreateShare, Share};
use drivecore_entity::storage::StorageUsage;
use drivecore_entity::user::{AuthenticatedUser, User};

use super::error::db_err;
use super::{
    FileRepository, FolderRepository, PermissionRepository, ShareRepository, UsageRepository,
    UserRepository,
};
use crate::store::{Children, Subtree, TrashListing, TreeStore};

/// Which descendant folders a subtree walk follows.
#[derive(Debug, Clone, Copy)]
enum WalkScope {
    /// Only folders that are not in the trash.
    Live,
    /// Every folder.
    All,
    /// Only folders trashed by the given delete event.
    DeletedAt(DateTime<Utc>),
}

/// PostgreSQL-backed tree store.
#[derive(Debug, Clone)]
pub struct PgTreeStore {
    pool: PgPool,
}

impl PgTreeStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn conn(&self) -> AppResult<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(db_err("Failed to acquire database connection"))
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to set isolation level"))?;
        Ok(tx)
    }
}

async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(db_err("Failed to commit transaction"))
}

/// Fail with `InvalidParent` unless `parent_id` is a live folder of `owner_id`.
///
/// The parent row stays locked until the transaction ends.
async fn require_live_parent(
    conn: &mut PgConnection,
    owner_id: Uuid,
    parent_id: Option<Uuid>,
) -> AppResult<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    match FolderRepository::lock_owned(conn, owner_id, parent_id).await? {
        Some(parent) if parent.is_live() => Ok(()),
        _ => Err(AppError::invalid_parent(format!(
            "Folder {parent_id} is not a live folder of this owner"
        ))),
    }
}

async fn ensure_folder_name_free(
    conn: &mut PgConnection,
    owner_id: Uuid,
    parent_id: Option<Uuid>,
    name: &str,
    exclude_id: Option<Uuid>,
) -> AppResult<()> {
    if FolderRepository::live_name_taken(conn, owner_id, parent_id, name, exclude_id).await? {
        return Err(AppError::duplicate_name(format!(
            "A folder named '{name}' already exists here"
        )));
    }
    Ok(())
}

async fn ensure_file_name_free(
    conn: &mut PgConnection,
    owner_id: Uuid,
    folder_id: Option<Uuid>,
    name: &str,
    exclude_id: Option<Uuid>,
) -> AppResult<()> {
    if FileRepository::live_name_taken(conn, owner_id, folder_id, name, exclude_id).await? {
        return Err(AppError::duplicate_name(format!(
            "A file named '{name}' already exists here"
        )));
    }
    Ok(())
}

/// `start` and its ancestors, nearest first.
async fn ancestor_chain(
    conn: &mut PgConnection,
    start: Uuid,
    max_depth: usize,
) -> AppResult<Vec<Folder>> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut cursor = Some(start);

    while let Some(id) = cursor {
        if !visited.insert(id) {
            return Err(AppError::corrupt_tree(format!(
                "Folder {id} appears twice in the ancestry of {start}"
            )));
        }
        if chain.len() >= max_depth {
            return Err(AppError::corrupt_tree(format!(
                "Ancestry of folder {start} exceeds {max_depth} levels"
            )));
        }
        let folder = FolderRepository::find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::corrupt_tree(format!("Folder {id} is missing")))?;
        cursor = folder.parent_id;
        chain.push(folder);
    }

    Ok(chain)
}

/// `root` followed by its descendant folders in breadth-first order.
async fn descendant_folders(
    conn: &mut PgConnection,
    owner_id: Uuid,
    root: Folder,
    max_depth: usize,
    scope: WalkScope,
) -> AppResult<Vec<Folder>> {
    let mut visited = HashSet::from([root.id]);
    let mut frontier = vec![root.id];
    let mut ordered = vec![root];
    let mut depth = 0usize;

    while !frontier.is_empty() {
        let children = match scope {
            WalkScope::Live => {
                FolderRepository::find_children_of(&mut *conn, owner_id, &frontier, true).await?
            }
            WalkScope::All => {
                FolderRepository::find_children_of(&mut *conn, owner_id, &frontier, false).await?
            }
            WalkScope::DeletedAt(at) => {
                FolderRepository::find_children_deleted_at(&mut *conn, owner_id, &frontier, at)
                    .await?
            }
        };
        depth += 1;
        if depth > max_depth && !children.is_empty() {
            return Err(AppError::corrupt_tree(format!(
                "Subtree exceeds {max_depth} levels"
            )));
        }

        frontier = Vec::with_capacity(children.len());
        for child in children {
            if !visited.insert(child.id) {
                return Err(AppError::corrupt_tree(format!(
                    "Folder {} is reachable twice in one subtree",
                    child.id
                )));
            }
            frontier.push(child.id);
            ordered.push(child);
        }
    }

    Ok(ordered)
}

#[async_trait]
impl TreeStore for PgTreeStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    /// The embedded migrations always create the trash columns, so this
    /// backend never needs the purge-on-delete fallback.
    async fn supports_soft_delete(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn upsert_user(&self, user: &AuthenticatedUser) -> AppResult<User> {
        let mut conn = self.conn().await?;
        UserRepository::upsert(&mut *conn, user).await
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let mut conn = self.conn().await?;
        UserRepository::find_by_id(&mut *conn, id).await
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let mut conn = self.conn().await?;
        UserRepository::find_by_email(&mut *conn, email).await
    }

    async fn find_folder(&self, id: Uuid) -> AppResult<Option<Folder>> {
        let mut conn = self.conn().await?;
        FolderRepository::find_by_id(&mut *conn, id).await
    }

    async fn find_file(&self, id: Uuid) -> AppResult<Option<File>> {
        let mut conn = self.conn().await?;
        FileRepository::find_by_id(&mut *conn, id).await
    }

    async fn list_children(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> AppResult<Children> {
        let mut conn = self.conn().await?;
        let folders = FolderRepository::find_live_children(&mut *conn, owner_id, parent_id).await?;
        let files = FileRepository::find_live_in_folder(&mut *conn, owner_id, parent_id).await?;
        Ok(Children { folders, files })
    }

    async fn folder_path(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        max_depth: usize,
    ) -> AppResult<Vec<Folder>> {
        let mut conn = self.conn().await?;
        match FolderRepository::find_by_id(&mut *conn, folder_id).await? {
            Some(folder) if folder.owner_id == owner_id => {}
            _ => return Err(AppError::not_found(format!("Folder {folder_id} not found"))),
        }

        let mut chain = ancestor_chain(&mut *conn, folder_id, max_depth).await?;
        if let Some(foreign) = chain.iter().find(|f| f.owner_id != owner_id) {
            return Err(AppError::corrupt_tree(format!(
                "Folder {} in the ancestry of {folder_id} belongs to another owner",
                foreign.id
            )));
        }
        chain.reverse();
        Ok(chain)
    }

    async fn list_trash(&self, owner_id: Uuid, page: &PageRequest) -> AppResult<TrashListing> {
        let mut conn = self.conn().await?;
        let files = FileRepository::find_trashed(&mut *conn, owner_id, page).await?;
        let folders = FolderRepository::find_trashed(&mut *conn, owner_id, page).await?;
        Ok(TrashListing { files, folders })
    }

    async fn collect_subtree(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        max_depth: usize,
    ) -> AppResult<Subtree> {
        let mut tx = self.begin().await?;
        let root = match FolderRepository::find_by_id(&mut *tx, folder_id).await? {
            Some(folder) if folder.owner_id == owner_id => folder,
            _ => return Err(AppError::not_found(format!("Folder {folder_id} not found"))),
        };

        let folders =
            descendant_folders(&mut *tx, owner_id, root, max_depth, WalkScope::All).await?;
        let ids: Vec<Uuid> = folders.iter().map(|f| f.id).collect();
        let files = FileRepository::find_in_folders(&mut *tx, owner_id, &ids).await?;
        commit(tx).await?;

        Ok(Subtree { folders, files })
    }

    async fn insert_folder(&self, data: &CreateFolder) -> AppResult<Folder> {
        let mut tx = self.begin().await?;
        require_live_parent(&mut *tx, data.owner_id, data.parent_id).await?;
        ensure_folder_name_free(&mut *tx, data.owner_id, data.parent_id, &data.name, None).await?;
        let folder = FolderRepository::insert(&mut *tx, data).await?;
        commit(tx).await?;

        debug!(folder_id = %folder.id, owner_id = %folder.owner_id, "Inserted folder");
        Ok(folder)
    }

    async fn insert_file(&self, data: &CreateFile) -> AppResult<File> {
        let mut tx = self.begin().await?;
        require_live_parent(&mut *tx, data.owner_id, data.folder_id).await?;
        ensure_file_name_free(&mut *tx, data.owner_id, data.folder_id, &data.name, None).await?;
        let file = FileRepository::insert(&mut *tx, data).await?;
        UsageRepository::recompute(&mut *tx, data.owner_id).await?;
        commit(tx).await?;

        debug!(file_id = %file.id, owner_id = %file.owner_id, "Inserted file");
        Ok(file)
    }

    async fn rename_folder(&self, owner_id: Uuid, id: Uuid, new_name: &str) -> AppResult<Folder> {
        let mut tx = self.begin().await?;
        let folder = match FolderRepository::lock_owned(&mut *tx, owner_id, id).await? {
            Some(folder) if folder.is_live() => folder,
            _ => return Err(AppError::not_found(format!("Folder {id} not found"))),
        };
        ensure_folder_name_free(&mut *tx, owner_id, folder.parent_id, new_name, Some(id)).await?;
        let renamed = FolderRepository::update_name(&mut *tx, id, new_name).await?;
        commit(tx).await?;
        Ok(renamed)
    }

    async fn rename_file(&self, owner_id: Uuid, id: Uuid, new_name: &str) -> AppResult<File> {
        let mut tx = self.begin().await?;
        let file = match FileRepository::lock_owned(&mut *tx, owner_id, id).await? {
            Some(file) if file.is_live() => file,
            _ => return Err(AppError::not_found(format!("File {id} not found"))),
        };
        ensure_file_name_free(&mut *tx, owner_id, file.folder_id, new_name, Some(id)).await?;
        let renamed = FileRepository::update_name(&mut *tx, id, new_name).await?;
        commit(tx).await?;
        Ok(renamed)
    }

    async fn move_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        new_parent_id: Option<Uuid>,
        max_depth: usize,
    ) -> AppResult<Folder> {
        let mut tx = self.begin().await?;
        let folder = match FolderRepository::lock_owned(&mut *tx, owner_id, id).await? {
            Some(folder) if folder.is_live() => folder,
            _ => return Err(AppError::not_found(format!("Folder {id} not found"))),
        };
        if new_parent_id == Some(id) {
            return Err(AppError::cycle("A folder cannot be moved into itself"));
        }
        require_live_parent(&mut *tx, owner_id, new_parent_id).await?;

        if let Some(parent_id) = new_parent_id {
            let ancestry = ancestor_chain(&mut *tx, parent_id, max_depth).await?;
            if ancestry.iter().any(|a| a.id == id) {
                return Err(AppError::cycle(format!(
                    "Folder {id} cannot be moved under its own descendant {parent_id}"
                )));
            }
        }

        if folder.parent_id == new_parent_id {
            commit(tx).await?;
            return Ok(folder);
        }

        ensure_folder_name_free(&mut *tx, owner_id, new_parent_id, &folder.name, Some(id)).await?;
        let moved = FolderRepository::update_parent(&mut *tx, id, new_parent_id).await?;
        commit(tx).await?;
        Ok(moved)
    }

    async fn move_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        new_folder_id: Option<Uuid>,
    ) -> AppResult<File> {
        let mut tx = self.begin().await?;
        let file = match FileRepository::lock_owned(&mut *tx, owner_id, id).await? {
            Some(file) if file.is_live() => file,
            _ => return Err(AppError::not_found(format!("File {id} not found"))),
        };
        require_live_parent(&mut *tx, owner_id, new_folder_id).await?;

        if file.folder_id == new_folder_id {
            commit(tx).await?;
            return Ok(file);
        }

        ensure_file_name_free(&mut *tx, owner_id, new_folder_id, &file.name, Some(id)).await?;
        let moved = FileRepository::update_folder(&mut *tx, id, new_folder_id).await?;
        commit(tx).await?;
        Ok(moved)
    }

    async fn replace_file_content(
        &self,
        owner_id: Uuid,
        id: Uuid,
        data: &ReplaceContent,
    ) -> AppResult<File> {
        let mut tx = self.begin().await?;
        match FileRepository::lock_owned(&mut *tx, owner_id, id).await? {
            Some(file) if file.is_live() => {}
            _ => return Err(AppError::not_found(format!("File {id} not found"))),
        }
        let file = FileRepository::update_content(&mut *tx, id, data).await?;
        UsageRepository::recompute(&mut *tx, owner_id).await?;
        commit(tx).await?;
        Ok(file)
    }

    async fn soft_delete_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<File> {
        let mut tx = self.begin().await?;
        match FileRepository::lock_owned(&mut *tx, owner_id, id).await? {
            Some(file) if file.is_live() => {}
            _ => return Err(AppError::not_found(format!("File {id} not found"))),
        }
        let file = FileRepository::mark_deleted(&mut *tx, id, deleted_at).await?;
        UsageRepository::recompute(&mut *tx, owner_id).await?;
        commit(tx).await?;
        Ok(file)
    }

    async fn soft_delete_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        deleted_at: DateTime<Utc>,
        max_depth: usize,
    ) -> AppResult<u64> {
        let mut tx = self.begin().await?;
        let root = match FolderRepository::lock_owned(&mut *tx, owner_id, id).await? {
            Some(folder) if folder.is_live() => folder,
            _ => return Err(AppError::not_found(format!("Folder {id} not found"))),
        };

        let folders =
            descendant_folders(&mut *tx, owner_id, root, max_depth, WalkScope::Live).await?;
        let ids: Vec<Uuid> = folders.iter().map(|f| f.id).collect();
        let marked_folders = FolderRepository::mark_deleted(&mut *tx, &ids, deleted_at).await?;
        let marked_files =
            FileRepository::mark_deleted_in_folders(&mut *tx, owner_id, &ids, deleted_at).await?;
        UsageRepository::recompute(&mut *tx, owner_id).await?;
        commit(tx).await?;

        debug!(
            folder_id = %id,
            folders = marked_folders,
            files = marked_files,
            "Trashed folder subtree"
        );
        Ok(marked_folders + marked_files)
    }

    async fn restore_file(&self, owner_id: Uuid, id: Uuid) -> AppResult<File> {
        let mut tx = self.begin().await?;
        let file = FileRepository::lock_owned(&mut *tx, owner_id, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        if file.is_live() {
            return Err(AppError::not_in_trash(format!("File {id} is not in the trash")));
        }
        if let Some(folder_id) = file.folder_id {
            match FolderRepository::find_by_id(&mut *tx, folder_id).await? {
                Some(parent) if parent.is_live() => {}
                _ => {
                    return Err(AppError::orphaned_parent(format!(
                        "Folder {folder_id} containing file {id} is in the trash"
                    )));
                }
            }
        }
        ensure_file_name_free(&mut *tx, owner_id, file.folder_id, &file.name, Some(id)).await?;

        let restored = FileRepository::mark_restored(&mut *tx, id).await?;
        UsageRepository::recompute(&mut *tx, owner_id).await?;
        commit(tx).await?;
        Ok(restored)
    }

    async fn restore_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        cascade: bool,
        max_depth: usize,
    ) -> AppResult<Folder> {
        let mut tx = self.begin().await?;
        let folder = FolderRepository::lock_owned(&mut *tx, owner_id, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;
        let Some(deleted_at) = folder.deleted_at.filter(|_| folder.is_deleted) else {
            return Err(AppError::not_in_trash(format!("Folder {id} is not in the trash")));
        };
        if let Some(parent_id) = folder.parent_id {
            match FolderRepository::find_by_id(&mut *tx, parent_id).await? {
                Some(parent) if parent.is_live() => {}
                _ => {
                    return Err(AppError::orphaned_parent(format!(
                        "Parent folder {parent_id} of folder {id} is in the trash"
                    )));
                }
            }
        }
        ensure_folder_name_free(&mut *tx, owner_id, folder.parent_id, &folder.name, Some(id))
            .await?;

        if cascade {
            let subtree = descendant_folders(
                &mut *tx,
                owner_id,
                folder,
                max_depth,
                WalkScope::DeletedAt(deleted_at),
            )
            .await?;
            let ids: Vec<Uuid> = subtree.iter().map(|f| f.id).collect();
            let folders = FolderRepository::mark_restored(&mut *tx, &ids).await?;
            let files =
                FileRepository::mark_restored_in_folders(&mut *tx, owner_id, &ids, deleted_at)
                    .await?;
            UsageRepository::recompute(&mut *tx, owner_id).await?;
            debug!(folder_id = %id, folders, files, "Restored folder subtree");
        } else {
            FolderRepository::mark_restored(&mut *tx, &[id]).await?;
        }

        let restored = FolderRepository::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;
        commit(tx).await?;
        Ok(restored)
    }

    async fn delete_file_row(&self, owner_id: Uuid, id: Uuid) -> AppResult<()> {
        let mut tx = self.begin().await?;
        if !FileRepository::delete(&mut *tx, owner_id, id).await? {
            return Err(AppError::not_found(format!("File {id} not found")));
        }
        PermissionRepository::delete_for_resources(&mut *tx, ResourceType::File, &[id]).await?;
        ShareRepository::delete_for_resources(&mut *tx, ResourceType::File, &[id]).await?;
        UsageRepository::recompute(&mut *tx, owner_id).await?;
        commit(tx).await
    }

    async fn delete_folder_rows(
        &self,
        owner_id: Uuid,
        ids_deepest_first: &[Uuid],
    ) -> AppResult<()> {
        let mut tx = self.begin().await?;
        PermissionRepository::delete_for_resources(
            &mut *tx,
            ResourceType::Folder,
            ids_deepest_first,
        )
        .await?;
        ShareRepository::delete_for_resources(&mut *tx, ResourceType::Folder, ids_deepest_first)
            .await?;
        for id in ids_deepest_first {
            if !FolderRepository::delete(&mut *tx, owner_id, *id).await? {
                return Err(AppError::not_found(format!("Folder {id} not found")));
            }
        }
        commit(tx).await
    }

    async fn recompute_usage(&self, owner_id: Uuid) -> AppResult<StorageUsage> {
        let mut conn = self.conn().await?;
        UsageRepository::recompute(&mut *conn, owner_id).await
    }

    async fn find_usage(&self, owner_id: Uuid) -> AppResult<Option<StorageUsage>> {
        let mut conn = self.conn().await?;
        UsageRepository::find(&mut *conn, owner_id).await
    }

    async fn upsert_permission(&self, data: &GrantPermission) -> AppResult<Permission> {
        let mut conn = self.conn().await?;
        PermissionRepository::upsert(&mut *conn, data).await
    }

    async fn find_permission(
        &self,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> AppResult<Option<Permission>> {
        let mut conn = self.conn().await?;
        PermissionRepository::find(&mut *conn, user_id, resource).await
    }

    async fn delete_permission(&self, user_id: Uuid, resource: ResourceRef) -> AppResult<bool> {
        let mut conn = self.conn().await?;
        PermissionRepository::delete(&mut *conn, user_id, resource).await
    }

    async fn list_permissions(&self, resource: ResourceRef) -> AppResult<Vec<Permission>> {
        let mut conn = self.conn().await?;
        PermissionRepository::find_by_resource(&mut *conn, resource).await
    }

    async fn list_permissions_for_user(&self, user_id: Uuid) -> AppResult<Vec<Permission>> {
        let mut conn = self.conn().await?;
        PermissionRepository::find_by_user(&mut *conn, user_id).await
    }

    async fn delete_expired_permissions(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut conn = self.conn().await?;
        PermissionRepository::delete_expired(&mut *conn, now).await
    }

    async fn insert_share(&self, data: &CreateShare) -> AppResult<Share> {
        let mut conn = self.conn().await?;
        ShareRepository::insert(&mut *conn, data).await
    }

    async fn find_share(&self, id: Uuid) -> AppResult<Option<Share>> {
        let mut conn = self.conn().await?;
        ShareRepository::find_by_id(&mut *conn, id).await
    }

    async fn find_share_by_token(&self, token: &str) -> AppResult<Option<Share>> {
        let mut conn = self.conn().await?;
        ShareRepository::find_by_token(&mut *conn, token).await
    }

    async fn deactivate_share(&self, id: Uuid) -> AppResult<bool> {
        let mut conn = self.conn().await?;
        ShareRepository::deactivate(&mut *conn, id).await
    }

    async fn list_shares(&self, resource: ResourceRef) -> AppResult<Vec<Share>> {
        let mut conn = self.conn().await?;
        ShareRepository::find_by_resource(&mut *conn, resource).await
    }

    async fn delete_expired_shares(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut conn = self.conn().await?;
        ShareRepository::delete_expired(&mut *conn, now).await
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    #[tokio::test]
    async fn test_reports_soft_delete_without_connecting() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://drive@127.0.0.1:1/unreachable")
            .unwrap();
        let store = PgTreeStore::new(pool);
        assert!(store.supports_soft_delete().await.unwrap());
        assert_eq!(store.backend(), "postgres");
    }
}
