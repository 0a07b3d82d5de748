//! Folder repository.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use drivecore_core::result::AppResult;
use drivecore_core::types::{Page, PageRequest};
use drivecore_entity::folder::{CreateFolder, Folder};

use super::error::db_err;

/// Queries over the `folders` table.
///
/// Every method runs on a caller-supplied connection so that it can take
/// part in the surrounding transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct FolderRepository;

impl FolderRepository {
    /// Find a folder by ID.
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(db_err("Failed to find folder"))
    }

    /// Find an owner's folder and lock its row for the rest of the transaction.
    pub async fn lock_owned(
        conn: &mut PgConnection,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(conn)
        .await
        .map_err(db_err("Failed to lock folder"))
    }

    /// Live child folders of a parent.
    pub async fn find_live_children(
        conn: &mut PgConnection,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders \
             WHERE owner_id = $1 AND parent_id IS NOT DISTINCT FROM $2 AND NOT is_deleted \
             ORDER BY lower(name) ASC",
        )
        .bind(owner_id)
        .bind(parent_id)
        .fetch_all(conn)
        .await
        .map_err(db_err("Failed to list child folders"))
    }

    /// Child folders of any of `parent_ids`, optionally limited to live rows.
    pub async fn find_children_of(
        conn: &mut PgConnection,
        owner_id: Uuid,
        parent_ids: &[Uuid],
        live_only: bool,
    ) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders \
             WHERE owner_id = $1 AND parent_id = ANY($2) AND (NOT $3 OR NOT is_deleted) \
             ORDER BY lower(name) ASC",
        )
        .bind(owner_id)
        .bind(parent_ids)
        .bind(live_only)
        .fetch_all(conn)
        .await
        .map_err(db_err("Failed to list descendant folders"))
    }

    /// Child folders of any of `parent_ids` trashed at exactly `deleted_at`.
    pub async fn find_children_deleted_at(
        conn: &mut PgConnection,
        owner_id: Uuid,
        parent_ids: &[Uuid],
        deleted_at: DateTime<Utc>,
    ) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders \
             WHERE owner_id = $1 AND parent_id = ANY($2) AND is_deleted AND deleted_at = $3",
        )
        .bind(owner_id)
        .bind(parent_ids)
        .bind(deleted_at)
        .fetch_all(conn)
        .await
        .map_err(db_err("Failed to list trashed descendant folders"))
    }

    /// Whether a live sibling folder already uses `name` (case-insensitive).
    pub async fn live_name_taken(
        conn: &mut PgConnection,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
        exclude_id: Option<Uuid>,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM folders \
                WHERE owner_id = $1 AND parent_id IS NOT DISTINCT FROM $2 \
                  AND lower(name) = lower($3) AND NOT is_deleted \
                  AND ($4::uuid IS NULL OR id <> $4) \
             )",
        )
        .bind(owner_id)
        .bind(parent_id)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to check folder name"))
    }

    /// Insert a folder row.
    pub async fn insert(conn: &mut PgConnection, data: &CreateFolder) -> AppResult<Folder> {
        sqlx::query_as::<_, Folder>(
            "INSERT INTO folders (name, owner_id, parent_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&data.name)
        .bind(data.owner_id)
        .bind(data.parent_id)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to create folder"))
    }

    /// Set a folder's name.
    pub async fn update_name(conn: &mut PgConnection, id: Uuid, name: &str) -> AppResult<Folder> {
        sqlx::query_as::<_, Folder>(
            "UPDATE folders SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to rename folder"))
    }

    /// Set a folder's parent.
    pub async fn update_parent(
        conn: &mut PgConnection,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> AppResult<Folder> {
        sqlx::query_as::<_, Folder>(
            "UPDATE folders SET parent_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(parent_id)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to move folder"))
    }

    /// Mark live folders as trashed.
    pub async fn mark_deleted(
        conn: &mut PgConnection,
        ids: &[Uuid],
        deleted_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE folders SET is_deleted = TRUE, deleted_at = $2, updated_at = NOW() \
             WHERE id = ANY($1) AND NOT is_deleted",
        )
        .bind(ids)
        .bind(deleted_at)
        .execute(conn)
        .await
        .map_err(db_err("Failed to trash folders"))?;
        Ok(result.rows_affected())
    }

    /// Take folders out of the trash.
    pub async fn mark_restored(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE folders SET is_deleted = FALSE, deleted_at = NULL, updated_at = NOW() \
             WHERE id = ANY($1) AND is_deleted",
        )
        .bind(ids)
        .execute(conn)
        .await
        .map_err(db_err("Failed to restore folders"))?;
        Ok(result.rows_affected())
    }

    /// Trashed folders of an owner, most recent first.
    pub async fn find_trashed(
        conn: &mut PgConnection,
        owner_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<Page<Folder>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM folders WHERE owner_id = $1 AND is_deleted",
        )
        .bind(owner_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err("Failed to count trashed folders"))?;

        let items = sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE owner_id = $1 AND is_deleted \
             ORDER BY deleted_at DESC, id ASC LIMIT $2 OFFSET $3",
        )
        .bind(owner_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err("Failed to list trashed folders"))?;

        Ok(Page::new(items, total as u64))
    }

    /// Delete a single folder row.
    pub async fn delete(conn: &mut PgConnection, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(conn)
            .await
            .map_err(db_err("Failed to delete folder"))?;
        Ok(result.rows_affected() > 0)
    }
}
