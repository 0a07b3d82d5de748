//! File repository.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use drivecore_core::result::AppResult;
use drivecore_core::types::{Page, PageRequest};
use drivecore_entity::file::{CreateFile, File, ReplaceContent};

use super::error::db_err;

/// Queries over the `files` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRepository;

impl FileRepository {
    /// Find a file by ID.
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(db_err("Failed to find file"))
    }

    /// Find an owner's file and lock its row.
    pub async fn lock_owned(
        conn: &mut PgConnection,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(conn)
            .await
            .map_err(db_err("Failed to lock file"))
    }

    /// Live files in a folder (or at the owner's root).
    pub async fn find_live_in_folder(
        conn: &mut PgConnection,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files \
             WHERE owner_id = $1 AND folder_id IS NOT DISTINCT FROM $2 AND NOT is_deleted \
             ORDER BY lower(name) ASC",
        )
        .bind(owner_id)
        .bind(folder_id)
        .fetch_all(conn)
        .await
        .map_err(db_err("Failed to list files"))
    }

    /// All files, in or out of the trash, inside any of `folder_ids`.
    pub async fn find_in_folders(
        conn: &mut PgConnection,
        owner_id: Uuid,
        folder_ids: &[Uuid],
    ) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE owner_id = $1 AND folder_id = ANY($2) ORDER BY id ASC",
        )
        .bind(owner_id)
        .bind(folder_ids)
        .fetch_all(conn)
        .await
        .map_err(db_err("Failed to list subtree files"))
    }

    /// Whether a live sibling file already uses `name` (case-insensitive).
    pub async fn live_name_taken(
        conn: &mut PgConnection,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
        name: &str,
        exclude_id: Option<Uuid>,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM files \
                WHERE owner_id = $1 AND folder_id IS NOT DISTINCT FROM $2 \
                  AND lower(name) = lower($3) AND NOT is_deleted \
                  AND ($4::uuid IS NULL OR id <> $4) \
             )",
        )
        .bind(owner_id)
        .bind(folder_id)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to check file name"))
    }

    /// Insert a file row.
    pub async fn insert(conn: &mut PgConnection, data: &CreateFile) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "INSERT INTO files (id, name, owner_id, folder_id, size, mime_type, storage_path) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(data.id)
        .bind(&data.name)
        .bind(data.owner_id)
        .bind(data.folder_id)
        .bind(data.size)
        .bind(&data.mime_type)
        .bind(&data.storage_path)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to create file"))
    }

    /// Set a file's name.
    pub async fn update_name(conn: &mut PgConnection, id: Uuid, name: &str) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to rename file"))
    }

    /// Set a file's folder.
    pub async fn update_folder(
        conn: &mut PgConnection,
        id: Uuid,
        folder_id: Option<Uuid>,
    ) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET folder_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(folder_id)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to move file"))
    }

    /// Point a file at new content and bump the version counter.
    pub async fn update_content(
        conn: &mut PgConnection,
        id: Uuid,
        data: &ReplaceContent,
    ) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET size = $2, mime_type = $3, storage_path = $4, \
             version = version + 1, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(data.size)
        .bind(&data.mime_type)
        .bind(&data.storage_path)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to update file content"))
    }

    /// Trash a single file.
    pub async fn mark_deleted(
        conn: &mut PgConnection,
        id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET is_deleted = TRUE, deleted_at = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(deleted_at)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to trash file"))
    }

    /// Trash every live file inside any of `folder_ids`.
    pub async fn mark_deleted_in_folders(
        conn: &mut PgConnection,
        owner_id: Uuid,
        folder_ids: &[Uuid],
        deleted_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE files SET is_deleted = TRUE, deleted_at = $3, updated_at = NOW() \
             WHERE owner_id = $1 AND folder_id = ANY($2) AND NOT is_deleted",
        )
        .bind(owner_id)
        .bind(folder_ids)
        .bind(deleted_at)
        .execute(conn)
        .await
        .map_err(db_err("Failed to trash subtree files"))?;
        Ok(result.rows_affected())
    }

    /// Restore a single file.
    pub async fn mark_restored(conn: &mut PgConnection, id: Uuid) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET is_deleted = FALSE, deleted_at = NULL, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to restore file"))
    }

    /// Restore files inside `folder_ids` that were trashed at exactly `deleted_at`.
    pub async fn mark_restored_in_folders(
        conn: &mut PgConnection,
        owner_id: Uuid,
        folder_ids: &[Uuid],
        deleted_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE files SET is_deleted = FALSE, deleted_at = NULL, updated_at = NOW() \
             WHERE owner_id = $1 AND folder_id = ANY($2) AND is_deleted AND deleted_at = $3",
        )
        .bind(owner_id)
        .bind(folder_ids)
        .bind(deleted_at)
        .execute(conn)
        .await
        .map_err(db_err("Failed to restore subtree files"))?;
        Ok(result.rows_affected())
    }

    /// Trashed files of an owner, most recent first.
    pub async fn find_trashed(
        conn: &mut PgConnection,
        owner_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<Page<File>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE owner_id = $1 AND is_deleted")
                .bind(owner_id)
                .fetch_one(&mut *conn)
                .await
                .map_err(db_err("Failed to count trashed files"))?;

        let items = sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE owner_id = $1 AND is_deleted \
             ORDER BY deleted_at DESC, id ASC LIMIT $2 OFFSET $3",
        )
        .bind(owner_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err("Failed to list trashed files"))?;

        Ok(Page::new(items, total as u64))
    }

    /// Delete a file row.
    pub async fn delete(conn: &mut PgConnection, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(conn)
            .await
            .map_err(db_err("Failed to delete file"))?;
        Ok(result.rows_affected() > 0)
    }
}
