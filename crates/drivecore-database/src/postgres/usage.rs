//! Storage usage repository.

use sqlx::PgConnection;
use uuid::Uuid;

use drivecore_core::result::AppResult;
use drivecore_entity::storage::StorageUsage;

use super::error::db_err;

/// Queries over the `storage_usage` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageRepository;

impl UsageRepository {
    /// Recompute an owner's totals from their live files and persist them.
    ///
    /// Idempotent: running it twice yields the same row.
    pub async fn recompute(conn: &mut PgConnection, owner_id: Uuid) -> AppResult<StorageUsage> {
        sqlx::query_as::<_, StorageUsage>(
            "INSERT INTO storage_usage (user_id, total_size, file_count, last_calculated) \
             SELECT $1, COALESCE(SUM(size), 0)::BIGINT, COUNT(*)::BIGINT, NOW() \
             FROM files WHERE owner_id = $1 AND NOT is_deleted \
             ON CONFLICT (user_id) DO UPDATE SET \
                total_size = EXCLUDED.total_size, \
                file_count = EXCLUDED.file_count, \
                last_calculated = EXCLUDED.last_calculated \
             RETURNING *",
        )
        .bind(owner_id)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to recompute storage usage"))
    }

    /// Read an owner's usage row.
    pub async fn find(conn: &mut PgConnection, owner_id: Uuid) -> AppResult<Option<StorageUsage>> {
        sqlx::query_as::<_, StorageUsage>("SELECT * FROM storage_usage WHERE user_id = $1")
            .bind(owner_id)
            .fetch_optional(conn)
            .await
            .map_err(db_err("Failed to find storage usage"))
    }
}
