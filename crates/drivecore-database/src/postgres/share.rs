//! Share repository.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use drivecore_core::result::AppResult;
use drivecore_entity::ResourceRef;
use drivecore_entity::permission::ResourceType;
use drivecore_entity::share::{CreateShare, Share};

use super::error::db_err;

/// Queries over the `shares` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareRepository;

impl ShareRepository {
    /// Insert a share.
    pub async fn insert(conn: &mut PgConnection, data: &CreateShare) -> AppResult<Share> {
        sqlx::query_as::<_, Share>(
            "INSERT INTO shares (resource_id, resource_type, token, access_level, password_hash, expires_at, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(data.resource_id)
        .bind(data.resource_type)
        .bind(&data.token)
        .bind(data.access_level)
        .bind(&data.password_hash)
        .bind(data.expires_at)
        .bind(data.created_by)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to create share"))
    }

    /// Find a share by ID.
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Share>> {
        sqlx::query_as::<_, Share>("SELECT * FROM shares WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(db_err("Failed to find share"))
    }

    /// Find a share by token.
    pub async fn find_by_token(conn: &mut PgConnection, token: &str) -> AppResult<Option<Share>> {
        sqlx::query_as::<_, Share>("SELECT * FROM shares WHERE token = $1")
            .bind(token)
            .fetch_optional(conn)
            .await
            .map_err(db_err("Failed to find share by token"))
    }

    /// Deactivate a share. Returns false if it was already inactive.
    pub async fn deactivate(conn: &mut PgConnection, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("UPDATE shares SET is_active = FALSE WHERE id = $1 AND is_active")
            .bind(id)
            .execute(conn)
            .await
            .map_err(db_err("Failed to revoke share"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Shares on a resource, newest first.
    pub async fn find_by_resource(
        conn: &mut PgConnection,
        resource: ResourceRef,
    ) -> AppResult<Vec<Share>> {
        sqlx::query_as::<_, Share>(
            "SELECT * FROM shares WHERE resource_id = $1 AND resource_type = $2 \
             ORDER BY created_at DESC",
        )
        .bind(resource.id)
        .bind(resource.resource_type)
        .fetch_all(conn)
        .await
        .map_err(db_err("Failed to list shares"))
    }

    /// Delete every share on the given resources.
    pub async fn delete_for_resources(
        conn: &mut PgConnection,
        resource_type: ResourceType,
        resource_ids: &[Uuid],
    ) -> AppResult<u64> {
        let result =
            sqlx::query("DELETE FROM shares WHERE resource_type = $1 AND resource_id = ANY($2)")
                .bind(resource_type)
                .bind(resource_ids)
                .execute(conn)
                .await
                .map_err(db_err("Failed to delete resource shares"))?;
        Ok(result.rows_affected())
    }

    /// Delete shares that lapsed at or before `now`, and revoked shares.
    pub async fn delete_expired(conn: &mut PgConnection, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM shares WHERE expires_at <= $1 OR NOT is_active")
            .bind(now)
            .execute(conn)
            .await
            .map_err(db_err("Failed to delete expired shares"))?;
        Ok(result.rows_affected())
    }
}
