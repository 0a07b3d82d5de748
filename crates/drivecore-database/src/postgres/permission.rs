//! Permission grant repository.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use drivecore_core::result::AppResult;
use drivecore_entity::ResourceRef;
use drivecore_entity::permission::{GrantPermission, Permission, ResourceType};

use super::error::db_err;

/// Queries over the `permissions` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionRepository;

impl PermissionRepository {
    /// Insert a grant, replacing any prior grant for the same user and resource.
    pub async fn upsert(conn: &mut PgConnection, data: &GrantPermission) -> AppResult<Permission> {
        sqlx::query_as::<_, Permission>(
            "INSERT INTO permissions (user_id, resource_id, resource_type, level, granted_by, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT permissions_user_resource_key DO UPDATE SET \
                level = EXCLUDED.level, granted_by = EXCLUDED.granted_by, \
                expires_at = EXCLUDED.expires_at, created_at = NOW() \
             RETURNING *",
        )
        .bind(data.user_id)
        .bind(data.resource_id)
        .bind(data.resource_type)
        .bind(data.level)
        .bind(data.granted_by)
        .bind(data.expires_at)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to upsert permission"))
    }

    /// The grant a user holds on a resource, expired or not.
    pub async fn find(
        conn: &mut PgConnection,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE user_id = $1 AND resource_id = $2 AND resource_type = $3",
        )
        .bind(user_id)
        .bind(resource.id)
        .bind(resource.resource_type)
        .fetch_optional(conn)
        .await
        .map_err(db_err("Failed to find permission"))
    }

    /// Delete the grant a user holds on a resource.
    pub async fn delete(
        conn: &mut PgConnection,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM permissions WHERE user_id = $1 AND resource_id = $2 AND resource_type = $3",
        )
        .bind(user_id)
        .bind(resource.id)
        .bind(resource.resource_type)
        .execute(conn)
        .await
        .map_err(db_err("Failed to delete permission"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Grants on a resource, oldest first.
    pub async fn find_by_resource(
        conn: &mut PgConnection,
        resource: ResourceRef,
    ) -> AppResult<Vec<Permission>> {
        sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE resource_id = $1 AND resource_type = $2 \
             ORDER BY created_at ASC",
        )
        .bind(resource.id)
        .bind(resource.resource_type)
        .fetch_all(conn)
        .await
        .map_err(db_err("Failed to list permissions"))
    }

    /// Grants held by a user, newest first.
    pub async fn find_by_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<Permission>> {
        sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(conn)
        .await
        .map_err(db_err("Failed to list user permissions"))
    }

    /// Delete every grant on the given resources.
    pub async fn delete_for_resources(
        conn: &mut PgConnection,
        resource_type: ResourceType,
        resource_ids: &[Uuid],
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM permissions WHERE resource_type = $1 AND resource_id = ANY($2)",
        )
        .bind(resource_type)
        .bind(resource_ids)
        .execute(conn)
        .await
        .map_err(db_err("Failed to delete resource permissions"))?;
        Ok(result.rows_affected())
    }

    /// Delete grants that lapsed at or before `now`.
    pub async fn delete_expired(conn: &mut PgConnection, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM permissions WHERE expires_at <= $1")
            .bind(now)
            .execute(conn)
            .await
            .map_err(db_err("Failed to delete expired permissions"))?;
        Ok(result.rows_affected())
    }
}
