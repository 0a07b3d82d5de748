//! User repository.

use sqlx::PgConnection;
use uuid::Uuid;

use drivecore_core::result::AppResult;
use drivecore_entity::user::{AuthenticatedUser, User};

use super::error::db_err;

/// Queries over the `users` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRepository;

impl UserRepository {
    /// Find a user by ID.
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(db_err("Failed to find user"))
    }

    /// Find a user by email (case-insensitive).
    pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(conn)
            .await
            .map_err(db_err("Failed to find user by email"))
    }

    /// Insert a user, or refresh email, name and plan if the ID exists.
    pub async fn upsert(conn: &mut PgConnection, user: &AuthenticatedUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, name, plan) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
                email = EXCLUDED.email, name = EXCLUDED.name, plan = EXCLUDED.plan, \
                updated_at = NOW() \
             RETURNING *",
        )
        .bind(user.id)
        .bind(user.normalized_email())
        .bind(&user.name)
        .bind(&user.plan)
        .fetch_one(conn)
        .await
        .map_err(db_err("Failed to upsert user"))
    }
}
