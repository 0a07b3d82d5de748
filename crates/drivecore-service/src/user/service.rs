//! Mirrors authenticated identities into the user table.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use drivecore_core::error::AppError;
use drivecore_core::result::AppResult;
use drivecore_database::TreeStore;
use drivecore_entity::user::model::normalize_email;
use drivecore_entity::user::{AuthenticatedUser, User};

/// Keeps the user table in step with upstream identities.
#[derive(Debug, Clone)]
pub struct UserService {
    store: Arc<dyn TreeStore>,
}

impl UserService {
    /// Creates a new user service.
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Inserts or refreshes the user behind an authenticated request.
    pub async fn sync_user(&self, identity: &AuthenticatedUser) -> AppResult<User> {
        let email = identity.normalized_email();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::validation(format!(
                "Invalid email address: '{}'",
                identity.email
            )));
        }
        let user = self.store.upsert_user(identity).await?;
        info!(user_id = %user.id, "User synchronized");
        Ok(user)
    }

    /// Gets a user by ID.
    pub async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::user_not_found(format!("User not found: {id}")))
    }

    /// Finds a user by email, case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> AppResult<User> {
        let email = normalize_email(email);
        self.store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::user_not_found(format!("No user with email {email}")))
    }
}
