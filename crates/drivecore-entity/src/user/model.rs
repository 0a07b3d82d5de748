//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user known to the storage core.
///
/// Rows are mirrored from the identity provider on first sign-in; the id
/// never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier, issued by the identity provider.
    pub id: Uuid,
    /// Email address, used to address permission grants.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Subscription plan label.
    pub plan: String,
    /// When the user was first seen.
    pub created_at: DateTime<Utc>,
    /// When the profile was last refreshed.
    pub updated_at: DateTime<Utc>,
}

/// The identity handed to the core for an inbound request.
///
/// The core trusts this value; credential validation happens upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// User ID.
    pub id: Uuid,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Subscription plan label.
    pub plan: String,
}

impl AuthenticatedUser {
    /// Normalized email used for lookups.
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

/// Lowercase and trim an email address for comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
