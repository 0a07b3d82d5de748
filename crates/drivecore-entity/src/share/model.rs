//! Share entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::permission::level::AccessLevel;
use crate::permission::model::ResourceType;

/// A bearer token granting access to exactly one resource.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Share {
    /// Unique share identifier.
    pub id: Uuid,
    /// ID of the shared resource.
    pub resource_id: Uuid,
    /// Type of the shared resource.
    pub resource_type: ResourceType,
    /// Opaque bearer token.
    pub token: String,
    /// Level carried by the token (read or write).
    pub access_level: AccessLevel,
    /// Argon2 hash of the optional password.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// When the share lapses.
    pub expires_at: Option<DateTime<Utc>>,
    /// Cleared on revocation.
    pub is_active: bool,
    /// The user who created the share.
    pub created_by: Uuid,
    /// When the share was created.
    pub created_at: DateTime<Utc>,
}

impl Share {
    /// Whether the share has lapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Whether the share requires a password.
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Active and not yet expired.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }
}

/// Data required to insert a share.
#[derive(Debug, Clone)]
pub struct CreateShare {
    /// Shared resource.
    pub resource_id: Uuid,
    /// Shared resource type.
    pub resource_type: ResourceType,
    /// Freshly generated token.
    pub token: String,
    /// Level carried by the token.
    pub access_level: AccessLevel,
    /// Hashed password, if any.
    pub password_hash: Option<String>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// The issuing user.
    pub created_by: Uuid,
}
