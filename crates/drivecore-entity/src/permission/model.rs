//! Explicit permission grant model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use super::level::AccessLevel;

/// Type of resource a grant or share refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resource_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A file.
    File,
    /// A folder.
    Folder,
}

impl ResourceType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An explicit grant from a resource's owner to another user.
///
/// Unique per `(user_id, resource_id, resource_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Permission {
    /// Unique grant identifier.
    pub id: Uuid,
    /// The grantee.
    pub user_id: Uuid,
    /// The resource the grant applies to.
    pub resource_id: Uuid,
    /// Whether the resource is a file or a folder.
    pub resource_type: ResourceType,
    /// Granted level (never `owner`).
    pub level: AccessLevel,
    /// The user who issued the grant.
    pub granted_by: Uuid,
    /// When the grant was issued.
    pub created_at: DateTime<Utc>,
    /// When the grant lapses.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Permission {
    /// Whether the grant has lapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Data required to insert or replace a grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantPermission {
    /// The grantee.
    pub user_id: Uuid,
    /// Target resource.
    pub resource_id: Uuid,
    /// Target resource type.
    pub resource_type: ResourceType,
    /// Level to grant.
    pub level: AccessLevel,
    /// The issuing user.
    pub granted_by: Uuid,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}
