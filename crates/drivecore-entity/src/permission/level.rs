//! Access level enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use drivecore_core::AppError;

/// Access level held by a caller on a single resource.
///
/// Totally ordered: Read < Write < Admin < Owner. `Owner` is never stored;
/// it is derived from `owner_id` at evaluation time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "access_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// View, list and download.
    Read,
    /// Rename, move and upload new versions.
    Write,
    /// Delete, restore, and manage shares and permissions.
    Admin,
    /// Implicit level of the resource owner.
    Owner,
}

impl AccessLevel {
    /// Check if this level satisfies the given minimum.
    pub fn has_at_least(&self, required: AccessLevel) -> bool {
        *self >= required
    }

    /// Whether this level may be stored on an explicit grant.
    pub fn is_grantable(&self) -> bool {
        !matches!(self, Self::Owner)
    }

    /// Whether this level may be carried by a share token.
    pub fn is_shareable(&self) -> bool {
        matches!(self, Self::Read | Self::Write)
    }

    /// Return the level as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            _ => Err(AppError::validation(format!("Invalid access level: '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(AccessLevel::Read < AccessLevel::Write);
        assert!(AccessLevel::Write < AccessLevel::Admin);
        assert!(AccessLevel::Admin < AccessLevel::Owner);
        assert!(AccessLevel::Owner.has_at_least(AccessLevel::Admin));
        assert!(!AccessLevel::Read.has_at_least(AccessLevel::Write));
    }

    #[test]
    fn test_parse() {
        assert_eq!("WRITE".parse::<AccessLevel>().unwrap(), AccessLevel::Write);
        assert!("editor".parse::<AccessLevel>().is_err());
    }

    #[test]
    fn test_grantable_and_shareable() {
        assert!(AccessLevel::Admin.is_grantable());
        assert!(!AccessLevel::Owner.is_grantable());
        assert!(AccessLevel::Write.is_shareable());
        assert!(!AccessLevel::Admin.is_shareable());
    }
}
