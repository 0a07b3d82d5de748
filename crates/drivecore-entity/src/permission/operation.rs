//! Operations that are subject to permission checks.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::level::AccessLevel;

/// An operation a caller may attempt on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Read metadata.
    View,
    /// List folder children.
    List,
    /// Read content or obtain a signed URL.
    Download,
    /// Rename the resource.
    Rename,
    /// Move the resource, or move something into it.
    Move,
    /// Replace file content.
    UploadVersion,
    /// Move into the trash.
    Delete,
    /// Take out of the trash.
    Restore,
    /// Create, list or revoke share tokens.
    ManageShares,
    /// Grant, list or revoke user permissions.
    ManagePermissions,
    /// Irreversibly remove the resource and its blob.
    Purge,
}

impl Operation {
    /// The minimum access level this operation requires.
    pub fn required_level(&self) -> AccessLevel {
        match self {
            Self::View | Self::List | Self::Download => AccessLevel::Read,
            Self::Rename | Self::Move | Self::UploadVersion => AccessLevel::Write,
            Self::Delete | Self::Restore | Self::ManageShares | Self::ManagePermissions => {
                AccessLevel::Admin
            }
            Self::Purge => AccessLevel::Owner,
        }
    }

    /// Whether the operation may target a resource that is in the trash.
    pub fn applies_to_trashed(&self) -> bool {
        matches!(self, Self::Restore | Self::Purge)
    }

    /// Return the operation as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::List => "list",
            Self::Download => "download",
            Self::Rename => "rename",
            Self::Move => "move",
            Self::UploadVersion => "upload_version",
            Self::Delete => "delete",
            Self::Restore => "restore",
            Self::ManageShares => "manage_shares",
            Self::ManagePermissions => "manage_permissions",
            Self::Purge => "purge",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_levels() {
        assert_eq!(Operation::Download.required_level(), AccessLevel::Read);
        assert_eq!(Operation::Move.required_level(), AccessLevel::Write);
        assert_eq!(Operation::ManageShares.required_level(), AccessLevel::Admin);
        assert_eq!(Operation::Purge.required_level(), AccessLevel::Owner);
    }
}
