//! Unified application error types for DriveCore.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Message used whenever an error is concealed from an untrusted caller.
const NOT_ACCESSIBLE: &str = "Resource is not accessible";

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The resource is absent or not visible to the caller.
    NotFound,
    /// The resource is visible but the caller's access level is insufficient.
    PermissionDenied,
    /// A live sibling already uses the requested name.
    DuplicateName,
    /// The requested parent does not resolve to a live folder of the same owner.
    InvalidParent,
    /// A move would make a folder its own ancestor.
    Cycle,
    /// A share or permission has lapsed.
    Expired,
    /// A restore is blocked because the parent folder is in the trash.
    OrphanedParent,
    /// A restore was requested for a resource that is not in the trash.
    NotInTrash,
    /// A grantee email does not resolve to a known user.
    UserNotFound,
    /// The blob store adapter failed.
    BlobStore,
    /// A cycle or depth-bound violation was detected while reading the tree.
    CorruptTree,
    /// Input validation failed.
    Validation,
    /// A concurrent modification prevented the operation from committing.
    Conflict,
    /// A database error occurred.
    Database,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            Self::DuplicateName => write!(f, "DUPLICATE_NAME"),
            Self::InvalidParent => write!(f, "INVALID_PARENT"),
            Self::Cycle => write!(f, "CYCLE"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::OrphanedParent => write!(f, "ORPHANED_PARENT"),
            Self::NotInTrash => write!(f, "NOT_IN_TRASH"),
            Self::UserNotFound => write!(f, "USER_NOT_FOUND"),
            Self::BlobStore => write!(f, "BLOB_STORE"),
            Self::CorruptTree => write!(f, "CORRUPT_TREE"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Database => write!(f, "DATABASE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout DriveCore.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Whether the caller may safely retry the same request.
    pub retryable: bool,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: false,
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: false,
            source: Some(Box::new(source)),
        }
    }

    /// Mark this error as retryable.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Whether the caller may retry the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Collapse access-revealing errors into a uniform not-found error.
    ///
    /// Applied to every error returned to a caller that presented only a
    /// share token, so the response does not reveal whether the resource
    /// exists, has expired, or merely requires a higher access level.
    pub fn conceal(self) -> Self {
        match self.kind {
            ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::Expired => {
                Self::new(ErrorKind::NotFound, NOT_ACCESSIBLE)
            }
            _ => self,
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a permission-denied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// Create a duplicate-name error.
    pub fn duplicate_name(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateName, message)
    }

    /// Create an invalid-parent error.
    pub fn invalid_parent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParent, message)
    }

    /// Create a cycle error.
    pub fn cycle(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cycle, message)
    }

    /// Create an expired error.
    pub fn expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Expired, message)
    }

    /// Create an orphaned-parent error.
    pub fn orphaned_parent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OrphanedParent, message)
    }

    /// Create a not-in-trash error.
    pub fn not_in_trash(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotInTrash, message)
    }

    /// Create a user-not-found error.
    pub fn user_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserNotFound, message)
    }

    /// Create a blob store error.
    pub fn blob_store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BlobStore, message)
    }

    /// Create a corrupt-tree error.
    pub fn corrupt_tree(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptTree, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            retryable: self.retryable,
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::BlobStore, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
