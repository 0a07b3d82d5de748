//! # drivecore-service
//!
//! Business logic for the DriveCore storage core. Each service works
//! against the [`TreeStore`](drivecore_database::TreeStore) and
//! [`BlobStore`](drivecore_core::traits::BlobStore) abstractions and
//! consults the [`PermissionEngine`] before any mutation.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod context;
pub mod file;
pub mod folder;
pub mod permission;
pub mod registry;
pub mod share;
pub mod storage;
pub mod trash;
pub mod user;

pub use context::{RequestContext, ShareCredential};
pub use file::{FileService, NewFile};
pub use folder::FolderService;
pub use permission::{Access, AccessSource, PermissionEngine};
pub use registry::DriveServices;
pub use share::{ResolvedShare, SharePasswordHasher, ShareService, SharedResource};
pub use storage::StorageAccounting;
pub use trash::{DeleteOutcome, PurgeReport, TrashService};
pub use user::UserService;
