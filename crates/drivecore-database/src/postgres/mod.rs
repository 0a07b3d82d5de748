//! PostgreSQL tree store.
//!
//! Repositories issue single statements against a caller-supplied
//! connection; [`PgTreeStore`] composes them into `SERIALIZABLE`
//! transactions so that each structural mutation commits or rolls back
//! as a whole.

pub mod error;
pub mod file;
pub mod folder;
pub mod permission;
pub mod share;
pub mod tree_store;
pub mod usage;
pub mod user;

pub use file::FileRepository;
pub use folder::FolderRepository;
pub use permission::PermissionRepository;
pub use share::ShareRepository;
pub use tree_store::PgTreeStore;
pub use usage::UsageRepository;
pub use user::UserRepository;
