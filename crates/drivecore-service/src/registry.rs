//! Wires every service over one tree store and one blob store.

use std::sync::Arc;

use drivecore_core::config::AppConfig;
use drivecore_core::traits::BlobStore;
use drivecore_database::TreeStore;

use crate::file::FileService;
use crate::folder::FolderService;
use crate::permission::PermissionEngine;
use crate::share::{SharePasswordHasher, ShareService};
use crate::storage::StorageAccounting;
use crate::trash::TrashService;
use crate::user::UserService;

/// All DriveCore services, sharing one store and one permission engine.
#[derive(Debug, Clone)]
pub struct DriveServices {
    /// Permission engine.
    pub engine: Arc<PermissionEngine>,
    /// Folder operations.
    pub folders: Arc<FolderService>,
    /// File operations.
    pub files: Arc<FileService>,
    /// Trash operations.
    pub trash: Arc<TrashService>,
    /// Shares and grants.
    pub shares: Arc<ShareService>,
    /// Storage accounting.
    pub accounting: Arc<StorageAccounting>,
    /// User mirroring.
    pub users: Arc<UserService>,
}

impl DriveServices {
    /// Builds every service from configuration and backends.
    pub fn new(config: &AppConfig, store: Arc<dyn TreeStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let hasher = Arc::new(SharePasswordHasher::new());
        let engine = Arc::new(PermissionEngine::new(Arc::clone(&store), Arc::clone(&hasher)));

        let folders = Arc::new(FolderService::new(
            Arc::clone(&store),
            Arc::clone(&engine),
            config.tree.clone(),
        ));
        let files = Arc::new(FileService::new(
            Arc::clone(&store),
            Arc::clone(&blobs),
            Arc::clone(&engine),
            config.tree.clone(),
            config.share.clone(),
        ));
        let trash = Arc::new(TrashService::new(
            Arc::clone(&store),
            Arc::clone(&blobs),
            Arc::clone(&engine),
            config.tree.clone(),
            config.trash.clone(),
        ));
        let shares = Arc::new(ShareService::new(
            Arc::clone(&store),
            Arc::clone(&engine),
            hasher,
            config.share.clone(),
        ));
        let accounting = Arc::new(StorageAccounting::new(Arc::clone(&store)));
        let users = Arc::new(UserService::new(store));

        Self {
            engine,
            folders,
            files,
            trash,
            shares,
            accounting,
            users,
        }
    }
}
