//! The tree store abstraction.
//!
//! A [`TreeStore`] owns folder and file records together with the grant,
//! share and usage rows that hang off them. Every structural mutation is a
//! single atomic unit: parent validation, sibling-name collision checks,
//! cycle detection and the storage usage recompute all happen inside the
//! same transaction (or lock scope) as the write itself.
//!
//! Mutations are keyed by `(owner_id, id)`; a record whose owner does not
//! match is reported as not found.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use drivecore_core::result::AppResult;
use drivecore_core::types::{Page, PageRequest};
use drivecore_entity::ResourceRef;
use drivecore_entity::file::{CreateFile, File, ReplaceContent};
use drivecore_entity::folder::{CreateFolder, Folder};
use drivecore_entity::permission::{GrantPermission, Permission};
use drivecore_entity::share::{CreateShare, Share};
use drivecore_entity::storage::StorageUsage;
use drivecore_entity::user::{AuthenticatedUser, User};

/// Live direct children of a folder (or of an owner's root).
#[derive(Debug, Clone, Default)]
pub struct Children {
    /// Child folders ordered by name.
    pub folders: Vec<Folder>,
    /// Child files ordered by name.
    pub files: Vec<File>,
}

/// Every record under a folder, regardless of trash state.
#[derive(Debug, Clone, Default)]
pub struct Subtree {
    /// Folders in breadth-first order, starting with the subtree root.
    pub folders: Vec<Folder>,
    /// Files contained anywhere in the subtree.
    pub files: Vec<File>,
}

impl Subtree {
    /// Folder IDs ordered so that every folder precedes its parent.
    pub fn folder_ids_deepest_first(&self) -> Vec<Uuid> {
        self.folders.iter().rev().map(|f| f.id).collect()
    }
}

/// Trashed records for one owner, paginated independently.
#[derive(Debug, Clone)]
pub struct TrashListing {
    /// Trashed files, most recently deleted first.
    pub files: Page<File>,
    /// Trashed folders, most recently deleted first.
    pub folders: Page<Folder>,
}

/// Durable storage for the folder/file tree and its access records.
#[async_trait]
pub trait TreeStore: Send + Sync + Debug + 'static {
    /// Short backend name for logging.
    fn backend(&self) -> &'static str;

    /// Whether the schema carries the soft-delete columns.
    async fn supports_soft_delete(&self) -> AppResult<bool>;

    // -- users --------------------------------------------------------

    /// Insert or refresh the local mirror of an authenticated user.
    async fn upsert_user(&self, user: &AuthenticatedUser) -> AppResult<User>;

    /// Find a user by ID.
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find a user by normalized email.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    // -- tree reads ---------------------------------------------------

    /// Find a folder by ID, in or out of the trash.
    async fn find_folder(&self, id: Uuid) -> AppResult<Option<Folder>>;

    /// Find a file by ID, in or out of the trash.
    async fn find_file(&self, id: Uuid) -> AppResult<Option<File>>;

    /// Live children of `parent_id` (None for the owner's root).
    async fn list_children(&self, owner_id: Uuid, parent_id: Option<Uuid>)
    -> AppResult<Children>;

    /// Folders from the root down to `folder_id`, inclusive.
    ///
    /// Fails with `CorruptTree` if the walk exceeds `max_depth` steps or
    /// revisits a folder.
    async fn folder_path(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        max_depth: usize,
    ) -> AppResult<Vec<Folder>>;

    /// Trashed files and folders of an owner.
    async fn list_trash(&self, owner_id: Uuid, page: &PageRequest) -> AppResult<TrashListing>;

    /// Every folder and file beneath (and including) `folder_id`.
    async fn collect_subtree(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        max_depth: usize,
    ) -> AppResult<Subtree>;

    // -- structural mutations ----------------------------------------

    /// Insert a folder after validating its parent and name.
    async fn insert_folder(&self, data: &CreateFolder) -> AppResult<Folder>;

    /// Insert a file after validating its folder and name; recomputes usage.
    async fn insert_file(&self, data: &CreateFile) -> AppResult<File>;

    /// Rename a live folder.
    async fn rename_folder(&self, owner_id: Uuid, id: Uuid, new_name: &str) -> AppResult<Folder>;

    /// Rename a live file.
    async fn rename_file(&self, owner_id: Uuid, id: Uuid, new_name: &str) -> AppResult<File>;

    /// Reparent a live folder, rejecting cycles.
    async fn move_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        new_parent_id: Option<Uuid>,
        max_depth: usize,
    ) -> AppResult<Folder>;

    /// Move a live file to another folder of the same owner.
    async fn move_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        new_folder_id: Option<Uuid>,
    ) -> AppResult<File>;

    /// Swap a live file onto new content: bumps `version`, recomputes usage.
    async fn replace_file_content(
        &self,
        owner_id: Uuid,
        id: Uuid,
        data: &ReplaceContent,
    ) -> AppResult<File>;

    // -- trash --------------------------------------------------------

    /// Trash a live file; recomputes usage.
    async fn soft_delete_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<File>;

    /// Trash a live folder and every live descendant with one timestamp.
    ///
    /// Returns the number of records marked. Recomputes usage.
    async fn soft_delete_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        deleted_at: DateTime<Utc>,
        max_depth: usize,
    ) -> AppResult<u64>;

    /// Take a trashed file out of the trash; recomputes usage.
    async fn restore_file(&self, owner_id: Uuid, id: Uuid) -> AppResult<File>;

    /// Take a trashed folder out of the trash.
    ///
    /// With `cascade`, descendants trashed by the same delete event (same
    /// `deleted_at`) are restored as well.
    async fn restore_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        cascade: bool,
        max_depth: usize,
    ) -> AppResult<Folder>;

    /// Remove a file row with its grants and shares; recomputes usage.
    async fn delete_file_row(&self, owner_id: Uuid, id: Uuid) -> AppResult<()>;

    /// Remove folder rows, deepest first, with their grants and shares.
    ///
    /// Fails with `Conflict` if any folder still has children that are not
    /// part of the batch.
    async fn delete_folder_rows(&self, owner_id: Uuid, ids_deepest_first: &[Uuid])
    -> AppResult<()>;

    // -- storage usage ------------------------------------------------

    /// Recompute and persist the usage row for an owner.
    async fn recompute_usage(&self, owner_id: Uuid) -> AppResult<StorageUsage>;

    /// Read the persisted usage row for an owner.
    async fn find_usage(&self, owner_id: Uuid) -> AppResult<Option<StorageUsage>>;

    // -- permissions --------------------------------------------------

    /// Insert a grant, replacing any existing grant for the same user and resource.
    async fn upsert_permission(&self, data: &GrantPermission) -> AppResult<Permission>;

    /// Find the grant a user holds on a resource.
    async fn find_permission(
        &self,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> AppResult<Option<Permission>>;

    /// Delete the grant a user holds on a resource.
    async fn delete_permission(&self, user_id: Uuid, resource: ResourceRef) -> AppResult<bool>;

    /// Grants on a resource.
    async fn list_permissions(&self, resource: ResourceRef) -> AppResult<Vec<Permission>>;

    /// Grants held by a user.
    async fn list_permissions_for_user(&self, user_id: Uuid) -> AppResult<Vec<Permission>>;

    /// Delete grants that lapsed at or before `now`.
    async fn delete_expired_permissions(&self, now: DateTime<Utc>) -> AppResult<u64>;

    // -- shares -------------------------------------------------------

    /// Insert a share.
    async fn insert_share(&self, data: &CreateShare) -> AppResult<Share>;

    /// Find a share by ID.
    async fn find_share(&self, id: Uuid) -> AppResult<Option<Share>>;

    /// Find a share by token.
    async fn find_share_by_token(&self, token: &str) -> AppResult<Option<Share>>;

    /// Mark a share inactive. Returns false if it was already inactive.
    async fn deactivate_share(&self, id: Uuid) -> AppResult<bool>;

    /// Shares on a resource, newest first.
    async fn list_shares(&self, resource: ResourceRef) -> AppResult<Vec<Share>>;

    /// Delete shares that lapsed at or before `now` or were revoked.
    async fn delete_expired_shares(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
