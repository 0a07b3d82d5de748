//! In-memory tree store for tests and single-process embedding.
//!
//! All state sits behind one `tokio::sync::RwLock`; every mutation holds the
//! write guard for its whole duration, which gives the same all-or-nothing
//! behaviour the PostgreSQL store gets from transactions.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use drivecore_core::error::AppError;
use drivecore_core::result::AppResult;
use drivecore_core::types::{Page, PageRequest};
use drivecore_entity::ResourceRef;
use drivecore_entity::file::{CreateFile, File, ReplaceContent};
use drivecore_entity::folder::{CreateFolder, Folder};
use drivecore_entity::naming::name_key;
use drivecore_entity::permission::{GrantPermission, Permission, ResourceType};
use drivecore_entity::share::{CreateShare, Share};
use drivecore_entity::storage::StorageUsage;
use drivecore_entity::user::{AuthenticatedUser, User, model::normalize_email};

use crate::store::{Children, Subtree, TrashListing, TreeStore};

#[derive(Debug, Clone, Copy)]
enum WalkScope {
    Live,
    All,
    DeletedAt(DateTime<Utc>),
}

impl WalkScope {
    fn admits(&self, folder: &Folder) -> bool {
        match self {
            Self::Live => folder.is_live(),
            Self::All => true,
            Self::DeletedAt(at) => folder.is_deleted && folder.deleted_at == Some(*at),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    folders: HashMap<Uuid, Folder>,
    files: HashMap<Uuid, File>,
    permissions: HashMap<Uuid, Permission>,
    shares: HashMap<Uuid, Share>,
    usage: HashMap<Uuid, StorageUsage>,
}

impl State {
    fn owned_folder(&self, owner_id: Uuid, id: Uuid) -> Option<&Folder> {
        self.folders.get(&id).filter(|f| f.owner_id == owner_id)
    }

    fn owned_file(&self, owner_id: Uuid, id: Uuid) -> Option<&File> {
        self.files.get(&id).filter(|f| f.owner_id == owner_id)
    }

    fn live_folder(&self, owner_id: Uuid, id: Uuid) -> AppResult<Folder> {
        self.owned_folder(owner_id, id)
            .filter(|f| f.is_live())
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))
    }

    fn live_file(&self, owner_id: Uuid, id: Uuid) -> AppResult<File> {
        self.owned_file(owner_id, id)
            .filter(|f| f.is_live())
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))
    }

    fn require_live_parent(&self, owner_id: Uuid, parent_id: Option<Uuid>) -> AppResult<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        match self.owned_folder(owner_id, parent_id) {
            Some(parent) if parent.is_live() => Ok(()),
            _ => Err(AppError::invalid_parent(format!(
                "Folder {parent_id} is not a live folder of this owner"
            ))),
        }
    }

    fn ensure_folder_name_free(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
        exclude_id: Option<Uuid>,
    ) -> AppResult<()> {
        let key = name_key(name);
        let taken = self.folders.values().any(|f| {
            f.owner_id == owner_id
                && f.parent_id == parent_id
                && f.is_live()
                && Some(f.id) != exclude_id
                && name_key(&f.name) == key
        });
        if taken {
            return Err(AppError::duplicate_name(format!(
                "A folder named '{name}' already exists here"
            )));
        }
        Ok(())
    }

    fn ensure_file_name_free(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
        name: &str,
        exclude_id: Option<Uuid>,
    ) -> AppResult<()> {
        let key = name_key(name);
        let taken = self.files.values().any(|f| {
            f.owner_id == owner_id
                && f.folder_id == folder_id
                && f.is_live()
                && Some(f.id) != exclude_id
                && name_key(&f.name) == key
        });
        if taken {
            return Err(AppError::duplicate_name(format!(
                "A file named '{name}' already exists here"
            )));
        }
        Ok(())
    }

    /// `start` and its ancestors, nearest first.
    fn ancestor_chain(&self, start: Uuid, max_depth: usize) -> AppResult<Vec<Folder>> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(start);

        while let Some(id) = cursor {
            if !visited.insert(id) {
                return Err(AppError::corrupt_tree(format!(
                    "Folder {id} appears twice in the ancestry of {start}"
                )));
            }
            if chain.len() >= max_depth {
                return Err(AppError::corrupt_tree(format!(
                    "Ancestry of folder {start} exceeds {max_depth} levels"
                )));
            }
            let folder = self
                .folders
                .get(&id)
                .ok_or_else(|| AppError::corrupt_tree(format!("Folder {id} is missing")))?;
            cursor = folder.parent_id;
            chain.push(folder.clone());
        }

        Ok(chain)
    }

    /// `root` followed by its descendant folder IDs in breadth-first order.
    fn descendant_folders(
        &self,
        owner_id: Uuid,
        root: Uuid,
        max_depth: usize,
        scope: WalkScope,
    ) -> AppResult<Vec<Uuid>> {
        let mut visited = HashSet::from([root]);
        let mut ordered = vec![root];
        let mut frontier = vec![root];
        let mut depth = 0usize;

        while !frontier.is_empty() {
            let parents: HashSet<Uuid> = frontier.iter().copied().collect();
            let mut children: Vec<&Folder> = self
                .folders
                .values()
                .filter(|f| f.owner_id == owner_id)
                .filter(|f| f.parent_id.is_some_and(|p| parents.contains(&p)))
                .filter(|f| scope.admits(f))
                .collect();
            children.sort_by_key(|f| name_key(&f.name));

            depth += 1;
            if depth > max_depth && !children.is_empty() {
                return Err(AppError::corrupt_tree(format!(
                    "Subtree exceeds {max_depth} levels"
                )));
            }

            frontier = Vec::with_capacity(children.len());
            for child in children {
                if !visited.insert(child.id) {
                    return Err(AppError::corrupt_tree(format!(
                        "Folder {} is reachable twice in one subtree",
                        child.id
                    )));
                }
                frontier.push(child.id);
                ordered.push(child.id);
            }
        }

        Ok(ordered)
    }

    fn recompute_usage(&mut self, owner_id: Uuid) -> StorageUsage {
        let (total_size, file_count) = self
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && f.is_live())
            .fold((0i64, 0i64), |(size, count), f| (size + f.size, count + 1));
        let usage = StorageUsage {
            user_id: owner_id,
            total_size,
            file_count,
            last_calculated: Utc::now(),
        };
        self.usage.insert(owner_id, usage.clone());
        usage
    }

    fn remove_access_records(&mut self, resource_type: ResourceType, ids: &HashSet<Uuid>) {
        self.permissions
            .retain(|_, p| !(p.resource_type == resource_type && ids.contains(&p.resource_id)));
        self.shares
            .retain(|_, s| !(s.resource_type == resource_type && ids.contains(&s.resource_id)));
    }
}

/// Tree store that keeps every record in process memory.
#[derive(Debug, Default)]
pub struct MemoryTreeStore {
    state: RwLock<State>,
    /// Simulates a schema without the soft-delete columns.
    legacy: bool,
}

impl MemoryTreeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that reports no soft-delete support.
    pub fn legacy() -> Self {
        Self {
            state: RwLock::new(State::default()),
            legacy: true,
        }
    }

    fn ensure_soft_delete(&self) -> AppResult<()> {
        if self.legacy {
            return Err(AppError::internal(
                "Soft delete is unavailable on this schema",
            ));
        }
        Ok(())
    }

    /// Overwrite a folder's parent without any validation.
    #[cfg(test)]
    async fn force_parent(&self, id: Uuid, parent_id: Option<Uuid>) {
        if let Some(folder) = self.state.write().await.folders.get_mut(&id) {
            folder.parent_id = parent_id;
        }
    }
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn supports_soft_delete(&self) -> AppResult<bool> {
        Ok(!self.legacy)
    }

    async fn upsert_user(&self, user: &AuthenticatedUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        let email = user.normalized_email();
        if state
            .users
            .values()
            .any(|u| u.id != user.id && normalize_email(&u.email) == email)
        {
            return Err(AppError::conflict(format!(
                "Email '{email}' belongs to another user"
            )));
        }

        let now = Utc::now();
        let record = state
            .users
            .entry(user.id)
            .and_modify(|u| {
                u.email = email.clone();
                u.name = user.name.clone();
                u.plan = user.plan.clone();
                u.updated_at = now;
            })
            .or_insert_with(|| User {
                id: user.id,
                email: email.clone(),
                name: user.name.clone(),
                plan: user.plan.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| normalize_email(&u.email) == email)
            .cloned())
    }

    async fn find_folder(&self, id: Uuid) -> AppResult<Option<Folder>> {
        Ok(self.state.read().await.folders.get(&id).cloned())
    }

    async fn find_file(&self, id: Uuid) -> AppResult<Option<File>> {
        Ok(self.state.read().await.files.get(&id).cloned())
    }

    async fn list_children(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> AppResult<Children> {
        let state = self.state.read().await;
        let mut folders: Vec<Folder> = state
            .folders
            .values()
            .filter(|f| f.owner_id == owner_id && f.parent_id == parent_id && f.is_live())
            .cloned()
            .collect();
        folders.sort_by_key(|f| name_key(&f.name));

        let mut files: Vec<File> = state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && f.folder_id == parent_id && f.is_live())
            .cloned()
            .collect();
        files.sort_by_key(|f| name_key(&f.name));

        Ok(Children { folders, files })
    }

    async fn folder_path(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        max_depth: usize,
    ) -> AppResult<Vec<Folder>> {
        let state = self.state.read().await;
        if state.owned_folder(owner_id, folder_id).is_none() {
            return Err(AppError::not_found(format!("Folder {folder_id} not found")));
        }

        let mut chain = state.ancestor_chain(folder_id, max_depth)?;
        if let Some(foreign) = chain.iter().find(|f| f.owner_id != owner_id) {
            return Err(AppError::corrupt_tree(format!(
                "Folder {} in the ancestry of {folder_id} belongs to another owner",
                foreign.id
            )));
        }
        chain.reverse();
        Ok(chain)
    }

    async fn list_trash(&self, owner_id: Uuid, page: &PageRequest) -> AppResult<TrashListing> {
        if self.legacy {
            return Ok(TrashListing {
                files: Page::empty(),
                folders: Page::empty(),
            });
        }
        let state = self.state.read().await;

        let mut files: Vec<File> = state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && f.is_deleted)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then(a.id.cmp(&b.id)));

        let mut folders: Vec<Folder> = state
            .folders
            .values()
            .filter(|f| f.owner_id == owner_id && f.is_deleted)
            .cloned()
            .collect();
        folders.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then(a.id.cmp(&b.id)));

        Ok(TrashListing {
            files: Page::new(page.slice(&files), files.len() as u64),
            folders: Page::new(page.slice(&folders), folders.len() as u64),
        })
    }

    async fn collect_subtree(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        max_depth: usize,
    ) -> AppResult<Subtree> {
        let state = self.state.read().await;
        if state.owned_folder(owner_id, folder_id).is_none() {
            return Err(AppError::not_found(format!("Folder {folder_id} not found")));
        }

        let ids = state.descendant_folders(owner_id, folder_id, max_depth, WalkScope::All)?;
        let id_set: HashSet<Uuid> = ids.iter().copied().collect();
        let folders = ids
            .iter()
            .filter_map(|id| state.folders.get(id).cloned())
            .collect();
        let mut files: Vec<File> = state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id)
            .filter(|f| f.folder_id.is_some_and(|p| id_set.contains(&p)))
            .cloned()
            .collect();
        files.sort_by_key(|f| f.id);

        Ok(Subtree { folders, files })
    }

    async fn insert_folder(&self, data: &CreateFolder) -> AppResult<Folder> {
        let mut state = self.state.write().await;
        state.require_live_parent(data.owner_id, data.parent_id)?;
        state.ensure_folder_name_free(data.owner_id, data.parent_id, &data.name, None)?;

        let now = Utc::now();
        let folder = Folder {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            owner_id: data.owner_id,
            parent_id: data.parent_id,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.folders.insert(folder.id, folder.clone());

        debug!(folder_id = %folder.id, owner_id = %folder.owner_id, "Inserted folder");
        Ok(folder)
    }

    async fn insert_file(&self, data: &CreateFile) -> AppResult<File> {
        let mut state = self.state.write().await;
        if state.files.contains_key(&data.id) {
            return Err(AppError::conflict(format!("File {} already exists", data.id)));
        }
        if state.files.values().any(|f| f.storage_path == data.storage_path) {
            return Err(AppError::conflict("Storage path is already in use"));
        }
        state.require_live_parent(data.owner_id, data.folder_id)?;
        state.ensure_file_name_free(data.owner_id, data.folder_id, &data.name, None)?;

        let now = Utc::now();
        let file = File {
            id: data.id,
            name: data.name.clone(),
            owner_id: data.owner_id,
            folder_id: data.folder_id,
            size: data.size,
            mime_type: data.mime_type.clone(),
            storage_path: data.storage_path.clone(),
            is_deleted: false,
            deleted_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.files.insert(file.id, file.clone());
        state.recompute_usage(data.owner_id);

        debug!(file_id = %file.id, owner_id = %file.owner_id, "Inserted file");
        Ok(file)
    }

    async fn rename_folder(&self, owner_id: Uuid, id: Uuid, new_name: &str) -> AppResult<Folder> {
        let mut state = self.state.write().await;
        let folder = state.live_folder(owner_id, id)?;
        state.ensure_folder_name_free(owner_id, folder.parent_id, new_name, Some(id))?;

        let entry = state
            .folders
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;
        entry.name = new_name.to_string();
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn rename_file(&self, owner_id: Uuid, id: Uuid, new_name: &str) -> AppResult<File> {
        let mut state = self.state.write().await;
        let file = state.live_file(owner_id, id)?;
        state.ensure_file_name_free(owner_id, file.folder_id, new_name, Some(id))?;

        let entry = state
            .files
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        entry.name = new_name.to_string();
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn move_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        new_parent_id: Option<Uuid>,
        max_depth: usize,
    ) -> AppResult<Folder> {
        let mut state = self.state.write().await;
        let folder = state.live_folder(owner_id, id)?;
        if new_parent_id == Some(id) {
            return Err(AppError::cycle("A folder cannot be moved into itself"));
        }
        state.require_live_parent(owner_id, new_parent_id)?;

        if let Some(parent_id) = new_parent_id {
            let ancestry = state.ancestor_chain(parent_id, max_depth)?;
            if ancestry.iter().any(|a| a.id == id) {
                return Err(AppError::cycle(format!(
                    "Folder {id} cannot be moved under its own descendant {parent_id}"
                )));
            }
        }

        if folder.parent_id == new_parent_id {
            return Ok(folder);
        }
        state.ensure_folder_name_free(owner_id, new_parent_id, &folder.name, Some(id))?;

        let entry = state
            .folders
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;
        entry.parent_id = new_parent_id;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn move_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        new_folder_id: Option<Uuid>,
    ) -> AppResult<File> {
        let mut state = self.state.write().await;
        let file = state.live_file(owner_id, id)?;
        state.require_live_parent(owner_id, new_folder_id)?;

        if file.folder_id == new_folder_id {
            return Ok(file);
        }
        state.ensure_file_name_free(owner_id, new_folder_id, &file.name, Some(id))?;

        let entry = state
            .files
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        entry.folder_id = new_folder_id;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn replace_file_content(
        &self,
        owner_id: Uuid,
        id: Uuid,
        data: &ReplaceContent,
    ) -> AppResult<File> {
        let mut state = self.state.write().await;
        state.live_file(owner_id, id)?;

        let entry = state
            .files
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        entry.size = data.size;
        entry.mime_type = data.mime_type.clone();
        entry.storage_path = data.storage_path.clone();
        entry.version += 1;
        entry.updated_at = Utc::now();
        let file = entry.clone();
        state.recompute_usage(owner_id);
        Ok(file)
    }

    async fn soft_delete_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<File> {
        self.ensure_soft_delete()?;
        let mut state = self.state.write().await;
        state.live_file(owner_id, id)?;

        let entry = state
            .files
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        entry.is_deleted = true;
        entry.deleted_at = Some(deleted_at);
        entry.updated_at = Utc::now();
        let file = entry.clone();
        state.recompute_usage(owner_id);
        Ok(file)
    }

    async fn soft_delete_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        deleted_at: DateTime<Utc>,
        max_depth: usize,
    ) -> AppResult<u64> {
        self.ensure_soft_delete()?;
        let mut state = self.state.write().await;
        state.live_folder(owner_id, id)?;

        let ids: HashSet<Uuid> = state
            .descendant_folders(owner_id, id, max_depth, WalkScope::Live)?
            .into_iter()
            .collect();
        let now = Utc::now();
        let mut marked = 0u64;

        for folder in state.folders.values_mut() {
            if ids.contains(&folder.id) && folder.is_live() {
                folder.is_deleted = true;
                folder.deleted_at = Some(deleted_at);
                folder.updated_at = now;
                marked += 1;
            }
        }
        for file in state.files.values_mut() {
            let inside = file.folder_id.is_some_and(|p| ids.contains(&p));
            if file.owner_id == owner_id && inside && file.is_live() {
                file.is_deleted = true;
                file.deleted_at = Some(deleted_at);
                file.updated_at = now;
                marked += 1;
            }
        }
        state.recompute_usage(owner_id);

        debug!(folder_id = %id, marked, "Trashed folder subtree");
        Ok(marked)
    }

    async fn restore_file(&self, owner_id: Uuid, id: Uuid) -> AppResult<File> {
        self.ensure_soft_delete()?;
        let mut state = self.state.write().await;
        let file = state
            .owned_file(owner_id, id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        if file.is_live() {
            return Err(AppError::not_in_trash(format!("File {id} is not in the trash")));
        }
        if let Some(folder_id) = file.folder_id {
            if !state.folders.get(&folder_id).is_some_and(|p| p.is_live()) {
                return Err(AppError::orphaned_parent(format!(
                    "Folder {folder_id} containing file {id} is in the trash"
                )));
            }
        }
        state.ensure_file_name_free(owner_id, file.folder_id, &file.name, Some(id))?;

        let entry = state
            .files
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        entry.is_deleted = false;
        entry.deleted_at = None;
        entry.updated_at = Utc::now();
        let restored = entry.clone();
        state.recompute_usage(owner_id);
        Ok(restored)
    }

    async fn restore_folder(
        &self,
        owner_id: Uuid,
        id: Uuid,
        cascade: bool,
        max_depth: usize,
    ) -> AppResult<Folder> {
        self.ensure_soft_delete()?;
        let mut state = self.state.write().await;
        let folder = state
            .owned_folder(owner_id, id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;
        let Some(deleted_at) = folder.deleted_at.filter(|_| folder.is_deleted) else {
            return Err(AppError::not_in_trash(format!("Folder {id} is not in the trash")));
        };
        if let Some(parent_id) = folder.parent_id {
            if !state.folders.get(&parent_id).is_some_and(|p| p.is_live()) {
                return Err(AppError::orphaned_parent(format!(
                    "Parent folder {parent_id} of folder {id} is in the trash"
                )));
            }
        }
        state.ensure_folder_name_free(owner_id, folder.parent_id, &folder.name, Some(id))?;

        let ids: HashSet<Uuid> = if cascade {
            state
                .descendant_folders(owner_id, id, max_depth, WalkScope::DeletedAt(deleted_at))?
                .into_iter()
                .collect()
        } else {
            HashSet::from([id])
        };

        let now = Utc::now();
        for entry in state.folders.values_mut() {
            if ids.contains(&entry.id) && entry.is_deleted {
                entry.is_deleted = false;
                entry.deleted_at = None;
                entry.updated_at = now;
            }
        }
        if cascade {
            for file in state.files.values_mut() {
                let inside = file.folder_id.is_some_and(|p| ids.contains(&p));
                if file.owner_id == owner_id && inside && file.deleted_at == Some(deleted_at) {
                    file.is_deleted = false;
                    file.deleted_at = None;
                    file.updated_at = now;
                }
            }
            state.recompute_usage(owner_id);
            debug!(folder_id = %id, folders = ids.len(), "Restored folder subtree");
        }

        state
            .folders
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))
    }

    async fn delete_file_row(&self, owner_id: Uuid, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.owned_file(owner_id, id).is_none() {
            return Err(AppError::not_found(format!("File {id} not found")));
        }
        state.files.remove(&id);
        state.remove_access_records(ResourceType::File, &HashSet::from([id]));
        state.recompute_usage(owner_id);
        Ok(())
    }

    async fn delete_folder_rows(
        &self,
        owner_id: Uuid,
        ids_deepest_first: &[Uuid],
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let batch: HashSet<Uuid> = ids_deepest_first.iter().copied().collect();

        if let Some(missing) = ids_deepest_first
            .iter()
            .find(|id| state.owned_folder(owner_id, **id).is_none())
        {
            return Err(AppError::not_found(format!("Folder {missing} not found")));
        }
        let folder_blocked = state.folders.values().any(|f| {
            !batch.contains(&f.id) && f.parent_id.is_some_and(|p| batch.contains(&p))
        });
        let file_blocked = state
            .files
            .values()
            .any(|f| f.folder_id.is_some_and(|p| batch.contains(&p)));
        if folder_blocked || file_blocked {
            return Err(AppError::conflict(
                "Record is still referenced by other records",
            ));
        }

        for id in ids_deepest_first {
            state.folders.remove(id);
        }
        state.remove_access_records(ResourceType::Folder, &batch);
        Ok(())
    }

    async fn recompute_usage(&self, owner_id: Uuid) -> AppResult<StorageUsage> {
        Ok(self.state.write().await.recompute_usage(owner_id))
    }

    async fn find_usage(&self, owner_id: Uuid) -> AppResult<Option<StorageUsage>> {
        Ok(self.state.read().await.usage.get(&owner_id).cloned())
    }

    async fn upsert_permission(&self, data: &GrantPermission) -> AppResult<Permission> {
        let mut state = self.state.write().await;
        let existing = state
            .permissions
            .values()
            .find(|p| {
                p.user_id == data.user_id
                    && p.resource_id == data.resource_id
                    && p.resource_type == data.resource_type
            })
            .map(|p| p.id);

        let permission = Permission {
            id: existing.unwrap_or_else(Uuid::new_v4),
            user_id: data.user_id,
            resource_id: data.resource_id,
            resource_type: data.resource_type,
            level: data.level,
            granted_by: data.granted_by,
            created_at: Utc::now(),
            expires_at: data.expires_at,
        };
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn find_permission(
        &self,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> AppResult<Option<Permission>> {
        Ok(self
            .state
            .read()
            .await
            .permissions
            .values()
            .find(|p| {
                p.user_id == user_id
                    && p.resource_id == resource.id
                    && p.resource_type == resource.resource_type
            })
            .cloned())
    }

    async fn delete_permission(&self, user_id: Uuid, resource: ResourceRef) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let before = state.permissions.len();
        state.permissions.retain(|_, p| {
            !(p.user_id == user_id
                && p.resource_id == resource.id
                && p.resource_type == resource.resource_type)
        });
        Ok(state.permissions.len() < before)
    }

    async fn list_permissions(&self, resource: ResourceRef) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut grants: Vec<Permission> = state
            .permissions
            .values()
            .filter(|p| p.resource_id == resource.id && p.resource_type == resource.resource_type)
            .cloned()
            .collect();
        grants.sort_by_key(|p| p.created_at);
        Ok(grants)
    }

    async fn list_permissions_for_user(&self, user_id: Uuid) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut grants: Vec<Permission> = state
            .permissions
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        grants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(grants)
    }

    async fn delete_expired_permissions(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.permissions.len();
        state.permissions.retain(|_, p| !p.is_expired_at(now));
        Ok((before - state.permissions.len()) as u64)
    }

    async fn insert_share(&self, data: &CreateShare) -> AppResult<Share> {
        let mut state = self.state.write().await;
        if state.shares.values().any(|s| s.token == data.token) {
            return Err(AppError::conflict("Record already exists"));
        }
        let share = Share {
            id: Uuid::new_v4(),
            resource_id: data.resource_id,
            resource_type: data.resource_type,
            token: data.token.clone(),
            access_level: data.access_level,
            password_hash: data.password_hash.clone(),
            expires_at: data.expires_at,
            is_active: true,
            created_by: data.created_by,
            created_at: Utc::now(),
        };
        state.shares.insert(share.id, share.clone());
        Ok(share)
    }

    async fn find_share(&self, id: Uuid) -> AppResult<Option<Share>> {
        Ok(self.state.read().await.shares.get(&id).cloned())
    }

    async fn find_share_by_token(&self, token: &str) -> AppResult<Option<Share>> {
        Ok(self
            .state
            .read()
            .await
            .shares
            .values()
            .find(|s| s.token == token)
            .cloned())
    }

    async fn deactivate_share(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        match state.shares.get_mut(&id) {
            Some(share) if share.is_active => {
                share.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_shares(&self, resource: ResourceRef) -> AppResult<Vec<Share>> {
        let state = self.state.read().await;
        let mut shares: Vec<Share> = state
            .shares
            .values()
            .filter(|s| s.resource_id == resource.id && s.resource_type == resource.resource_type)
            .cloned()
            .collect();
        shares.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(shares)
    }

    async fn delete_expired_shares(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.shares.len();
        state
            .shares
            .retain(|_, s| s.is_active && !s.is_expired_at(now));
        Ok((before - state.shares.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivecore_core::error::ErrorKind;

    const MAX_DEPTH: usize = 1000;

    async fn folder(
        store: &MemoryTreeStore,
        owner: Uuid,
        name: &str,
        parent: Option<Uuid>,
    ) -> Folder {
        store
            .insert_folder(&CreateFolder {
                owner_id: owner,
                parent_id: parent,
                name: name.to_string(),
            })
            .await
            .unwrap()
    }

    async fn file(
        store: &MemoryTreeStore,
        owner: Uuid,
        name: &str,
        folder: Option<Uuid>,
        size: i64,
    ) -> File {
        let id = Uuid::new_v4();
        store
            .insert_file(&CreateFile {
                id,
                owner_id: owner,
                folder_id: folder,
                name: name.to_string(),
                size,
                mime_type: "application/octet-stream".to_string(),
                storage_path: format!("{owner}/{id}"),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sibling_names_collide_case_insensitively() {
        let store = MemoryTreeStore::new();
        let owner = Uuid::new_v4();
        folder(&store, owner, "Docs", None).await;

        let err = store
            .insert_folder(&CreateFolder {
                owner_id: owner,
                parent_id: None,
                name: "DOCS".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateName);

        // A file may share a folder's name.
        file(&store, owner, "docs", None, 1).await;
    }

    #[tokio::test]
    async fn test_parent_must_belong_to_owner() {
        let store = MemoryTreeStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let shared = folder(&store, alice, "Shared", None).await;

        let err = store
            .insert_folder(&CreateFolder {
                owner_id: bob,
                parent_id: Some(shared.id),
                name: "Mine".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParent);
    }

    #[tokio::test]
    async fn test_folder_path_detects_cycles() {
        let store = MemoryTreeStore::new();
        let owner = Uuid::new_v4();
        let a = folder(&store, owner, "a", None).await;
        let b = folder(&store, owner, "b", Some(a.id)).await;
        store.force_parent(a.id, Some(b.id)).await;

        let err = store.folder_path(owner, b.id, MAX_DEPTH).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CorruptTree);
    }

    #[tokio::test]
    async fn test_folder_path_respects_depth_bound() {
        let store = MemoryTreeStore::new();
        let owner = Uuid::new_v4();
        let mut parent = None;
        for depth in 0..5 {
            parent = Some(folder(&store, owner, &format!("level-{depth}"), parent).await.id);
        }
        let leaf = parent.unwrap();

        let path = store.folder_path(owner, leaf, 5).await.unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path[0].name, "level-0");

        let err = store.folder_path(owner, leaf, 4).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CorruptTree);
    }

    #[tokio::test]
    async fn test_delete_folder_rows_refuses_non_empty_folder() {
        let store = MemoryTreeStore::new();
        let owner = Uuid::new_v4();
        let root = folder(&store, owner, "root", None).await;
        file(&store, owner, "kept.txt", Some(root.id), 10).await;

        let err = store.delete_folder_rows(owner, &[root.id]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(store.find_folder(root.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let store = MemoryTreeStore::new();
        let owner = Uuid::new_v4();
        file(&store, owner, "a", None, 100).await;
        file(&store, owner, "b", None, 23).await;

        let first = store.recompute_usage(owner).await.unwrap();
        let second = store.recompute_usage(owner).await.unwrap();
        assert_eq!(first.total_size, 123);
        assert_eq!(first.file_count, 2);
        assert_eq!(first.total_size, second.total_size);
        assert_eq!(first.file_count, second.file_count);
    }

    #[tokio::test]
    async fn test_legacy_store_rejects_soft_delete() {
        let store = MemoryTreeStore::legacy();
        let owner = Uuid::new_v4();
        let f = file(&store, owner, "a", None, 1).await;

        assert!(!store.supports_soft_delete().await.unwrap());
        assert!(store.soft_delete_file(owner, f.id, Utc::now()).await.is_err());
    }
}
