//! Shared helpers for service integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use drivecore_core::config::{AppConfig, LocalStorageConfig};
use drivecore_core::error::AppError;
use drivecore_core::result::AppResult;
use drivecore_core::traits::{BlobStore, UrlDisposition};
use drivecore_database::{MemoryTreeStore, TreeStore};
use drivecore_entity::user::AuthenticatedUser;
use drivecore_service::{DriveServices, RequestContext};
use drivecore_storage::providers::local::LocalBlobStore;

/// A service stack over the in-memory tree store.
pub struct TestDrive {
    /// All services.
    pub services: DriveServices,
    /// The tree store, for direct assertions.
    pub store: Arc<dyn TreeStore>,
    /// The blob store, for direct assertions.
    pub blobs: Arc<dyn BlobStore>,
    _dir: Option<TempDir>,
}

impl TestDrive {
    /// Default configuration over a local blob store in a temp dir.
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Custom configuration over a local blob store in a temp dir.
    pub async fn with_config(config: AppConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let blobs = LocalBlobStore::new(&LocalStorageConfig {
            root_path: dir.path().to_string_lossy().into_owned(),
            public_base_url: "http://blobs.test".to_string(),
            signing_secret: "test-secret".to_string(),
        })
        .await
        .unwrap();
        let mut drive = Self::build(config, Arc::new(MemoryTreeStore::new()), Arc::new(blobs));
        drive._dir = Some(dir);
        drive
    }

    /// A store without trash support.
    pub async fn legacy() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let blobs = LocalBlobStore::new(&LocalStorageConfig {
            root_path: dir.path().to_string_lossy().into_owned(),
            public_base_url: "http://blobs.test".to_string(),
            signing_secret: "test-secret".to_string(),
        })
        .await
        .unwrap();
        let mut drive = Self::build(
            test_config(),
            Arc::new(MemoryTreeStore::legacy()),
            Arc::new(blobs),
        );
        drive._dir = Some(dir);
        drive
    }

    /// Default configuration over the given blob store.
    pub fn with_blobs(blobs: Arc<dyn BlobStore>) -> Self {
        Self::build(test_config(), Arc::new(MemoryTreeStore::new()), blobs)
    }

    fn build(config: AppConfig, store: Arc<dyn TreeStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let services = DriveServices::new(&config, Arc::clone(&store), Arc::clone(&blobs));
        Self {
            services,
            store,
            blobs,
            _dir: None,
        }
    }

    /// Registers a user and returns its ID.
    pub async fn user(&self, email: &str) -> Uuid {
        let identity = AuthenticatedUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            plan: "free".to_string(),
        };
        self.services.users.sync_user(&identity).await.unwrap().id
    }
}

/// Configuration with short retry delays.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.trash.retry_backoff_ms = 1;
    config.trash.blob_delete_timeout_seconds = 1;
    config
}

/// Request context for a user, stamped now.
pub fn as_user(user_id: Uuid) -> RequestContext {
    RequestContext::user(user_id)
}

/// A file to trash right after the next blob write.
type PendingTrash = (Arc<dyn TreeStore>, Uuid, Uuid);

/// In-memory blob store whose deletes can be made to fail.
#[derive(Default)]
pub struct FlakyBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
    fail_deletes: AtomicBool,
    delete_calls: AtomicU32,
    trash_on_put: Mutex<Option<PendingTrash>>,
}

impl std::fmt::Debug for FlakyBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyBlobStore")
            .field("blobs", &self.blob_count())
            .finish_non_exhaustive()
    }
}

impl FlakyBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(path)
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    /// Trash `file_id` in `store` once the next `put` has written its blob.
    pub fn trash_on_next_put(&self, store: Arc<dyn TreeStore>, owner_id: Uuid, file_id: Uuid) {
        *self.trash_on_put.lock().unwrap() = Some((store, owner_id, file_id));
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    fn provider_type(&self) -> &str {
        "flaky"
    }

    async fn put(&self, data: Bytes, path_hint: &str) -> AppResult<String> {
        self.blobs
            .lock()
            .unwrap()
            .insert(path_hint.to_string(), data);
        let pending = self.trash_on_put.lock().unwrap().take();
        if let Some((store, owner_id, file_id)) = pending {
            store.soft_delete_file(owner_id, file_id, Utc::now()).await?;
        }
        Ok(path_hint.to_string())
    }

    async fn get(&self, storage_path: &str) -> AppResult<Bytes> {
        self.blobs
            .lock()
            .unwrap()
            .get(storage_path)
            .cloned()
            .ok_or_else(|| AppError::blob_store(format!("No blob at {storage_path}")))
    }

    async fn delete(&self, storage_path: &str) -> AppResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::blob_store("backend unavailable"));
        }
        self.blobs.lock().unwrap().remove(storage_path);
        Ok(())
    }

    async fn sign_url(
        &self,
        storage_path: &str,
        disposition: UrlDisposition,
        ttl: Duration,
    ) -> AppResult<String> {
        Ok(format!(
            "flaky://{storage_path}?disposition={}&ttl={}",
            disposition.as_str(),
            ttl.as_secs()
        ))
    }
}
