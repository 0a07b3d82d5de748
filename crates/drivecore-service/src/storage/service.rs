//! Storage usage queries and recomputation.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use drivecore_core::result::AppResult;
use drivecore_database::TreeStore;
use drivecore_entity::storage::StorageUsage;

use crate::context::RequestContext;

/// Reports and recomputes per-user storage usage.
///
/// Usage counts live files only. Every mutation that changes the set of
/// live files recomputes it inside the same store transaction; this
/// service exposes the figures and a manual recompute for repair.
#[derive(Debug, Clone)]
pub struct StorageAccounting {
    store: Arc<dyn TreeStore>,
}

impl StorageAccounting {
    /// Creates a new accounting service.
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// The last computed usage for an owner, zero if never computed.
    pub async fn usage(&self, owner_id: Uuid) -> AppResult<StorageUsage> {
        Ok(self
            .store
            .find_usage(owner_id)
            .await?
            .unwrap_or_else(|| StorageUsage::empty(owner_id)))
    }

    /// The caller's own usage.
    pub async fn my_usage(&self, ctx: &RequestContext) -> AppResult<StorageUsage> {
        self.usage(ctx.require_user()?).await
    }

    /// Recomputes usage from the live file set. Idempotent.
    pub async fn recompute(&self, owner_id: Uuid) -> AppResult<StorageUsage> {
        let usage = self.store.recompute_usage(owner_id).await?;
        info!(
            user_id = %owner_id,
            total_size = usage.total_size,
            file_count = usage.file_count,
            "Storage usage recomputed"
        );
        Ok(usage)
    }
}
