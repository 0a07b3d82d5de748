//! Storage usage aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Derived totals over an owner's non-deleted files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StorageUsage {
    /// The owner.
    pub user_id: Uuid,
    /// Sum of sizes in bytes.
    pub total_size: i64,
    /// Number of files.
    pub file_count: i64,
    /// When the row was last recomputed.
    pub last_calculated: DateTime<Utc>,
}

impl StorageUsage {
    /// Usage for an owner with no files.
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            total_size: 0,
            file_count: 0,
            last_calculated: Utc::now(),
        }
    }

    /// Format total size as human-readable string.
    pub fn total_size_human(&self) -> String {
        format_bytes(self.total_size)
    }
}

/// Format bytes into a human-readable string.
fn format_bytes(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = KB * 1024;
    const GB: i64 = MB * 1024;
    const TB: i64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }
}
