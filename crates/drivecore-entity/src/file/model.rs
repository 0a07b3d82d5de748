//! File entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A file record. The bytes live in the blob store under `storage_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Unique file identifier.
    pub id: Uuid,
    /// The file name (including extension).
    pub name: String,
    /// The file owner.
    pub owner_id: Uuid,
    /// The folder containing this file (null for the owner's root).
    pub folder_id: Option<Uuid>,
    /// File size in bytes.
    pub size: i64,
    /// MIME type of the file.
    pub mime_type: String,
    /// Opaque blob store handle, never reused after a permanent delete.
    pub storage_path: String,
    /// Whether the file is in the trash.
    pub is_deleted: bool,
    /// When the file was trashed; set if and only if `is_deleted`.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Content version, starting at 1.
    pub version: i32,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
    /// When the file was last updated.
    pub updated_at: DateTime<Utc>,
}

impl File {
    /// Check whether this file is currently live (not trashed).
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    /// Get the file extension (lowercase), if any.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit('.')
            .next()
            .filter(|ext| *ext != self.name)
            .map(|ext| ext.to_lowercase())
    }
}

/// Data required to create a new file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFile {
    /// Pre-allocated file ID; the storage path is derived from it.
    pub id: Uuid,
    /// The file owner.
    pub owner_id: Uuid,
    /// The folder to place the file in (None for root).
    pub folder_id: Option<Uuid>,
    /// The file name, already validated.
    pub name: String,
    /// File size in bytes.
    pub size: i64,
    /// MIME type.
    pub mime_type: String,
    /// Blob store handle.
    pub storage_path: String,
}

/// New content metadata for an existing file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceContent {
    /// New size in bytes.
    pub size: i64,
    /// New MIME type.
    pub mime_type: String,
    /// Blob handle holding the new content.
    pub storage_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_named(name: &str) -> File {
        let now = Utc::now();
        File {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id: Uuid::new_v4(),
            folder_id: None,
            size: 0,
            mime_type: "application/octet-stream".to_string(),
            storage_path: "blobs/x".to_string(),
            is_deleted: false,
            deleted_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_extension() {
        assert_eq!(file_named("a.PDF").extension(), Some("pdf".to_string()));
        assert_eq!(file_named("archive.tar.gz").extension(), Some("gz".to_string()));
        assert_eq!(file_named("README").extension(), None);
    }
}
