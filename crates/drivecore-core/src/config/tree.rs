//! Tree traversal limits and trash behaviour.

use serde::{Deserialize, Serialize};

/// Limits applied to folder hierarchies and resource names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum number of ancestors walked before the tree is declared corrupt.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum length of a folder or file name, in characters.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_name_length: default_max_name_length(),
        }
    }
}

/// Soft-delete, restore, and purge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashConfig {
    /// Restore the descendants trashed by the same delete event along with a folder.
    #[serde(default)]
    pub cascade_restore: bool,
    /// Attempts made against the blob store before a purge gives up.
    #[serde(default = "default_delete_attempts")]
    pub blob_delete_attempts: u32,
    /// Timeout applied to each blob delete attempt, in seconds.
    #[serde(default = "default_delete_timeout")]
    pub blob_delete_timeout_seconds: u64,
    /// Delay between blob delete attempts, in milliseconds.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            cascade_restore: false,
            blob_delete_attempts: default_delete_attempts(),
            blob_delete_timeout_seconds: default_delete_timeout(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_max_depth() -> usize {
    1000
}

fn default_max_name_length() -> usize {
    255
}

fn default_delete_attempts() -> u32 {
    3
}

fn default_delete_timeout() -> u64 {
    10
}

fn default_retry_backoff() -> u64 {
    200
}
