//! Limit/offset pagination for list operations.

use serde::{Deserialize, Serialize};

/// Default page size.
const DEFAULT_LIMIT: u64 = 50;
/// Maximum page size.
const MAX_LIMIT: u64 = 500;

/// Request parameters for paginated queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of items to return.
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Number of items to skip.
    #[serde(default)]
    pub offset: u64,
}

impl PageRequest {
    /// Create a new page request, clamping the limit to `1..=500`.
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_LIMIT),
            offset,
        }
    }

    /// The SQL `LIMIT` value.
    pub fn limit(&self) -> i64 {
        self.limit as i64
    }

    /// The SQL `OFFSET` value.
    pub fn offset(&self) -> i64 {
        self.offset as i64
    }

    /// Apply this page to an already-sorted in-memory list.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// A page of items together with the unpaginated total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    /// Create a page.
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    /// Create an empty page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(PageRequest::new(0, 0).limit, 1);
        assert_eq!(PageRequest::new(10_000, 0).limit, MAX_LIMIT);
    }

    #[test]
    fn test_slice() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(PageRequest::new(3, 4).slice(&items), vec![4, 5, 6]);
        assert!(PageRequest::new(3, 20).slice(&items).is_empty());
    }
}
