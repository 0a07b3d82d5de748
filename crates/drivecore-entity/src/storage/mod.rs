//! Per-user storage accounting entities.

pub mod usage;

pub use usage::StorageUsage;
