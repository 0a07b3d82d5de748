//! Per-user storage accounting.

pub mod service;

pub use service::StorageAccounting;
