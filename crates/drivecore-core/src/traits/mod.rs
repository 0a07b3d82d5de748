//! Core traits defined in `drivecore-core` and implemented by other crates.

pub mod storage;

pub use storage::{BlobStore, UrlDisposition};
