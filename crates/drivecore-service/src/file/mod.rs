//! File operations: metadata, content, and signed URLs.

pub mod service;

pub use service::{DownloadResult, FileService, NewFile};
