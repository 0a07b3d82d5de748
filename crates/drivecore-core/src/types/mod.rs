//! Core type definitions used across the DriveCore workspace.

pub mod pagination;

pub use pagination::{Page, PageRequest};
