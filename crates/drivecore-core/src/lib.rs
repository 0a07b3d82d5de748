//! # drivecore-core
//!
//! Core crate for DriveCore. Contains the unified error system, the
//! configuration schemas, the blob store adapter trait, and pagination
//! types shared by every other crate.
//!
//! This crate has **no** internal dependencies on other DriveCore crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
