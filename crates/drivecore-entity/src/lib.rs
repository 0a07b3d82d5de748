//! # drivecore-entity
//!
//! Domain entity models for DriveCore. Every struct in this crate
//! represents a database table row or a domain value object. All entities
//! derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and database
//! entities additionally derive `sqlx::FromRow`.

pub mod file;
pub mod folder;
pub mod naming;
pub mod permission;
pub mod resource;
pub mod share;
pub mod storage;
pub mod user;

pub use resource::{Resource, ResourceRef};
