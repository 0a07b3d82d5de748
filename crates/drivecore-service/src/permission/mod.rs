//! Access resolution for every resource operation.

pub mod engine;

pub use engine::{Access, AccessSource, PermissionEngine};
