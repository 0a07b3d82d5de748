//! # drivecore-database
//!
//! The [`TreeStore`] abstraction over folder, file, grant, share and usage
//! records, with a transactional PostgreSQL implementation and an
//! in-memory implementation for tests and embedded use.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod postgres;
pub mod store;

pub use memory::MemoryTreeStore;
pub use postgres::PgTreeStore;
pub use store::{Children, Subtree, TrashListing, TreeStore};
