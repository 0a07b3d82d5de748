//! Trash: soft delete, restore, and permanent purge.

pub mod service;

pub use service::{DeleteOutcome, PurgeReport, TrashService};
