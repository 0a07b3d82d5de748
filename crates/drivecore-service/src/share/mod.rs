//! Share tokens and per-user permission grants.

pub mod link;
pub mod password;
pub mod service;

pub use password::SharePasswordHasher;
pub use service::{ResolvedShare, SharedResource, ShareService};
