//! Permission domain entities: access levels, operations, and explicit grants.

pub mod level;
pub mod model;
pub mod operation;

pub use level::AccessLevel;
pub use model::{GrantPermission, Permission, ResourceType};
pub use operation::Operation;
