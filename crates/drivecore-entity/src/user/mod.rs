//! User domain entities.

pub mod model;

pub use model::{AuthenticatedUser, User};
