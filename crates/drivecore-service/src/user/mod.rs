//! User mirroring from the identity provider.

pub mod service;

pub use service::UserService;
