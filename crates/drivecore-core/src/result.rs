//! Convenience result type alias for DriveCore.

use crate::error::AppError;

/// A specialized `Result` type for DriveCore operations.
pub type AppResult<T> = Result<T, AppError>;
