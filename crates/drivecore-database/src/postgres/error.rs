//! Mapping of sqlx errors onto the application error taxonomy.

use sqlx::error::DatabaseError;

use drivecore_core::error::{AppError, ErrorKind};

/// SQLSTATE for serialization failures.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for detected deadlocks.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE for unique violations.
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for foreign key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Build a `map_err` closure that classifies a sqlx error.
pub(crate) fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| map_sqlx_error(context, e)
}

/// Classify a sqlx error, keeping the original as the source.
pub(crate) fn map_sqlx_error(context: &str, e: sqlx::Error) -> AppError {
    let classified = match &e {
        sqlx::Error::Database(db) => classify(&**db),
        _ => None,
    };

    match classified {
        Some((kind, message, retryable)) => {
            let err = AppError::with_source(kind, message, e);
            if retryable { err.retryable() } else { err }
        }
        None => AppError::with_source(ErrorKind::Database, context.to_string(), e),
    }
}

fn classify(db: &dyn DatabaseError) -> Option<(ErrorKind, &'static str, bool)> {
    let code = db.code()?;
    match code.as_ref() {
        SERIALIZATION_FAILURE | DEADLOCK_DETECTED => Some((
            ErrorKind::Conflict,
            "Concurrent modification detected; retry the request",
            true,
        )),
        UNIQUE_VIOLATION => match db.constraint() {
            Some("folders_live_name_key") => Some((
                ErrorKind::DuplicateName,
                "A folder with this name already exists here",
                false,
            )),
            Some("files_live_name_key") => Some((
                ErrorKind::DuplicateName,
                "A file with this name already exists here",
                false,
            )),
            _ => Some((ErrorKind::Conflict, "Record already exists", false)),
        },
        FOREIGN_KEY_VIOLATION => match db.constraint() {
            Some("folders_owner_id_fkey") | Some("files_owner_id_fkey") => Some((
                ErrorKind::UserNotFound,
                "Owner is not a known user",
                false,
            )),
            _ => Some((
                ErrorKind::Conflict,
                "Record is still referenced by other records",
                false,
            )),
        },
        _ => None,
    }
}
