//! Argon2id hashing for share passwords.

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as ArgonHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use drivecore_core::error::AppError;

/// Hashes and verifies share passwords using Argon2id.
#[derive(Debug, Clone)]
pub struct SharePasswordHasher;

impl SharePasswordHasher {
    /// Creates a new hasher instance.
    pub fn new() -> Self {
        Self
    }

    /// Hashes a plaintext share password with a random salt.
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.is_empty() {
            return Err(AppError::validation("Share password must not be empty"));
        }
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::internal(format!("Share password hashing failed: {e}")))
    }

    /// Verifies a plaintext password against a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::internal(format!("Invalid share password hash: {e}")))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::internal(format!(
                "Share password verification failed: {e}"
            ))),
        }
    }
}

impl Default for SharePasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}
