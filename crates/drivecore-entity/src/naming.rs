//! Name validation and the sibling collision key.

use drivecore_core::{AppError, AppResult};

/// Validate a file or folder name and return its trimmed form.
pub fn validate_name(name: &str, max_len: usize) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Name must not be empty"));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::validation(format!(
            "Name exceeds {max_len} characters"
        )));
    }
    if trimmed.contains(['/', '\\', '\0']) {
        return Err(AppError::validation(
            "Name must not contain '/', '\\' or NUL",
        ));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(AppError::validation("Name must not be '.' or '..'"));
    }
    Ok(trimmed.to_string())
}

/// Key under which sibling names collide. Comparison is case-insensitive.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_trims() {
        assert_eq!(validate_name("  Docs ", 255).unwrap(), "Docs");
    }

    #[test]
    fn test_validate_name_rejects() {
        for bad in ["", "   ", "a/b", "a\\b", "a\0b", ".", ".."] {
            assert!(validate_name(bad, 255).is_err(), "{bad:?} accepted");
        }
        assert!(validate_name("abcdef", 5).is_err());
    }

    #[test]
    fn test_name_key_case_insensitive() {
        assert_eq!(name_key("Docs"), name_key("DOCS"));
        assert_ne!(name_key("Docs"), name_key("Doc"));
    }
}
