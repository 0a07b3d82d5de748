//! Share token generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

use drivecore_core::config::share::MIN_TOKEN_BYTES;

/// Generates a URL-safe bearer token from `bytes` bytes of OS randomness.
///
/// Requests below the configured minimum are raised to it.
pub fn generate_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes.max(MIN_TOKEN_BYTES)];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_length_and_alphabet() {
        let token = generate_token(32);
        // 32 bytes -> 43 unpadded base64 characters.
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = generate_token(32);
        let b = generate_token(32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_minimum_enforced() {
        assert_eq!(generate_token(1).len(), generate_token(MIN_TOKEN_BYTES).len());
    }
}
