//! Signed URL generation for blobs served by a static file endpoint.

use sha2::{Digest, Sha256};

use drivecore_core::traits::UrlDisposition;

/// Signs and verifies blob URLs with a shared secret.
#[derive(Clone)]
pub struct UrlSigner {
    secret: String,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    /// Create a signer.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex signature over the path, disposition and expiry (unix seconds).
    pub fn sign(&self, path: &str, disposition: UrlDisposition, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update([0u8]);
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(disposition.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(expires.to_be_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check a signature and that `now` (unix seconds) is before the expiry.
    pub fn verify(
        &self,
        path: &str,
        disposition: UrlDisposition,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> bool {
        if now >= expires {
            return false;
        }
        let expected = self.sign(path, disposition, expires);
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = UrlSigner::new("secret");
        let sig = signer.sign("u/1", UrlDisposition::Inline, 1_000);
        assert_eq!(sig.len(), 64);
        assert!(signer.verify("u/1", UrlDisposition::Inline, 1_000, &sig, 999));
    }

    #[test]
    fn test_verify_rejects_tampering_and_expiry() {
        let signer = UrlSigner::new("secret");
        let sig = signer.sign("u/1", UrlDisposition::Inline, 1_000);
        assert!(!signer.verify("u/2", UrlDisposition::Inline, 1_000, &sig, 999));
        assert!(!signer.verify("u/1", UrlDisposition::Attachment, 1_000, &sig, 999));
        assert!(!signer.verify("u/1", UrlDisposition::Inline, 1_000, &sig, 1_000));
        assert!(!UrlSigner::new("other").verify("u/1", UrlDisposition::Inline, 1_000, &sig, 999));
    }
}
