//! Request context carrying the caller's identity and share credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use drivecore_core::error::AppError;
use drivecore_core::result::AppResult;

/// A share token presented with a request, plus its password if any.
#[derive(Clone, Serialize, Deserialize)]
pub struct ShareCredential {
    /// The bearer token.
    pub token: String,
    /// Password for password-protected shares.
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl std::fmt::Debug for ShareCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareCredential")
            .field("token", &"<redacted>")
            .field("has_password", &self.password.is_some())
            .finish()
    }
}

/// Context for the current request.
///
/// Built by the transport layer and passed into every service method so
/// that each operation knows who is acting. A request carries an
/// authenticated user, a share credential, or both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated user's ID, if any.
    pub user_id: Option<Uuid>,
    /// A share credential presented instead of (or alongside) a user.
    pub share: Option<ShareCredential>,
    /// When the request was received. Expiry checks use this instant.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Context for an authenticated user.
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            share: None,
            request_time: Utc::now(),
        }
    }

    /// Context for an anonymous caller presenting a share token.
    pub fn anonymous_share(token: impl Into<String>, password: Option<String>) -> Self {
        Self {
            user_id: None,
            share: Some(ShareCredential {
                token: token.into(),
                password,
            }),
            request_time: Utc::now(),
        }
    }

    /// Attach a share credential to this context.
    pub fn with_share(mut self, token: impl Into<String>, password: Option<String>) -> Self {
        self.share = Some(ShareCredential {
            token: token.into(),
            password,
        });
        self
    }

    /// The authenticated user, or `PermissionDenied` for anonymous callers.
    pub fn require_user(&self) -> AppResult<Uuid> {
        self.user_id
            .ok_or_else(|| AppError::permission_denied("An authenticated user is required"))
    }

    /// Whether the caller is identified only by a share token.
    ///
    /// Errors returned to such callers are concealed.
    pub fn is_share_only(&self) -> bool {
        self.user_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_only() {
        assert!(RequestContext::anonymous_share("t", None).is_share_only());
        assert!(!RequestContext::user(Uuid::new_v4()).is_share_only());
        assert!(RequestContext::anonymous_share("t", None).require_user().is_err());
    }

    #[test]
    fn test_debug_redacts_credential() {
        let ctx = RequestContext::anonymous_share("super-secret-token", Some("pw".into()));
        let rendered = format!("{ctx:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(!rendered.contains("\"pw\""));
    }
}
