//! Share token configuration.

use serde::{Deserialize, Serialize};

/// Smallest accepted token size: 16 bytes = 128 bits of entropy.
pub const MIN_TOKEN_BYTES: usize = 16;

/// Share token and signed URL configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    /// Number of random bytes in a share token.
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
    /// Default lifetime of signed download URLs, in seconds.
    #[serde(default = "default_url_ttl")]
    pub default_url_ttl_seconds: u64,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            token_bytes: default_token_bytes(),
            default_url_ttl_seconds: default_url_ttl(),
        }
    }
}

fn default_token_bytes() -> usize {
    32
}

fn default_url_ttl() -> u64 {
    900
}
