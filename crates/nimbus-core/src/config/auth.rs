//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Identity token verification settings.
///
/// Tokens are issued by the external identity provider; Nimbus only
/// verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret for HS256 signature verification.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Expected `iss` claim, if the provider sets one.
    #[serde(default)]
    pub jwt_issuer: Option<String>,
    /// How long a verified identity is remembered before its user row is refreshed.
    #[serde(default = "default_user_sync_ttl")]
    pub user_sync_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_issuer: None,
            user_sync_ttl_seconds: default_user_sync_ttl(),
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_user_sync_ttl() -> u64 {
    600
}
