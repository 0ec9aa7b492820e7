//! JWT token creation.
//!
//! Production tokens come from the identity provider; this encoder signs
//! tokens with the same secret for tests and local tooling.

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use nimbus_core::config::AuthConfig;
use nimbus_core::error::AppError;

use super::claims::Claims;

/// Default lifetime of tokens signed here.
const DEFAULT_TTL_MINUTES: i64 = 60;

/// Creates signed identity tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
    /// Issuer stamped into tokens, if configured.
    issuer: Option<String>,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
        }
    }

    /// Sign a token valid for one hour.
    pub fn issue(&self, user_id: Uuid, email: &str, name: Option<&str>) -> Result<String, AppError> {
        self.issue_with_ttl(user_id, email, name, chrono::Duration::minutes(DEFAULT_TTL_MINUTES))
    }

    /// Sign a token with an explicit lifetime.
    pub fn issue_with_ttl(
        &self,
        user_id: Uuid,
        email: &str,
        name: Option<&str>,
        ttl: chrono::Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            name: name.map(str::to_string),
            picture: None,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign token: {e}")))
    }
}
