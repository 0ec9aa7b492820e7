//! Identity extractors: pull the bearer token, verify it, and mirror the
//! identity into the user directory.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use tracing::debug;

use nimbus_core::error::AppError;
use nimbus_service::{Principal, RequestContext};

use crate::error::ApiError;
use crate::state::AppState;

/// Extracted authenticated user context available in handlers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub RequestContext);

impl AuthUser {
    /// Returns the inner `RequestContext`.
    pub fn context(&self) -> &RequestContext {
        &self.0
    }
}

impl std::ops::Deref for AuthUser {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The caller's context when a valid token is present, anonymous otherwise.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<RequestContext>);

impl OptionalAuthUser {
    /// The principal link resolution runs as.
    pub fn principal(&self) -> Principal {
        Principal::from_context(self.0.as_ref())
    }
}

fn bearer_token(parts: &Parts) -> Option<Result<&str, AppError>> {
    let value = parts.headers.get(header::AUTHORIZATION)?;
    Some(
        value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::authentication("Invalid Authorization header format")),
    )
}

async fn authenticate(token: &str, state: &AppState) -> Result<RequestContext, AppError> {
    let claims = state.jwt_decoder.decode(token)?;
    state.known_users.sync(&claims).await?;
    Ok(RequestContext::new(
        claims.user_id(),
        claims.email,
        claims.name,
    ))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::authentication("Missing Authorization header"))??;
        Ok(AuthUser(authenticate(token, state).await?))
    }
}

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts) {
            Some(Ok(token)) => token,
            Some(Err(_)) | None => return Ok(OptionalAuthUser(None)),
        };

        match authenticate(token, state).await {
            Ok(ctx) => Ok(OptionalAuthUser(Some(ctx))),
            Err(e) if e.is(nimbus_core::error::ErrorKind::Authentication) => {
                debug!(error = %e, "Ignoring invalid token on public route");
                Ok(OptionalAuthUser(None))
            }
            Err(e) => Err(e.into()),
        }
    }
}
