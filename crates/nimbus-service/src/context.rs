//! Request context carrying the authenticated identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for the current authenticated request.
///
/// Built by the API layer from a verified identity token and passed into
/// service methods so that every operation knows *who* is acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated user's ID.
    pub user_id: Uuid,
    /// The user's email address (lower-cased).
    pub email: String,
    /// Display name from the identity provider.
    pub name: Option<String>,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(user_id: Uuid, email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            user_id,
            email: email.into().trim().to_lowercase(),
            name,
            request_time: Utc::now(),
        }
    }

    /// The principal this context acts as.
    pub fn principal(&self) -> Principal {
        Principal::User {
            user_id: self.user_id,
            email: self.email.clone(),
        }
    }
}

/// The acting identity for access resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A caller holding only a link token.
    Anonymous,
    /// An authenticated user.
    User {
        /// User id.
        user_id: Uuid,
        /// Email address (lower-cased).
        email: String,
    },
}

impl Principal {
    /// Principal for an optional authenticated context.
    pub fn from_context(ctx: Option<&RequestContext>) -> Self {
        ctx.map_or(Self::Anonymous, RequestContext::principal)
    }

    /// The user id, if authenticated.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Anonymous => None,
            Self::User { user_id, .. } => Some(*user_id),
        }
    }
}
