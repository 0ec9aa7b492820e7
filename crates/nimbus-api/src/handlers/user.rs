//! Session identity handler.

use axum::Json;

use crate::dto::response::{ApiResponse, SessionUserResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;

/// GET /api/user
pub async fn me(auth: AuthUser) -> Result<Json<ApiResponse<SessionUserResponse>>, ApiError> {
    let ctx = auth.context();
    Ok(Json(ApiResponse::ok(SessionUserResponse {
        id: ctx.user_id,
        email: ctx.email.clone(),
        name: ctx.name.clone(),
    })))
}
