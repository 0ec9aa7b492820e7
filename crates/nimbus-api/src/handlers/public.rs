//! Public link handlers. Authentication is optional: a valid token adds
//! the caller's own grants to what the link alone allows.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::Response;

use nimbus_service::share::PublicNode;

use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::OptionalAuthUser;
use crate::handlers::download::stream_response;
use crate::state::AppState;

/// GET /api/shared/{token}
pub async fn view(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<PublicNode>>, ApiError> {
    let node = state
        .share_service
        .public_view(&token, &auth.principal())
        .await?;
    Ok(Json(ApiResponse::ok(node)))
}

/// GET /api/shared/{token}/download
pub async fn download(
    State(state): State<AppState>,
    auth: OptionalAuthUser,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let download = state
        .share_service
        .public_download(&token, &auth.principal())
        .await?;
    Ok(stream_response(download)?)
}
