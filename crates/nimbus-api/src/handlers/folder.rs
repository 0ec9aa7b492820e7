//! Folder creation handler.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use nimbus_entity::node::Node;

use crate::dto::request::CreateFolderRequest;
use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/files/folder
pub async fn create_folder(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Node>>), ApiError> {
    let folder = state
        .tree_service
        .create_folder(&auth, req.parent_id, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(folder))))
}
