//! Tree mutation handlers: rename, move, trash, restore, purge, duplicate,
//! and star.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_entity::node::Node;
use nimbus_service::tree::PurgeReport;

use crate::dto::request::{StarRequest, UpdateNodeRequest};
use crate::dto::response::{ApiResponse, TrashedResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// PATCH /api/files/{id}
///
/// A rename is applied before a move, so the move checks the new name
/// against the destination.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNodeRequest>,
) -> Result<Json<ApiResponse<Node>>, ApiError> {
    if req.name.is_none() && req.parent_id.is_none() {
        return Err(AppError::validation("Nothing to update").into());
    }

    let mut node = None;
    if let Some(name) = &req.name {
        node = Some(state.tree_service.rename(&auth, id, name).await?);
    }
    if let Some(parent_id) = req.parent_id {
        node = Some(state.tree_service.move_node(&auth, id, parent_id).await?);
    }

    let node = node.ok_or_else(|| AppError::internal("Update produced no node"))?;
    Ok(Json(ApiResponse::ok(node)))
}

/// DELETE /api/files/{id}
pub async fn soft_delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TrashedResponse>>, ApiError> {
    let trashed = state.tree_service.soft_delete(&auth, id).await?;
    Ok(Json(ApiResponse::ok(TrashedResponse { trashed })))
}

/// POST /api/files/{id}/restore
pub async fn restore(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Node>>, ApiError> {
    let node = state.tree_service.restore(&auth, id).await?;
    Ok(Json(ApiResponse::ok(node)))
}

/// DELETE /api/files/{id}/permanent
pub async fn purge(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PurgeReport>>, ApiError> {
    let report = state.tree_service.purge(&auth, id).await?;
    Ok(Json(ApiResponse::ok(report)))
}

/// DELETE /api/files/trash
pub async fn empty_trash(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<PurgeReport>>, ApiError> {
    let report = state.tree_service.empty_trash(&auth).await?;
    Ok(Json(ApiResponse::ok(report)))
}

/// POST /api/files/{id}/duplicate
pub async fn duplicate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<Node>>), ApiError> {
    let copy = state.tree_service.duplicate(&auth, id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(copy))))
}

/// PATCH /api/files/{id}/star
pub async fn star(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StarRequest>,
) -> Result<Json<ApiResponse<Node>>, ApiError> {
    let node = state
        .tree_service
        .set_starred(&auth, id, req.is_starred)
        .await?;
    Ok(Json(ApiResponse::ok(node)))
}
