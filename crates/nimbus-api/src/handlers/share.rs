//! Share management handlers for a node's owner.

use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use nimbus_entity::share::Share;
use nimbus_service::share::{GrantOutcome, LinkShareView, ShareInfo};

use crate::dto::request::{AddPeopleRequest, UpdateLinkShareRequest, UpdatePersonRequest};
use crate::dto::response::{ApiResponse, MessageResponse, ShareLinkResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/files/{id}/share
pub async fn info(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ShareInfo>>, ApiError> {
    let info = state.share_service.share_info(&auth, id).await?;
    Ok(Json(ApiResponse::ok(info)))
}

/// PATCH /api/files/{id}/share
pub async fn update_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLinkShareRequest>,
) -> Result<Json<ApiResponse<LinkShareView>>, ApiError> {
    let view = state
        .share_service
        .ensure_link_share(&auth, id, req.access_level, req.permission)
        .await?;
    Ok(Json(ApiResponse::ok(view)))
}

/// GET /api/files/{id}/share/copy-link
pub async fn copy_link(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ShareLinkResponse>>, ApiError> {
    let share_link = state.share_service.copy_link(&auth, id).await?;
    Ok(Json(ApiResponse::ok(ShareLinkResponse { share_link })))
}

/// POST /api/files/{id}/share/people
pub async fn add_people(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AddPeopleRequest>,
) -> Result<Json<ApiResponse<Vec<GrantOutcome>>>, ApiError> {
    let outcomes = state
        .share_service
        .add_named_grants(&auth, id, &req.emails, req.permission)
        .await?;
    Ok(Json(ApiResponse::ok(outcomes)))
}

/// PATCH /api/files/{id}/share/people/{share_id}
pub async fn update_person(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, share_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdatePersonRequest>,
) -> Result<Json<ApiResponse<Share>>, ApiError> {
    let share = state
        .share_service
        .update_person(&auth, id, share_id, req.permission)
        .await?;
    Ok(Json(ApiResponse::ok(share)))
}

/// DELETE /api/files/{id}/share/people/{share_id}
pub async fn remove_person(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, share_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.share_service.remove_person(&auth, id, share_id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse::new("Access removed"))))
}
