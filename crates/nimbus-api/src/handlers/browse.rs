//! Listing handlers: folders, trash, starred, shared with me, search, and
//! breadcrumbs.

use axum::Json;
use axum::extract::{Query, State};

use nimbus_entity::node::Node;
use nimbus_service::file::{Crumb, ListQuery, SharedNode};

use crate::dto::request::{ListParams, PathParams, SearchParams};
use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

fn list_query(params: &ListParams) -> Result<ListQuery, ApiError> {
    Ok(ListQuery::parse(
        params.parent()?,
        params.category.as_deref(),
        params.modified.as_deref(),
        params.recursive.unwrap_or(false),
    )?)
}

/// GET /api/files?parentId=&type=&modified=&recursive=
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<Node>>>, ApiError> {
    let query = list_query(&params)?;
    let nodes = state.browse_service.list(&auth, &query).await?;
    Ok(Json(ApiResponse::ok(nodes)))
}

/// GET /api/files/trash
pub async fn trash(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<Node>>>, ApiError> {
    let nodes = state.browse_service.trash(&auth).await?;
    Ok(Json(ApiResponse::ok(nodes)))
}

/// GET /api/files/starred
pub async fn starred(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<Node>>>, ApiError> {
    let nodes = state.browse_service.starred(&auth).await?;
    Ok(Json(ApiResponse::ok(nodes)))
}

/// GET /api/files/shared
pub async fn shared_with_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<SharedNode>>>, ApiError> {
    let query = list_query(&params)?;
    let nodes = state.browse_service.shared_with_me(&auth, &query).await?;
    Ok(Json(ApiResponse::ok(nodes)))
}

/// GET /api/files/search?q=
pub async fn search(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Vec<Node>>>, ApiError> {
    let nodes = state
        .browse_service
        .search(
            &auth,
            &params.q,
            params.limit,
            params.include_deleted.unwrap_or(false),
        )
        .await?;
    Ok(Json(ApiResponse::ok(nodes)))
}

/// GET /api/files/path?fileId=
pub async fn path(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PathParams>,
) -> Result<Json<ApiResponse<Vec<Crumb>>>, ApiError> {
    let crumbs = state.browse_service.breadcrumb(&auth, params.file_id).await?;
    Ok(Json(ApiResponse::ok(crumbs)))
}
