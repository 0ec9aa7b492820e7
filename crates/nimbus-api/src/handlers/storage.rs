//! Storage usage handler.

use axum::Json;
use axum::extract::State;

use nimbus_service::storage::StorageSummary;

use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/storage
pub async fn usage(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<StorageSummary>>, ApiError> {
    let summary = state.browse_service.storage(&auth).await?;
    Ok(Json(ApiResponse::ok(summary)))
}
