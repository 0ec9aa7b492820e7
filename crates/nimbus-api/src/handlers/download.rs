//! Download handlers.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_service::file::{DownloadTicket, FileDownload};

use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/files/{id}/download-url
pub async fn download_url(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DownloadTicket>>, ApiError> {
    let ticket = state
        .download_service
        .download_grant(&auth.principal(), id)
        .await?;
    Ok(Json(ApiResponse::ok(ticket)))
}

/// GET /api/files/{id}/download
pub async fn download(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let download = state.download_service.download(&auth.principal(), id).await?;
    Ok(stream_response(download)?)
}

/// Stream a file to the client as an attachment.
pub(crate) fn stream_response(download: FileDownload) -> Result<Response, AppError> {
    let FileDownload { node, body } = download;
    let content_type = if node.mime_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        node.mime_type
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            nimbus_storage::disposition::attachment(&node.name),
        )
        .header(header::CONTENT_LENGTH, body.meta.size_bytes)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body.stream))
        .map_err(|e| AppError::internal(format!("Response build failed: {e}")))
}
