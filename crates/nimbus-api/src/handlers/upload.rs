//! Upload handlers: direct-to-store grants, completion, and proxied
//! multipart uploads.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use bytes::Bytes;

use nimbus_core::error::AppError;
use nimbus_entity::node::Node;
use nimbus_service::file::{BeginUploadRequest, CompleteUploadRequest, ProxyUpload, UploadTicket};

use crate::dto::request::{UploadCompleteRequest, UploadUrlRequest, optional_id};
use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/files/upload-url
pub async fn upload_url(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UploadUrlRequest>,
) -> Result<Json<ApiResponse<UploadTicket>>, ApiError> {
    let ticket = state
        .upload_service
        .begin_upload(
            &auth,
            BeginUploadRequest {
                name: req.name,
                mime_type: req.mime_type,
                size: req.size,
                parent_id: req.parent_id,
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(ticket)))
}

/// POST /api/files/upload-complete
pub async fn upload_complete(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UploadCompleteRequest>,
) -> Result<Json<ApiResponse<Node>>, ApiError> {
    let node = state
        .upload_service
        .complete_upload(
            &auth,
            CompleteUploadRequest {
                node_id: req.node_id,
                key: req.key,
                size: req.size,
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(node)))
}

/// POST /api/files/upload (multipart/form-data)
///
/// Fields: `file` (required), `parentId` and `name` (optional; `name`
/// overrides the part's filename).
pub async fn upload_proxy(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Node>>), ApiError> {
    let mut file: Option<(Option<String>, Option<String>, Bytes)> = None;
    let mut name_override: Option<String> = None;
    let mut parent_raw: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let filename = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Failed to read file: {e}")))?;
                file = Some((filename, content_type, data));
            }
            "parentId" | "parent_id" => {
                parent_raw = Some(read_text(field).await?);
            }
            "name" => {
                name_override = Some(read_text(field).await?);
            }
            _ => {}
        }
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| AppError::validation("No file provided"))?;
    let name = name_override
        .filter(|n| !n.trim().is_empty())
        .or(filename)
        .ok_or_else(|| AppError::validation("File name is required"))?;

    let node = state
        .upload_service
        .proxy_upload(
            &auth,
            ProxyUpload {
                name,
                mime_type: content_type,
                data,
                parent_id: optional_id(parent_raw.as_deref(), "parentId")?,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(node))))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart field: {e}")))
}
