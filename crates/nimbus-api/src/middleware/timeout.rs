//! Request deadline.

use std::time::Duration;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ApiErrorResponse;
use crate::state::AppState;

/// Fails requests whose response is not ready within the configured time.
///
/// Only the time to the response head counts; streamed bodies are not cut.
pub async fn request_deadline(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let limit = Duration::from_secs(state.config.server.request_timeout_seconds.max(1));
    let path = request.uri().path().to_string();
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(path = %path, timeout_secs = limit.as_secs(), "Request timed out");
            let body = ApiErrorResponse {
                error: "TIMEOUT".to_string(),
                message: "The request took too long to complete".to_string(),
                details: None,
            };
            (StatusCode::GATEWAY_TIMEOUT, Json(body)).into_response()
        }
    }
}
