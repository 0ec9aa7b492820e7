//! Route definitions for the Nimbus HTTP API.
//!
//! All routes are organized by domain and mounted under `/api`.
//! The router receives `AppState` and passes it to all handlers via Axum's `State` extractor.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Headroom over the largest file for multipart framing and text fields.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let max_body = usize::try_from(state.config.server.max_upload_size_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let api_routes = Router::new()
        .merge(health_routes())
        .merge(user_routes())
        .merge(listing_routes())
        .merge(upload_routes())
        .merge(file_routes())
        .merge(share_routes())
        .merge(public_routes());

    let cors = middleware::cors::build_cors_layer(&state.config.server.cors);

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::timeout::request_deadline,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(
            middleware::logging::request_logging,
        ))
        .with_state(state)
}

/// Liveness
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

/// Session identity and storage usage
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(handlers::user::me))
        .route("/storage", get(handlers::storage::usage))
}

/// Folder listings, views, search, and breadcrumbs
fn listing_routes() -> Router<AppState> {
    Router::new()
        .route("/files", get(handlers::browse::list))
        .route(
            "/files/trash",
            get(handlers::browse::trash).delete(handlers::file::empty_trash),
        )
        .route("/files/starred", get(handlers::browse::starred))
        .route("/files/shared", get(handlers::browse::shared_with_me))
        .route("/files/search", get(handlers::browse::search))
        .route("/files/path", get(handlers::browse::path))
}

/// Folder creation and both upload paths
fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/files/folder", post(handlers::folder::create_folder))
        .route("/files/upload-url", post(handlers::upload::upload_url))
        .route("/files/upload-complete", post(handlers::upload::upload_complete))
        .route("/files/upload", post(handlers::upload::upload_proxy))
}

/// Tree mutations and downloads on one node
fn file_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/files/{id}",
            patch(handlers::file::update).delete(handlers::file::soft_delete),
        )
        .route("/files/{id}/restore", post(handlers::file::restore))
        .route("/files/{id}/permanent", delete(handlers::file::purge))
        .route("/files/{id}/duplicate", post(handlers::file::duplicate))
        .route("/files/{id}/star", patch(handlers::file::star))
        .route("/files/{id}/download-url", get(handlers::download::download_url))
        .route("/files/{id}/download", get(handlers::download::download))
}

/// Owner-side share management
fn share_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/files/{id}/share",
            get(handlers::share::info).patch(handlers::share::update_link),
        )
        .route("/files/{id}/share/copy-link", get(handlers::share::copy_link))
        .route("/files/{id}/share/people", post(handlers::share::add_people))
        .route(
            "/files/{id}/share/people/{share_id}",
            patch(handlers::share::update_person).delete(handlers::share::remove_person),
        )
}

/// Link access, signed in or not
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/shared/{token}", get(handlers::public::view))
        .route("/shared/{token}/download", get(handlers::public::download))
}
