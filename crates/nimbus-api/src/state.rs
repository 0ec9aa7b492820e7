//! Shared application state passed to every handler.

use std::sync::Arc;

use nimbus_auth::{JwtDecoder, KnownUsers};
use nimbus_core::config::AppConfig;
use nimbus_core::traits::storage::ObjectStore;
use nimbus_database::{NodeStore, ShareStore, UserDirectory};
use nimbus_service::{
    AccessResolver, BrowseService, ContentManager, DownloadService, LinkService, QuotaService,
    ShareService, TreeService, UploadService,
};

/// Application state shared across all handlers via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ──
    pub config: Arc<AppConfig>,

    // ── Identity ──
    pub jwt_decoder: Arc<JwtDecoder>,
    pub known_users: Arc<KnownUsers>,

    // ── Content ──
    pub content: Arc<ContentManager>,

    // ── Services ──
    pub tree_service: Arc<TreeService>,
    pub share_service: Arc<ShareService>,
    pub upload_service: Arc<UploadService>,
    pub download_service: Arc<DownloadService>,
    pub browse_service: Arc<BrowseService>,
}

impl AppState {
    /// Wire every service from the stores and configuration.
    pub fn build(
        config: AppConfig,
        nodes: Arc<dyn NodeStore>,
        shares: Arc<dyn ShareStore>,
        users: Arc<dyn UserDirectory>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let content = Arc::new(ContentManager::new(objects, &config.storage));
        let quota = Arc::new(QuotaService::new(nodes.clone(), config.storage.quota_bytes));
        let access = Arc::new(AccessResolver::new(nodes.clone(), shares.clone()));
        let links = Arc::new(LinkService::new(config.server.public_base_url.clone()));
        let max_upload = i64::try_from(config.server.max_upload_size_bytes).unwrap_or(i64::MAX);

        let tree_service = Arc::new(TreeService::new(
            nodes.clone(),
            shares.clone(),
            content.clone(),
            quota.clone(),
        ));
        let share_service = Arc::new(ShareService::new(
            nodes.clone(),
            shares.clone(),
            users.clone(),
            content.clone(),
            access.clone(),
            links,
        ));
        let upload_service = Arc::new(UploadService::new(
            nodes.clone(),
            content.clone(),
            quota.clone(),
            max_upload,
        ));
        let download_service = Arc::new(DownloadService::new(
            nodes.clone(),
            content.clone(),
            access.clone(),
        ));
        let browse_service = Arc::new(BrowseService::new(nodes, shares, access, quota));

        Self {
            jwt_decoder: Arc::new(JwtDecoder::new(&config.auth)),
            known_users: Arc::new(KnownUsers::new(users, &config.auth)),
            config: Arc::new(config),
            content,
            tree_service,
            share_service,
            upload_service,
            download_service,
            browse_service,
        }
    }
}
