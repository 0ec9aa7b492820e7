//! Read-side views: listings, trash, starred, search, breadcrumbs, shared-with-me.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_database::store::folders_first_by;
use nimbus_database::{NodeFilter, NodeStore, ShareStore};
use nimbus_entity::node::Node;
use nimbus_entity::share::SharePermission;

use super::filter::ListQuery;
use crate::context::RequestContext;
use crate::share::{AccessResolver, ResolvedAccess};
use crate::storage::{QuotaService, StorageSummary};

/// Longest accepted search text, in characters.
pub const MAX_QUERY_CHARS: usize = 200;
/// Results returned when the caller gives no limit.
pub const DEFAULT_SEARCH_LIMIT: i64 = 50;
/// Hard ceiling on search results.
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// One step of a breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub id: Uuid,
    pub name: String,
}

/// A node someone else shared with the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SharedNode {
    #[serde(flatten)]
    pub node: Node,
    /// Best unexpired grant the caller holds on it.
    pub permission: SharePermission,
}

/// Listing and lookup use cases.
#[derive(Clone)]
pub struct BrowseService {
    nodes: Arc<dyn NodeStore>,
    shares: Arc<dyn ShareStore>,
    access: Arc<AccessResolver>,
    quota: Arc<QuotaService>,
}

impl std::fmt::Debug for BrowseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowseService").finish()
    }
}

impl BrowseService {
    /// Creates a new browse service.
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        shares: Arc<dyn ShareStore>,
        access: Arc<AccessResolver>,
        quota: Arc<QuotaService>,
    ) -> Self {
        Self {
            nodes,
            shares,
            access,
            quota,
        }
    }

    /// List a folder (or the root) with optional filters.
    ///
    /// A folder owned by someone else is listed when the caller can view
    /// it, directly or through an ancestor; the owner's live children are
    /// returned in that case.
    pub async fn list(&self, ctx: &RequestContext, query: &ListQuery) -> AppResult<Vec<Node>> {
        let mut owner_id = ctx.user_id;
        if let Some(parent_id) = query.parent_id {
            let folder = self
                .nodes
                .find_by_id(parent_id)
                .await?
                .filter(|n| n.is_folder && n.is_live())
                .ok_or_else(|| AppError::not_found("Folder not found"))?;
            if !folder.is_owned_by(ctx.user_id) {
                let access = self
                    .access
                    .resolve_inherited(&folder, &ctx.principal())
                    .await?;
                if !access.allows(SharePermission::Viewer) {
                    return Err(AppError::not_found("Folder not found"));
                }
                owner_id = folder.owner_id;
            }
        }

        let (updated_from, updated_before) = query
            .modified
            .map_or((None, None), |m| m.bounds(Utc::now()));
        let filter = NodeFilter {
            owner_id,
            parent_id: query.parent_id,
            recursive: query.recursive,
            category: query.category,
            updated_from,
            updated_before,
        };
        self.nodes.list_filtered(&filter).await
    }

    /// Everything in the caller's trash.
    pub async fn trash(&self, ctx: &RequestContext) -> AppResult<Vec<Node>> {
        self.nodes.list_trash(ctx.user_id).await
    }

    /// The caller's live starred nodes.
    pub async fn starred(&self, ctx: &RequestContext) -> AppResult<Vec<Node>> {
        self.nodes.list_starred(ctx.user_id).await
    }

    /// Case-insensitive name search over the caller's nodes.
    pub async fn search(
        &self,
        ctx: &RequestContext,
        query: &str,
        limit: Option<i64>,
        include_deleted: bool,
    ) -> AppResult<Vec<Node>> {
        let needle = query.trim();
        if needle.is_empty() {
            return Err(AppError::validation("Search query is required"));
        }
        if needle.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::validation(format!(
                "Search query cannot be longer than {MAX_QUERY_CHARS} characters"
            )));
        }
        let limit = limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);
        self.nodes
            .search(ctx.user_id, needle, include_deleted, limit)
            .await
    }

    /// Ancestor chain from the top-most visible folder down to the node.
    ///
    /// Owners see the chain up to the root. Grantees see it from the
    /// highest ancestor they hold a grant on.
    pub async fn breadcrumb(&self, ctx: &RequestContext, node_id: Uuid) -> AppResult<Vec<Crumb>> {
        let principal = ctx.principal();
        let node = self
            .nodes
            .find_by_id(node_id)
            .await?
            .filter(Node::is_live)
            .ok_or_else(|| AppError::not_found("File not found"))?;
        let access = self.access.resolve_inherited(&node, &principal).await?;
        if access == ResolvedAccess::NoAccess {
            return Err(AppError::not_found("File not found"));
        }

        let mut chain = vec![node.clone()];
        let mut cursor = node.parent_id;
        while let Some(parent_id) = cursor {
            if chain.iter().any(|n| n.id == parent_id) {
                break;
            }
            let Some(parent) = self.nodes.find_by_id(parent_id).await?.filter(Node::is_live) else {
                break;
            };
            cursor = parent.parent_id;
            chain.push(parent);
        }

        if !access.is_owner() {
            // Keep everything up to the highest ancestor with a direct grant.
            let mut top = 0;
            for (index, member) in chain.iter().enumerate() {
                if self.access.resolve(member, &principal).await? != ResolvedAccess::NoAccess {
                    top = index;
                }
            }
            chain.truncate(top + 1);
        }

        Ok(chain
            .into_iter()
            .rev()
            .map(|n| Crumb {
                id: n.id,
                name: n.name,
            })
            .collect())
    }

    /// Live nodes carrying an unexpired named grant for the caller.
    pub async fn shared_with_me(
        &self,
        ctx: &RequestContext,
        query: &ListQuery,
    ) -> AppResult<Vec<SharedNode>> {
        let now = Utc::now();
        let mut best: HashMap<Uuid, SharePermission> = HashMap::new();
        for grant in self.shares.list_shared_with(ctx.user_id, &ctx.email).await? {
            if grant.is_expired_at(now) {
                continue;
            }
            best.entry(grant.node_id)
                .and_modify(|p| *p = (*p).max(grant.permission))
                .or_insert(grant.permission);
        }
        if best.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = best.keys().copied().collect();
        let (updated_from, updated_before) = query
            .modified
            .map_or((None, None), |m| m.bounds(now));
        let filter = NodeFilter {
            owner_id: ctx.user_id,
            parent_id: None,
            recursive: false,
            category: query.category,
            updated_from,
            updated_before,
        };

        let mut nodes: Vec<Node> = self
            .nodes
            .find_many(&ids)
            .await?
            .into_iter()
            .filter(|n| n.is_live() && !n.is_owned_by(ctx.user_id) && filter.admits(n))
            .collect();
        folders_first_by(&mut nodes, |n| n.updated_at);

        Ok(nodes
            .into_iter()
            .filter_map(|node| {
                let permission = best.get(&node.id).copied()?;
                Some(SharedNode { node, permission })
            })
            .collect())
    }

    /// Usage summary of the caller.
    pub async fn storage(&self, ctx: &RequestContext) -> AppResult<StorageSummary> {
        self.quota.summary(ctx.user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use nimbus_core::error::ErrorKind;
    use nimbus_entity::share::{GrantTarget, NewShare};

    fn service(fx: &Fixture) -> BrowseService {
        let store = Arc::new(fx.store.clone());
        BrowseService::new(
            store.clone(),
            store.clone(),
            Arc::new(AccessResolver::new(store.clone(), store)),
            fx.quota.clone(),
        )
    }

    async fn grant(fx: &Fixture, node_id: Uuid, to: &Fixture, permission: SharePermission) {
        ShareStore::insert(
            &fx.store,
            &NewShare::named(node_id, fx.ctx.user_id, GrantTarget::User(to.ctx.user_id), permission),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_list_folders_first_and_filters() {
        let fx = Fixture::new();
        let browse = service(&fx);
        let docs = fx.tree.create_folder(&fx.ctx, None, "Docs").await.unwrap();
        fx.file(None, "a.txt", 1).await;
        fx.file(Some(docs.id), "nested.txt", 1).await;

        let root = browse.list(&fx.ctx, &ListQuery::default()).await.unwrap();
        assert_eq!(root.len(), 2);
        assert!(root[0].is_folder);

        let all = browse
            .list(&fx.ctx, &ListQuery::parse(None, None, None, true).unwrap())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let folders = browse
            .list(&fx.ctx, &ListQuery::parse(None, Some("folders"), Some("today"), true).unwrap())
            .await
            .unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].id, docs.id);

        let last_year = browse
            .list(&fx.ctx, &ListQuery::parse(None, None, Some("lastyear"), true).unwrap())
            .await
            .unwrap();
        assert!(last_year.is_empty());
    }

    #[tokio::test]
    async fn test_list_shared_folder_for_grantee() {
        let owner = Fixture::new();
        let guest = Fixture::with_store(owner.store.clone(), owner.objects.clone());
        let browse = service(&owner);
        let folder = owner.tree.create_folder(&owner.ctx, None, "Team").await.unwrap();
        owner.file(Some(folder.id), "plan.txt", 1).await;

        let query = ListQuery {
            parent_id: Some(folder.id),
            ..Default::default()
        };
        let err = browse.list(&guest.ctx, &query).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));

        grant(&owner, folder.id, &guest, SharePermission::Viewer).await;
        let children = browse.list(&guest.ctx, &query).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "plan.txt");
    }

    #[tokio::test]
    async fn test_search_validation_and_limit() {
        let fx = Fixture::new();
        let browse = service(&fx);
        for i in 0..3 {
            fx.file(None, &format!("Report {i}.txt"), 1).await;
        }
        let gone = fx.file(None, "report old.txt", 1).await;
        fx.tree.soft_delete(&fx.ctx, gone.id).await.unwrap();

        assert!(browse.search(&fx.ctx, "   ", None, false).await.is_err());
        assert!(browse.search(&fx.ctx, &"x".repeat(201), None, false).await.is_err());

        let hits = browse.search(&fx.ctx, " REPORT ", None, false).await.unwrap();
        assert_eq!(hits.len(), 3);
        let hits = browse.search(&fx.ctx, "report", Some(2), false).await.unwrap();
        assert_eq!(hits.len(), 2);
        let hits = browse.search(&fx.ctx, "report", None, true).await.unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[tokio::test]
    async fn test_breadcrumb_for_owner_and_grantee() {
        let owner = Fixture::new();
        let guest = Fixture::with_store(owner.store.clone(), owner.objects.clone());
        let browse = service(&owner);
        let a = owner.tree.create_folder(&owner.ctx, None, "A").await.unwrap();
        let b = owner.tree.create_folder(&owner.ctx, Some(a.id), "B").await.unwrap();
        let c = owner.tree.create_folder(&owner.ctx, Some(b.id), "C").await.unwrap();

        let names = |crumbs: Vec<Crumb>| crumbs.into_iter().map(|c| c.name).collect::<Vec<_>>();
        assert_eq!(names(browse.breadcrumb(&owner.ctx, c.id).await.unwrap()), ["A", "B", "C"]);

        let err = browse.breadcrumb(&guest.ctx, c.id).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));

        grant(&owner, b.id, &guest, SharePermission::Viewer).await;
        assert_eq!(names(browse.breadcrumb(&guest.ctx, c.id).await.unwrap()), ["B", "C"]);
    }

    #[tokio::test]
    async fn test_shared_with_me_skips_trashed_and_expired() {
        let owner = Fixture::new();
        let guest = Fixture::with_store(owner.store.clone(), owner.objects.clone());
        let browse = service(&owner);
        let live = owner.file(None, "live.txt", 1).await;
        let trashed = owner.file(None, "trashed.txt", 1).await;
        let expired = owner.file(None, "expired.txt", 1).await;

        grant(&owner, live.id, &guest, SharePermission::Viewer).await;
        grant(&owner, live.id, &guest, SharePermission::Editor).await;
        grant(&owner, trashed.id, &guest, SharePermission::Viewer).await;
        owner.tree.soft_delete(&owner.ctx, trashed.id).await.unwrap();
        let share = ShareStore::insert(
            &owner.store,
            &NewShare::named(
                expired.id,
                owner.ctx.user_id,
                GrantTarget::Email(guest.ctx.email.clone()),
                SharePermission::Viewer,
            ),
        )
        .await
        .unwrap();
        owner
            .store
            .set_share_expiry(share.id, Some(Utc::now() - chrono::Duration::seconds(5)))
            .await;

        let shared = browse
            .shared_with_me(&guest.ctx, &ListQuery::default())
            .await
            .unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].node.id, live.id);
        assert_eq!(shared[0].permission, SharePermission::Editor);
    }

    #[tokio::test]
    async fn test_storage_summary() {
        let fx = Fixture::with_quota(1024);
        let browse = service(&fx);
        fx.file(None, "a.txt", 512).await;

        let summary = browse.storage(&fx.ctx).await.unwrap();
        assert_eq!(summary.usage.used_bytes, 512);
        assert_eq!(summary.usage.file_count, 1);
        assert_eq!(summary.usage.percentage, 50.0);
        assert_eq!(summary.used_formatted, "512 B");
    }
}
