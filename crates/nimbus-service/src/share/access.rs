//! Access resolution for owners, named grantees, and link holders.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_database::{NodeStore, ShareStore};
use nimbus_entity::node::Node;
use nimbus_entity::share::{AccessLevel, SharePermission};

use crate::context::Principal;

/// What a principal may do with a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "permission")]
pub enum ResolvedAccess {
    /// Nothing; treated as not-found by callers.
    NoAccess,
    /// The node's owner.
    Owner,
    /// Granted through a share.
    Shared(SharePermission),
}

impl ResolvedAccess {
    /// Effective permission tier. Owners act as editors.
    pub fn permission(&self) -> Option<SharePermission> {
        match self {
            Self::NoAccess => None,
            Self::Owner => Some(SharePermission::Editor),
            Self::Shared(permission) => Some(*permission),
        }
    }

    /// Whether the access reaches at least `required`.
    pub fn allows(&self, required: SharePermission) -> bool {
        self.permission()
            .is_some_and(|permission| permission.has_at_least(required))
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }

    fn max(self, other: Self) -> Self {
        match (self, other) {
            (Self::Owner, _) | (_, Self::Owner) => Self::Owner,
            (Self::NoAccess, x) | (x, Self::NoAccess) => x,
            (Self::Shared(a), Self::Shared(b)) => Self::Shared(a.max(b)),
        }
    }
}

/// Resolves [`ResolvedAccess`] from the node's current share rows.
#[derive(Clone)]
pub struct AccessResolver {
    nodes: Arc<dyn NodeStore>,
    shares: Arc<dyn ShareStore>,
}

impl std::fmt::Debug for AccessResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessResolver").finish()
    }
}

impl AccessResolver {
    /// Creates a new resolver.
    pub fn new(nodes: Arc<dyn NodeStore>, shares: Arc<dyn ShareStore>) -> Self {
        Self { nodes, shares }
    }

    /// Access granted by the node's own shares.
    ///
    /// An unexpired `anyone` link grants its permission to every principal,
    /// anonymous included. Named grants need an authenticated principal
    /// matching by id or email. The best matching tier wins. Trashed nodes
    /// resolve to `NoAccess` for everyone but the owner.
    pub async fn resolve(&self, node: &Node, principal: &Principal) -> AppResult<ResolvedAccess> {
        self.resolve_at(node, principal, Utc::now()).await
    }

    async fn resolve_at(
        &self,
        node: &Node,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> AppResult<ResolvedAccess> {
        if principal.user_id() == Some(node.owner_id) {
            return Ok(ResolvedAccess::Owner);
        }
        if node.is_trashed() {
            return Ok(ResolvedAccess::NoAccess);
        }

        let mut access = ResolvedAccess::NoAccess;
        if let Some(link) = self.shares.find_link_share(node.id).await? {
            if link.access_level == AccessLevel::Anyone && !link.is_expired_at(now) {
                access = access.max(ResolvedAccess::Shared(link.permission));
            }
        }

        if let Principal::User { user_id, email } = principal {
            let grants = self
                .shares
                .find_grants_for_principal(node.id, *user_id, email)
                .await?;
            for grant in grants.iter().filter(|g| !g.is_expired_at(now)) {
                access = access.max(ResolvedAccess::Shared(grant.permission));
            }
        }
        Ok(access)
    }

    /// Access through the node's own shares or those of any live ancestor.
    ///
    /// Used when browsing into a shared folder and for breadcrumbs: a grant
    /// on a folder covers everything below it.
    pub async fn resolve_inherited(
        &self,
        node: &Node,
        principal: &Principal,
    ) -> AppResult<ResolvedAccess> {
        let now = Utc::now();
        let mut access = self.resolve_at(node, principal, now).await?;
        if access.is_owner() || node.is_trashed() {
            return Ok(access);
        }

        let mut seen = HashSet::from([node.id]);
        let mut cursor = node.parent_id;
        while let Some(parent_id) = cursor {
            if !seen.insert(parent_id) {
                break;
            }
            let Some(parent) = self.nodes.find_by_id(parent_id).await? else {
                break;
            };
            if parent.is_trashed() {
                break;
            }
            access = access.max(self.resolve_at(&parent, principal, now).await?);
            cursor = parent.parent_id;
        }
        Ok(access)
    }

    /// Load a node and require at least `required` on it (inherited).
    ///
    /// Missing nodes and `NoAccess` are both `NotFound`; a principal that
    /// can see the node but lacks the tier gets `Forbidden`.
    pub async fn require(
        &self,
        node_id: Uuid,
        principal: &Principal,
        required: SharePermission,
    ) -> AppResult<(Node, ResolvedAccess)> {
        let node = self
            .nodes
            .find_by_id(node_id)
            .await?
            .ok_or_else(|| AppError::not_found("File not found"))?;

        let access = self.resolve_inherited(&node, principal).await?;
        match access {
            ResolvedAccess::NoAccess => Err(AppError::not_found("File not found")),
            _ if !access.allows(required) => Err(AppError::forbidden(format!(
                "This action requires {required} access"
            ))),
            _ => Ok((node, access)),
        }
    }
}
