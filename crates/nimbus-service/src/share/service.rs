//! Share management: link settings, named grants, and the public token surface.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_database::{NodeStore, ShareStore, UserDirectory};
use nimbus_entity::node::Node;
use nimbus_entity::share::{AccessLevel, GrantTarget, NewShare, Share, SharePermission};

use super::access::{AccessResolver, ResolvedAccess};
use super::link::LinkService;
use crate::content::ContentManager;
use crate::context::{Principal, RequestContext};
use crate::file::FileDownload;

/// Every denial on the public token surface collapses into this message.
pub const UNABLE_TO_OPEN: &str =
    "Sorry, unable to open the file at present. Please check the address and try again.";

fn unable_to_open() -> AppError {
    AppError::not_found(UNABLE_TO_OPEN)
}

/// Link settings as returned to the owner.
#[derive(Debug, Clone, Serialize)]
pub struct LinkShareView {
    pub access_level: AccessLevel,
    pub permission: SharePermission,
    pub share_link: String,
}

/// Whether a person entry is the owner or a grantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    Owner,
    Grantee,
}

/// One row of the "people with access" list.
#[derive(Debug, Clone, Serialize)]
pub struct SharePerson {
    /// The named grant backing this entry (None for the owner).
    pub share_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    pub permission: SharePermission,
    pub role: PersonRole,
}

/// Sharing state of a node.
#[derive(Debug, Clone, Serialize)]
pub struct ShareInfo {
    pub access_level: AccessLevel,
    pub permission: SharePermission,
    pub share_link: Option<String>,
    /// Owner first, then each named grant.
    pub people: Vec<SharePerson>,
}

/// Per-address result of adding people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantStatus {
    Added,
    Updated,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrantOutcome {
    pub email: String,
    pub status: GrantStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GrantOutcome {
    fn failed(email: String, message: impl Into<String>) -> Self {
        Self {
            email,
            status: GrantStatus::Failed,
            share_id: None,
            message: Some(message.into()),
        }
    }
}

/// What a token holder may see of a node.
#[derive(Debug, Clone, Serialize)]
pub struct PublicNode {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub is_folder: bool,
    pub size: i64,
    pub permission: SharePermission,
    pub owner_name: String,
}

/// Sharing & Access Resolution use cases.
#[derive(Clone)]
pub struct ShareService {
    nodes: Arc<dyn NodeStore>,
    shares: Arc<dyn ShareStore>,
    users: Arc<dyn UserDirectory>,
    content: Arc<ContentManager>,
    access: Arc<AccessResolver>,
    links: Arc<LinkService>,
}

impl std::fmt::Debug for ShareService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareService")
            .field("links", &self.links)
            .finish()
    }
}

impl ShareService {
    /// Creates a new share service.
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        shares: Arc<dyn ShareStore>,
        users: Arc<dyn UserDirectory>,
        content: Arc<ContentManager>,
        access: Arc<AccessResolver>,
        links: Arc<LinkService>,
    ) -> Self {
        Self {
            nodes,
            shares,
            users,
            content,
            access,
            links,
        }
    }

    async fn owned_live_node(&self, ctx: &RequestContext, node_id: Uuid) -> AppResult<Node> {
        self.nodes
            .find_by_id(node_id)
            .await?
            .filter(|n| n.is_owned_by(ctx.user_id) && n.is_live())
            .ok_or_else(|| AppError::not_found("File not found"))
    }

    /// The node's link share, minted with the given settings if absent.
    ///
    /// Returns the share and whether it was created by this call. A lost
    /// race on the one-link-per-node constraint re-reads the winner.
    async fn link_share(
        &self,
        node: &Node,
        grantor_id: Uuid,
        access_level: AccessLevel,
        permission: SharePermission,
    ) -> AppResult<(Share, bool)> {
        if let Some(existing) = self.shares.find_link_share(node.id).await? {
            return Ok((existing, false));
        }

        let token = self.links.generate_token();
        let new_share = NewShare::link(node.id, grantor_id, access_level, permission, token);
        match self.shares.insert(&new_share).await {
            Ok(share) => {
                info!(node_id = %node.id, share_id = %share.id, "Share link minted");
                Ok((share, true))
            }
            Err(e) if e.is(ErrorKind::Conflict) => {
                debug!(node_id = %node.id, "Share link minted concurrently, reusing it");
                let share = self
                    .shares
                    .find_link_share(node.id)
                    .await?
                    .ok_or(e)?;
                Ok((share, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Find or create the node's link share and apply the requested settings.
    ///
    /// The token is minted once and survives every later settings change.
    pub async fn ensure_link_share(
        &self,
        ctx: &RequestContext,
        node_id: Uuid,
        access_level: Option<AccessLevel>,
        permission: Option<SharePermission>,
    ) -> AppResult<LinkShareView> {
        let node = self.owned_live_node(ctx, node_id).await?;
        let (share, created) = self
            .link_share(
                &node,
                ctx.user_id,
                access_level.unwrap_or(AccessLevel::Restricted),
                permission.unwrap_or_default(),
            )
            .await?;

        let wanted_level = access_level.unwrap_or(share.access_level);
        let wanted_permission = permission.unwrap_or(share.permission);
        let share = if !created
            && (wanted_level != share.access_level || wanted_permission != share.permission)
        {
            let updated = self
                .shares
                .update_link(share.id, wanted_level, wanted_permission)
                .await?;
            info!(
                user_id = %ctx.user_id,
                node_id = %node.id,
                access_level = %updated.access_level,
                permission = %updated.permission,
                "Share link updated"
            );
            updated
        } else {
            share
        };

        self.link_view(&share)
    }

    fn link_view(&self, share: &Share) -> AppResult<LinkShareView> {
        let token = share
            .token
            .as_deref()
            .ok_or_else(|| AppError::internal("Link share without a token"))?;
        Ok(LinkShareView {
            access_level: share.access_level,
            permission: share.permission,
            share_link: self.links.share_url(token),
        })
    }

    /// The public URL of the node's link.
    pub async fn copy_link(&self, ctx: &RequestContext, node_id: Uuid) -> AppResult<String> {
        self.owned_live_node(ctx, node_id).await?;
        let share = self
            .shares
            .find_link_share(node_id)
            .await?
            .ok_or_else(unable_to_open)?;
        let token = share.token.as_deref().ok_or_else(unable_to_open)?;
        Ok(self.links.share_url(token))
    }

    /// Link settings and the people with access, owner first.
    pub async fn share_info(&self, ctx: &RequestContext, node_id: Uuid) -> AppResult<ShareInfo> {
        self.owned_live_node(ctx, node_id).await?;
        let shares = self.shares.list_for_node(node_id).await?;
        let link = shares.iter().find(|s| s.is_link());

        let mut people = Vec::with_capacity(shares.len() + 1);
        people.push(SharePerson {
            share_id: None,
            email: ctx.email.clone(),
            name: ctx
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| ctx.email.clone()),
            permission: SharePermission::Editor,
            role: PersonRole::Owner,
        });

        for grant in shares.iter().filter(|s| s.is_named()) {
            let user = match grant.shared_with_user_id {
                Some(user_id) => self.users.find_by_id(user_id).await?,
                None => None,
            };
            let fallback = grant.shared_with_email.clone().unwrap_or_default();
            let (email, name) = match user {
                Some(user) => (user.email.clone(), user.display_name().to_string()),
                None if fallback.is_empty() => (fallback, "Unknown".to_string()),
                None => (fallback.clone(), fallback),
            };
            people.push(SharePerson {
                share_id: Some(grant.id),
                email,
                name,
                permission: grant.permission,
                role: PersonRole::Grantee,
            });
        }

        Ok(ShareInfo {
            access_level: link.map_or(AccessLevel::Restricted, |s| s.access_level),
            permission: link
                .or(shares.first())
                .map_or(SharePermission::Viewer, |s| s.permission),
            share_link: link
                .and_then(|s| s.token.as_deref())
                .map(|t| self.links.share_url(t)),
            people,
        })
    }

    /// Grant `permission` to each address.
    ///
    /// Mints a restricted link first if the node has none. Addresses are
    /// trimmed and lower-cased; known users are granted by id, others by
    /// address. An existing grant for the same target has its permission
    /// replaced. Each address succeeds or fails on its own.
    pub async fn add_named_grants(
        &self,
        ctx: &RequestContext,
        node_id: Uuid,
        emails: &[String],
        permission: SharePermission,
    ) -> AppResult<Vec<GrantOutcome>> {
        let node = self.owned_live_node(ctx, node_id).await?;
        if emails.iter().all(|e| e.trim().is_empty()) {
            return Err(AppError::validation("At least one email address is required"));
        }

        self.link_share(&node, ctx.user_id, AccessLevel::Restricted, permission)
            .await?;

        let mut seen = HashSet::new();
        let mut outcomes = Vec::with_capacity(emails.len());
        for raw in emails {
            let email = raw.trim().to_lowercase();
            if email.is_empty() || !seen.insert(email.clone()) || email == ctx.email {
                continue;
            }
            if !email.validate_email() {
                outcomes.push(GrantOutcome::failed(email, "Invalid email address"));
                continue;
            }

            let outcome = match self.grant_one(ctx, &node, &email, permission).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(node_id = %node.id, email = %email, error = %e, "Failed to share with address");
                    GrantOutcome::failed(email, e.message.clone())
                }
            };
            outcomes.push(outcome);
        }

        info!(
            user_id = %ctx.user_id,
            node_id = %node.id,
            permission = %permission,
            granted = outcomes.iter().filter(|o| o.status != GrantStatus::Failed).count(),
            failed = outcomes.iter().filter(|o| o.status == GrantStatus::Failed).count(),
            "Shared with people"
        );
        Ok(outcomes)
    }

    async fn grant_one(
        &self,
        ctx: &RequestContext,
        node: &Node,
        email: &str,
        permission: SharePermission,
    ) -> AppResult<GrantOutcome> {
        let by_email = GrantTarget::Email(email.to_string());
        let target = match self.users.find_by_email(email).await? {
            Some(user) if user.id == ctx.user_id => {
                return Err(AppError::validation("You already own this file"));
            }
            Some(user) => GrantTarget::User(user.id),
            None => by_email.clone(),
        };

        let mut existing = self.shares.find_named_grant(node.id, &target).await?;
        if existing.is_none() && target != by_email {
            // Granted by address before the user registered.
            existing = self.shares.find_named_grant(node.id, &by_email).await?;
        }

        let (share, status) = match existing {
            Some(share) if share.permission == permission => (share, GrantStatus::Updated),
            Some(share) => (
                self.shares.update_permission(share.id, permission).await?,
                GrantStatus::Updated,
            ),
            None => (
                self.shares
                    .insert(&NewShare::named(node.id, ctx.user_id, target, permission))
                    .await?,
                GrantStatus::Added,
            ),
        };

        Ok(GrantOutcome {
            email: email.to_string(),
            status,
            share_id: Some(share.id),
            message: None,
        })
    }

    async fn named_grant_on(&self, node_id: Uuid, share_id: Uuid) -> AppResult<Share> {
        self.shares
            .find_by_id(share_id)
            .await?
            .filter(|s| s.node_id == node_id && s.is_named())
            .ok_or_else(|| AppError::not_found("Share not found"))
    }

    /// Change one grantee's permission.
    pub async fn update_person(
        &self,
        ctx: &RequestContext,
        node_id: Uuid,
        share_id: Uuid,
        permission: SharePermission,
    ) -> AppResult<Share> {
        self.owned_live_node(ctx, node_id).await?;
        let grant = self.named_grant_on(node_id, share_id).await?;
        if grant.permission == permission {
            return Ok(grant);
        }
        let updated = self.shares.update_permission(grant.id, permission).await?;
        info!(
            user_id = %ctx.user_id,
            node_id = %node_id,
            share_id = %share_id,
            permission = %permission,
            "Grant updated"
        );
        Ok(updated)
    }

    /// Revoke one grantee.
    pub async fn remove_person(
        &self,
        ctx: &RequestContext,
        node_id: Uuid,
        share_id: Uuid,
    ) -> AppResult<()> {
        self.owned_live_node(ctx, node_id).await?;
        let grant = self.named_grant_on(node_id, share_id).await?;
        self.shares.delete(grant.id).await?;
        info!(user_id = %ctx.user_id, node_id = %node_id, share_id = %share_id, "Grant removed");
        Ok(())
    }

    /// Resolve a token to its node and the caller's access.
    ///
    /// Unknown and expired tokens, trashed nodes, and callers without
    /// access all fail with the same message.
    async fn open_token(&self, token: &str, principal: &Principal) -> AppResult<(Node, ResolvedAccess)> {
        let token = token.trim();
        if token.is_empty() {
            return Err(unable_to_open());
        }
        let share = self
            .shares
            .find_by_token(token)
            .await?
            .filter(Share::is_valid)
            .ok_or_else(unable_to_open)?;
        let node = self
            .nodes
            .find_by_id(share.node_id)
            .await?
            .filter(Node::is_live)
            .ok_or_else(unable_to_open)?;

        let access = self.access.resolve(&node, principal).await?;
        if !access.allows(SharePermission::Viewer) {
            debug!(share_id = %share.id, "Token holder has no access");
            return Err(unable_to_open());
        }
        Ok((node, access))
    }

    /// The public projection of a shared node.
    pub async fn public_view(&self, token: &str, principal: &Principal) -> AppResult<PublicNode> {
        let (node, access) = self.open_token(token, principal).await?;
        let owner_name = self
            .users
            .find_by_id(node.owner_id)
            .await?
            .map_or_else(|| "Unknown".to_string(), |u| u.display_name().to_string());

        Ok(PublicNode {
            id: node.id,
            name: node.name,
            mime_type: node.mime_type,
            is_folder: node.is_folder,
            size: node.size,
            permission: access.permission().unwrap_or_default(),
            owner_name,
        })
    }

    /// Stream a shared file's bytes.
    pub async fn public_download(&self, token: &str, principal: &Principal) -> AppResult<FileDownload> {
        let (node, _) = self.open_token(token, principal).await?;
        if node.is_folder {
            return Err(AppError::invalid_operation("Folders cannot be downloaded"));
        }
        let key = node.content_ref.clone().ok_or_else(unable_to_open)?;
        let body = self.content.open(&key).await?;

        if let Err(e) = self.nodes.touch_accessed(node.id, Utc::now()).await {
            debug!(node_id = %node.id, error = %e, "Failed to record access");
        }
        info!(node_id = %node.id, principal = ?principal.user_id(), "Shared file downloaded");
        Ok(FileDownload { node, body })
    }
}
