//! In-memory Entity Store for tests and single-node development.
//!
//! Emulates the PostgreSQL constraints the services rely on: the live
//! sibling-name unique index, the one-link-per-node index, optimistic
//! version checks, `ON DELETE CASCADE` for shares and `ON DELETE SET NULL`
//! for children.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_entity::node::{NewNode, Node, NodeKind};
use nimbus_entity::share::{AccessLevel, GrantTarget, NewShare, Share, SharePermission};
use nimbus_entity::user::{UpsertUser, User};

use super::{Liveness, NodeFilter, NodeStore, ShareStore, UserDirectory, folders_first_by};

#[derive(Debug, Default)]
struct InnerState {
    nodes: HashMap<Uuid, Node>,
    shares: HashMap<Uuid, Share>,
    users: HashMap<Uuid, User>,
    /// Node ids whose writes fail, for exercising partial recursive operations.
    poisoned: HashSet<Uuid>,
}

impl InnerState {
    fn sibling_taken(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        is_folder: bool,
        name: &str,
        exclude: Option<Uuid>,
    ) -> bool {
        self.nodes.values().any(|n| {
            n.is_live()
                && n.owner_id == owner_id
                && n.parent_id == parent_id
                && n.is_folder == is_folder
                && n.name == name
                && Some(n.id) != exclude
        })
    }

    fn is_live_folder_of(&self, folder_id: Uuid, owner_id: Uuid) -> bool {
        self.nodes
            .get(&folder_id)
            .is_some_and(|p| p.is_folder && p.is_live() && p.owner_id == owner_id)
    }

    /// Whether `candidate` is `target` or one of its ancestors.
    fn is_ancestor_or_self(&self, candidate: Uuid, target: Uuid) -> bool {
        let mut cursor = Some(target);
        let mut seen = HashSet::new();
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent_id);
        }
        false
    }

    fn check_writable(&self, id: Uuid) -> AppResult<()> {
        if self.poisoned.contains(&id) {
            return Err(AppError::database(format!("Simulated write failure on {id}")));
        }
        Ok(())
    }

    fn live_versioned_mut(&mut self, id: Uuid, expected_version: i64) -> AppResult<&mut Node> {
        self.check_writable(id)?;
        match self.nodes.get_mut(&id) {
            Some(node) if node.is_live() && node.version == expected_version => Ok(node),
            _ => Err(version_conflict(id)),
        }
    }

    fn named_grants_for(&self, user_id: Uuid, email: &str) -> impl Iterator<Item = &Share> {
        self.shares
            .values()
            .filter(move |s| s.is_named() && s.targets(user_id, email))
    }
}

fn version_conflict(id: Uuid) -> AppError {
    AppError::conflict(format!("Node {id} was modified concurrently"))
}

fn sibling_conflict(is_folder: bool, name: &str) -> AppError {
    let kind = NodeKind::from_is_folder(is_folder);
    AppError::name_conflict(format!("A {kind} named '{name}' already exists here"))
}

/// Entity Store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write to a node fail.
    pub async fn poison(&self, id: Uuid) {
        self.state.lock().await.poisoned.insert(id);
    }

    /// Undo [`MemoryStore::poison`].
    pub async fn heal(&self, id: Uuid) {
        self.state.lock().await.poisoned.remove(&id);
    }

    /// Number of node rows in any state.
    pub async fn node_count(&self) -> usize {
        self.state.lock().await.nodes.len()
    }

    /// Number of share rows.
    pub async fn share_count(&self) -> usize {
        self.state.lock().await.shares.len()
    }

    /// Overwrite a share's expiry.
    pub async fn set_share_expiry(&self, id: Uuid, expires_at: Option<DateTime<Utc>>) {
        if let Some(share) = self.state.lock().await.shares.get_mut(&id) {
            share.expires_at = expires_at;
        }
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Node>> {
        Ok(self.state.lock().await.nodes.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Node>> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.nodes.get(id).cloned()).collect())
    }

    async fn find_sibling_by_name(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        kind: NodeKind,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Node>> {
        let state = self.state.lock().await;
        Ok(state
            .nodes
            .values()
            .find(|n| {
                n.is_live()
                    && n.owner_id == owner_id
                    && n.parent_id == parent_id
                    && n.kind() == kind
                    && n.name == name
                    && Some(n.id) != exclude
            })
            .cloned())
    }

    async fn sibling_names(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        kind: NodeKind,
    ) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .nodes
            .values()
            .filter(|n| {
                n.is_live() && n.owner_id == owner_id && n.parent_id == parent_id && n.kind() == kind
            })
            .map(|n| n.name.clone())
            .collect())
    }

    async fn list_children(&self, parent_id: Uuid, liveness: Liveness) -> AppResult<Vec<Node>> {
        let state = self.state.lock().await;
        let mut children: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| n.parent_id == Some(parent_id) && liveness.admits(n))
            .cloned()
            .collect();
        folders_first_by(&mut children, |n| n.created_at);
        Ok(children)
    }

    async fn list_filtered(&self, filter: &NodeFilter) -> AppResult<Vec<Node>> {
        let state = self.state.lock().await;

        let mut scope: HashSet<Option<Uuid>> = HashSet::from([filter.parent_id]);
        if filter.recursive {
            let mut frontier: Vec<Option<Uuid>> = vec![filter.parent_id];
            while let Some(parent) = frontier.pop() {
                for child in state.nodes.values() {
                    if child.is_folder
                        && child.is_live()
                        && child.owner_id == filter.owner_id
                        && child.parent_id == parent
                        && scope.insert(Some(child.id))
                    {
                        frontier.push(Some(child.id));
                    }
                }
            }
        }

        let mut nodes: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| {
                n.is_live()
                    && n.owner_id == filter.owner_id
                    && scope.contains(&n.parent_id)
                    && filter.admits(n)
            })
            .cloned()
            .collect();
        folders_first_by(&mut nodes, |n| n.created_at);
        Ok(nodes)
    }

    async fn list_trash(&self, owner_id: Uuid) -> AppResult<Vec<Node>> {
        let state = self.state.lock().await;
        let mut nodes: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| n.owner_id == owner_id && n.is_trashed())
            .cloned()
            .collect();
        folders_first_by(&mut nodes, |n| n.deleted_at.unwrap_or(n.updated_at));
        Ok(nodes)
    }

    async fn list_starred(&self, owner_id: Uuid) -> AppResult<Vec<Node>> {
        let state = self.state.lock().await;
        let mut nodes: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| n.owner_id == owner_id && n.is_live() && n.is_starred)
            .cloned()
            .collect();
        folders_first_by(&mut nodes, |n| n.updated_at);
        Ok(nodes)
    }

    async fn search(
        &self,
        owner_id: Uuid,
        needle: &str,
        include_deleted: bool,
        limit: i64,
    ) -> AppResult<Vec<Node>> {
        let needle = needle.to_lowercase();
        let state = self.state.lock().await;
        let mut nodes: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| {
                n.owner_id == owner_id
                    && (include_deleted || n.is_live())
                    && n.name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        folders_first_by(&mut nodes, |n| n.updated_at);
        nodes.truncate(limit.max(0) as usize);
        Ok(nodes)
    }

    async fn insert(&self, node: &NewNode) -> AppResult<Node> {
        let mut state = self.state.lock().await;

        if let Some(parent_id) = node.parent_id {
            if !state.is_live_folder_of(parent_id, node.owner_id) {
                return Err(AppError::not_found("Parent folder not found"));
            }
        }
        if state.nodes.contains_key(&node.id) {
            return Err(AppError::conflict(format!("Node {} already exists", node.id)));
        }
        if state.sibling_taken(node.owner_id, node.parent_id, node.is_folder, &node.name, None) {
            return Err(sibling_conflict(node.is_folder, &node.name));
        }

        let now = Utc::now();
        let row = Node {
            id: node.id,
            owner_id: node.owner_id,
            parent_id: node.parent_id,
            name: node.name.clone(),
            is_folder: node.is_folder,
            content_ref: node.content_ref.clone(),
            upload_key: node.upload_key.clone(),
            size: node.size,
            mime_type: node.mime_type.clone(),
            is_starred: node.is_starred,
            version: 0,
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
            deleted_at: None,
        };
        state.nodes.insert(row.id, row.clone());
        Ok(row)
    }

    async fn rename(&self, id: Uuid, expected_version: i64, name: &str) -> AppResult<Node> {
        let mut state = self.state.lock().await;
        let (owner_id, parent_id, is_folder) = {
            let node = state.live_versioned_mut(id, expected_version)?;
            (node.owner_id, node.parent_id, node.is_folder)
        };
        if state.sibling_taken(owner_id, parent_id, is_folder, name, Some(id)) {
            return Err(sibling_conflict(is_folder, name));
        }

        let node = state.live_versioned_mut(id, expected_version)?;
        node.name = name.to_string();
        node.version += 1;
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    async fn set_parent(
        &self,
        id: Uuid,
        expected_version: i64,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Node> {
        let mut state = self.state.lock().await;
        let (owner_id, is_folder) = {
            let node = state.live_versioned_mut(id, expected_version)?;
            (node.owner_id, node.is_folder)
        };
        if let Some(target) = parent_id {
            if !state.is_live_folder_of(target, owner_id) || state.is_ancestor_or_self(id, target) {
                return Err(version_conflict(id));
            }
        }
        if state.sibling_taken(owner_id, parent_id, is_folder, name, Some(id)) {
            return Err(sibling_conflict(is_folder, name));
        }

        let node = state.live_versioned_mut(id, expected_version)?;
        node.parent_id = parent_id;
        node.name = name.to_string();
        node.version += 1;
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    async fn set_starred(&self, id: Uuid, expected_version: i64, starred: bool) -> AppResult<Node> {
        let mut state = self.state.lock().await;
        let node = state.live_versioned_mut(id, expected_version)?;
        node.is_starred = starred;
        node.version += 1;
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;
        match state.nodes.get_mut(&id) {
            Some(node) if node.is_live() => {
                node.deleted_at = Some(at);
                node.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_restored(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<Node>> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;

        let (owner_id, is_folder) = match state.nodes.get(&id) {
            Some(node) if node.is_trashed() => (node.owner_id, node.is_folder),
            _ => return Ok(None),
        };
        if let Some(target) = parent_id {
            if !state.is_live_folder_of(target, owner_id) {
                return Ok(None);
            }
        }
        if state.sibling_taken(owner_id, parent_id, is_folder, name, Some(id)) {
            return Err(sibling_conflict(is_folder, name));
        }

        let Some(node) = state.nodes.get_mut(&id) else {
            return Ok(None);
        };
        node.deleted_at = None;
        node.parent_id = parent_id;
        node.name = name.to_string();
        node.version += 1;
        node.updated_at = Utc::now();
        Ok(Some(node.clone()))
    }

    async fn commit_content(&self, id: Uuid, content_ref: &str, size: i64) -> AppResult<Node> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;
        match state.nodes.get_mut(&id) {
            Some(node) if node.is_live() && !node.is_folder => {
                node.content_ref = Some(content_ref.to_string());
                node.size = size;
                node.version += 1;
                node.updated_at = Utc::now();
                Ok(node.clone())
            }
            _ => Err(AppError::not_found("File not found")),
        }
    }

    async fn touch_accessed(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(node) = state.nodes.get_mut(&id) {
            node.last_accessed_at = Some(at);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;
        if !state.nodes.get(&id).is_some_and(Node::is_trashed) {
            return Ok(false);
        }

        state.nodes.remove(&id);
        state.shares.retain(|_, s| s.node_id != id);
        for child in state.nodes.values_mut() {
            if child.parent_id == Some(id) {
                child.parent_id = None;
            }
        }
        Ok(true)
    }

    async fn list_pending_uploads(
        &self,
        owner_id: Uuid,
        created_before: DateTime<Utc>,
    ) -> AppResult<Vec<Node>> {
        let state = self.state.lock().await;
        let mut nodes: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| {
                n.owner_id == owner_id
                    && n.is_live()
                    && n.is_pending_upload()
                    && n.created_at < created_before
            })
            .cloned()
            .collect();
        nodes.sort_by_key(|n| n.created_at);
        Ok(nodes)
    }

    async fn discard_pending_upload(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;
        if !state.nodes.get(&id).is_some_and(Node::is_pending_upload) {
            return Ok(false);
        }

        state.nodes.remove(&id);
        state.shares.retain(|_, s| s.node_id != id);
        Ok(true)
    }

    async fn usage(&self, owner_id: Uuid) -> AppResult<(i64, i64)> {
        let state = self.state.lock().await;
        Ok(state
            .nodes
            .values()
            .filter(|n| n.owner_id == owner_id && n.is_live() && !n.is_folder)
            .fold((0, 0), |(bytes, count), n| (bytes + n.size, count + 1)))
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Share>> {
        Ok(self.state.lock().await.shares.get(&id).cloned())
    }

    async fn find_link_share(&self, node_id: Uuid) -> AppResult<Option<Share>> {
        let state = self.state.lock().await;
        Ok(state
            .shares
            .values()
            .find(|s| s.node_id == node_id && s.is_link())
            .cloned())
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Share>> {
        let state = self.state.lock().await;
        Ok(state
            .shares
            .values()
            .find(|s| s.token.as_deref() == Some(token))
            .cloned())
    }

    async fn list_for_node(&self, node_id: Uuid) -> AppResult<Vec<Share>> {
        let state = self.state.lock().await;
        let mut shares: Vec<Share> = state
            .shares
            .values()
            .filter(|s| s.node_id == node_id)
            .cloned()
            .collect();
        shares.sort_by_key(|s| s.created_at);
        Ok(shares)
    }

    async fn find_named_grant(
        &self,
        node_id: Uuid,
        target: &GrantTarget,
    ) -> AppResult<Option<Share>> {
        let state = self.state.lock().await;
        Ok(state
            .shares
            .values()
            .find(|s| {
                s.node_id == node_id
                    && match target {
                        GrantTarget::User(user_id) => s.shared_with_user_id == Some(*user_id),
                        GrantTarget::Email(email) => s
                            .shared_with_email
                            .as_deref()
                            .is_some_and(|e| e.eq_ignore_ascii_case(email)),
                    }
            })
            .cloned())
    }

    async fn find_grants_for_principal(
        &self,
        node_id: Uuid,
        user_id: Uuid,
        email: &str,
    ) -> AppResult<Vec<Share>> {
        let state = self.state.lock().await;
        Ok(state
            .named_grants_for(user_id, email)
            .filter(|s| s.node_id == node_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, share: &NewShare) -> AppResult<Share> {
        let mut state = self.state.lock().await;

        if !state.nodes.contains_key(&share.node_id) {
            return Err(AppError::not_found("File not found"));
        }
        if share.token.is_some()
            && state
                .shares
                .values()
                .any(|s| s.node_id == share.node_id && s.is_link())
        {
            return Err(AppError::conflict("A share link already exists for this file"));
        }

        let now = Utc::now();
        let row = Share {
            id: Uuid::new_v4(),
            node_id: share.node_id,
            grantor_id: share.grantor_id,
            access_level: share.access_level,
            permission: share.permission,
            token: share.token.clone(),
            shared_with_user_id: share.shared_with_user_id(),
            shared_with_email: share.shared_with_email().map(str::to_string),
            expires_at: share.expires_at,
            created_at: now,
            updated_at: now,
        };
        state.shares.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_link(
        &self,
        id: Uuid,
        access_level: AccessLevel,
        permission: SharePermission,
    ) -> AppResult<Share> {
        let mut state = self.state.lock().await;
        let share = state
            .shares
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Share not found"))?;
        share.access_level = access_level;
        share.permission = permission;
        share.updated_at = Utc::now();
        Ok(share.clone())
    }

    async fn update_permission(&self, id: Uuid, permission: SharePermission) -> AppResult<Share> {
        let mut state = self.state.lock().await;
        let share = state
            .shares
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Share not found"))?;
        share.permission = permission;
        share.updated_at = Utc::now();
        Ok(share.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.state.lock().await.shares.remove(&id).is_some())
    }

    async fn delete_for_node(&self, node_id: Uuid) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.shares.len();
        state.shares.retain(|_, s| s.node_id != node_id);
        Ok((before - state.shares.len()) as u64)
    }

    async fn list_shared_with(&self, user_id: Uuid, email: &str) -> AppResult<Vec<Share>> {
        let state = self.state.lock().await;
        let mut shares: Vec<Share> = state.named_grants_for(user_id, email).cloned().collect();
        shares.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(shares)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    async fn upsert(&self, user: &UpsertUser) -> AppResult<User> {
        let mut state = self.state.lock().await;
        let email = user.email.trim().to_lowercase();

        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == email)
        {
            return Err(AppError::conflict(format!("Email {email} belongs to another user")));
        }

        let now = Utc::now();
        let row = state.users.entry(user.id).or_insert_with(|| User {
            id: user.id,
            email: email.clone(),
            name: None,
            image: None,
            created_at: now,
            updated_at: now,
        });
        row.email = email;
        row.name = user.name.clone();
        row.image = user.image.clone();
        row.updated_at = now;
        Ok(row.clone())
    }
}
