//! Shared fixtures for service tests.

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use nimbus_core::config::StorageConfig;
use nimbus_core::traits::storage::{ObjectStore, PutOptions};
use nimbus_database::{MemoryStore, NodeStore, UserDirectory};
use nimbus_entity::node::{NewNode, Node};
use nimbus_entity::user::UpsertUser;
use nimbus_storage::MemoryObjectStore;

use crate::content::ContentManager;
use crate::context::RequestContext;
use crate::storage::QuotaService;
use crate::tree::TreeService;

/// One user acting on in-memory stores.
pub struct Fixture {
    pub store: MemoryStore,
    pub objects: MemoryObjectStore,
    pub ctx: RequestContext,
    pub content: Arc<ContentManager>,
    pub quota: Arc<QuotaService>,
    pub tree: TreeService,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(MemoryStore::new(), MemoryObjectStore::new(), i64::MAX / 2)
    }

    /// A second user sharing the same stores.
    pub fn with_store(store: MemoryStore, objects: MemoryObjectStore) -> Self {
        Self::build(store, objects, i64::MAX / 2)
    }

    pub fn with_quota(limit_bytes: i64) -> Self {
        Self::build(MemoryStore::new(), MemoryObjectStore::new(), limit_bytes)
    }

    fn build(store: MemoryStore, objects: MemoryObjectStore, limit_bytes: i64) -> Self {
        let user_id = Uuid::new_v4();
        let ctx = RequestContext::new(user_id, format!("{user_id}@example.com"), None);
        let content = Arc::new(ContentManager::new(
            Arc::new(objects.clone()),
            &StorageConfig::default(),
        ));
        let quota = Arc::new(QuotaService::new(Arc::new(store.clone()), limit_bytes));
        let tree = TreeService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            content.clone(),
            quota.clone(),
        );
        Self {
            store,
            objects,
            ctx,
            content,
            quota,
            tree,
        }
    }

    /// Mirror the acting user into the directory.
    pub async fn register(&self, name: Option<&str>) {
        UserDirectory::upsert(
            &self.store,
            &UpsertUser {
                id: self.ctx.user_id,
                email: self.ctx.email.clone(),
                name: name.map(String::from),
                image: None,
            },
        )
        .await
        .unwrap();
    }

    /// Insert a committed file with `size` bytes of content.
    pub async fn file(&self, parent_id: Option<Uuid>, name: &str, size: i64) -> Node {
        let id = Uuid::new_v4();
        let key = self.content.generate_key(self.ctx.user_id, id, name);
        self.objects
            .put(
                &key,
                Bytes::from(vec![b'x'; size as usize]),
                &PutOptions::with_content_type("text/plain"),
            )
            .await
            .unwrap();
        NodeStore::insert(
            &self.store,
            &NewNode::file(id, self.ctx.user_id, parent_id, name, "text/plain", size)
                .with_content_ref(key),
        )
        .await
        .unwrap()
    }

    pub async fn node(&self, id: Uuid) -> Node {
        NodeStore::find_by_id(&self.store, id).await.unwrap().unwrap()
    }
}
