//! Known-user synchronisation.
//!
//! Every authenticated request carries the provider's view of the user. The
//! directory row is refreshed when that view changes, and at most once per
//! TTL otherwise, so that named grants can resolve addresses to users.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;
use uuid::Uuid;

use nimbus_core::config::AuthConfig;
use nimbus_core::result::AppResult;
use nimbus_database::UserDirectory;
use nimbus_entity::user::UpsertUser;

use crate::jwt::Claims;

/// Upper bound on remembered identities.
const MAX_REMEMBERED: u64 = 100_000;

/// Remembers recently synchronised identities.
#[derive(Clone)]
pub struct KnownUsers {
    directory: Arc<dyn UserDirectory>,
    seen: Cache<Uuid, UpsertUser>,
}

impl std::fmt::Debug for KnownUsers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnownUsers")
            .field("remembered", &self.seen.entry_count())
            .finish_non_exhaustive()
    }
}

impl KnownUsers {
    /// Creates a synchroniser writing to `directory`.
    pub fn new(directory: Arc<dyn UserDirectory>, config: &AuthConfig) -> Self {
        let seen = Cache::builder()
            .max_capacity(MAX_REMEMBERED)
            .time_to_live(Duration::from_secs(config.user_sync_ttl_seconds))
            .build();
        Self { directory, seen }
    }

    /// Make sure the directory reflects the identity in `claims`.
    pub async fn sync(&self, claims: &Claims) -> AppResult<()> {
        let wanted = claims.to_upsert();
        if self.seen.get(&wanted.id).await.as_ref() == Some(&wanted) {
            return Ok(());
        }

        self.directory.upsert(&wanted).await?;
        debug!(user_id = %wanted.id, "Synchronised user directory entry");
        self.seen.insert(wanted.id, wanted).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_database::MemoryStore;

    fn claims(id: Uuid, email: &str, name: &str) -> Claims {
        Claims {
            sub: id,
            email: email.to_string(),
            name: Some(name.to_string()),
            picture: None,
            iat: 0,
            exp: i64::MAX,
            iss: None,
        }
    }

    #[tokio::test]
    async fn test_sync_writes_then_refreshes_on_change() {
        let store = MemoryStore::new();
        let users = KnownUsers::new(Arc::new(store.clone()), &AuthConfig::default());
        let id = Uuid::new_v4();

        users.sync(&claims(id, "Ana@Example.com", "Ana")).await.unwrap();
        let row = store.find_by_email("ana@example.com").await.unwrap().unwrap();
        assert_eq!(row.name.as_deref(), Some("Ana"));

        users.sync(&claims(id, "ana@example.com", "Ana B.")).await.unwrap();
        let row = store.find_by_email("ana@example.com").await.unwrap().unwrap();
        assert_eq!(row.name.as_deref(), Some("Ana B."));
    }
}
