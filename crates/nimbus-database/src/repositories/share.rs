//! Share repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_entity::share::{AccessLevel, GrantTarget, NewShare, Share, SharePermission};

use super::{LINK_SHARE_INDEX, map_write_error};
use crate::store::ShareStore;

/// Repository for link shares and named grants.
#[derive(Debug, Clone)]
pub struct ShareRepository {
    pool: PgPool,
}

impl ShareRepository {
    /// Create a new share repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShareStore for ShareRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Share>> {
        sqlx::query_as::<_, Share>("SELECT * FROM shares WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find share", e))
    }

    async fn find_link_share(&self, node_id: Uuid) -> AppResult<Option<Share>> {
        sqlx::query_as::<_, Share>(
            "SELECT * FROM shares WHERE node_id = $1 AND token IS NOT NULL LIMIT 1",
        )
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find link share", e))
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Share>> {
        sqlx::query_as::<_, Share>("SELECT * FROM shares WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find share by token", e)
            })
    }

    async fn list_for_node(&self, node_id: Uuid) -> AppResult<Vec<Share>> {
        sqlx::query_as::<_, Share>(
            "SELECT * FROM shares WHERE node_id = $1 ORDER BY created_at ASC",
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list shares", e))
    }

    async fn find_named_grant(
        &self,
        node_id: Uuid,
        target: &GrantTarget,
    ) -> AppResult<Option<Share>> {
        let query = match target {
            GrantTarget::User(user_id) => sqlx::query_as::<_, Share>(
                "SELECT * FROM shares WHERE node_id = $1 AND shared_with_user_id = $2 LIMIT 1",
            )
            .bind(node_id)
            .bind(*user_id),
            GrantTarget::Email(email) => sqlx::query_as::<_, Share>(
                "SELECT * FROM shares \
                 WHERE node_id = $1 AND LOWER(shared_with_email) = LOWER($2) LIMIT 1",
            )
            .bind(node_id)
            .bind(email.clone()),
        };
        query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find grant", e))
    }

    async fn find_grants_for_principal(
        &self,
        node_id: Uuid,
        user_id: Uuid,
        email: &str,
    ) -> AppResult<Vec<Share>> {
        sqlx::query_as::<_, Share>(
            "SELECT * FROM shares \
             WHERE node_id = $1 \
               AND (shared_with_user_id = $2 \
                    OR ($3 <> '' AND LOWER(shared_with_email) = LOWER($3)))",
        )
        .bind(node_id)
        .bind(user_id)
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find grants", e))
    }

    async fn insert(&self, share: &NewShare) -> AppResult<Share> {
        sqlx::query_as::<_, Share>(
            "INSERT INTO shares (id, node_id, grantor_id, access_level, permission, token, \
             shared_with_user_id, shared_with_email, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(share.node_id)
        .bind(share.grantor_id)
        .bind(share.access_level)
        .bind(share.permission)
        .bind(&share.token)
        .bind(share.shared_with_user_id())
        .bind(share.shared_with_email())
        .bind(share.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(e, "Failed to create share", LINK_SHARE_INDEX, || {
                AppError::conflict("A share link already exists for this file")
            })
        })
    }

    async fn update_link(
        &self,
        id: Uuid,
        access_level: AccessLevel,
        permission: SharePermission,
    ) -> AppResult<Share> {
        sqlx::query_as::<_, Share>(
            "UPDATE shares SET access_level = $2, permission = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(access_level)
        .bind(permission)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update share", e))?
        .ok_or_else(|| AppError::not_found("Share not found"))
    }

    async fn update_permission(&self, id: Uuid, permission: SharePermission) -> AppResult<Share> {
        sqlx::query_as::<_, Share>(
            "UPDATE shares SET permission = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(permission)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update share", e))?
        .ok_or_else(|| AppError::not_found("Share not found"))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM shares WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete share", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_node(&self, node_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM shares WHERE node_id = $1")
            .bind(node_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete shares", e))?;
        Ok(result.rows_affected())
    }

    async fn list_shared_with(&self, user_id: Uuid, email: &str) -> AppResult<Vec<Share>> {
        sqlx::query_as::<_, Share>(
            "SELECT * FROM shares \
             WHERE shared_with_user_id = $1 \
                OR ($2 <> '' AND LOWER(shared_with_email) = LOWER($2)) \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list shared-with", e))
    }
}
