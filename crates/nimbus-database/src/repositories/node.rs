//! Node repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_entity::node::{NewNode, Node, NodeKind};

use super::{SIBLING_NAME_INDEX, map_write_error};
use crate::store::{Liveness, NodeFilter, NodeStore};

/// Repository for file and folder rows.
#[derive(Debug, Clone)]
pub struct NodeRepository {
    pool: PgPool,
}

impl NodeRepository {
    /// Create a new node repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn name_taken(name: &str) -> AppError {
    AppError::name_conflict(format!("An item named '{name}' already exists here"))
}

fn stale(id: Uuid) -> AppError {
    AppError::conflict(format!("Node {id} was modified concurrently"))
}

#[async_trait]
impl NodeStore for NodeRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find node", e))
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Node>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find nodes", e))
    }

    async fn find_sibling_by_name(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        kind: NodeKind,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes \
             WHERE owner_id = $1 AND parent_id IS NOT DISTINCT FROM $2 AND is_folder = $3 \
               AND name = $4 AND deleted_at IS NULL AND ($5::uuid IS NULL OR id <> $5) \
             LIMIT 1",
        )
        .bind(owner_id)
        .bind(parent_id)
        .bind(kind.is_folder())
        .bind(name)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check sibling name", e))
    }

    async fn sibling_names(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        kind: NodeKind,
    ) -> AppResult<Vec<String>> {
        sqlx::query_scalar(
            "SELECT name FROM nodes \
             WHERE owner_id = $1 AND parent_id IS NOT DISTINCT FROM $2 AND is_folder = $3 \
               AND deleted_at IS NULL",
        )
        .bind(owner_id)
        .bind(parent_id)
        .bind(kind.is_folder())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list sibling names", e))
    }

    async fn list_children(&self, parent_id: Uuid, liveness: Liveness) -> AppResult<Vec<Node>> {
        let predicate = match liveness {
            Liveness::Live => "AND deleted_at IS NULL",
            Liveness::Trashed => "AND deleted_at IS NOT NULL",
            Liveness::Any => "",
        };
        let sql = format!(
            "SELECT * FROM nodes WHERE parent_id = $1 {predicate} \
             ORDER BY is_folder DESC, created_at DESC"
        );
        sqlx::query_as::<_, Node>(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list children", e))
    }

    async fn list_filtered(&self, filter: &NodeFilter) -> AppResult<Vec<Node>> {
        let sql = if filter.recursive {
            "WITH RECURSIVE scope AS ( \
                 SELECT id FROM nodes \
                 WHERE owner_id = $1 AND parent_id IS NOT DISTINCT FROM $2 \
                   AND is_folder AND deleted_at IS NULL \
                 UNION \
                 SELECT n.id FROM nodes n JOIN scope s ON n.parent_id = s.id \
                 WHERE n.is_folder AND n.deleted_at IS NULL \
             ) \
             SELECT * FROM nodes \
             WHERE owner_id = $1 AND deleted_at IS NULL \
               AND (parent_id IS NOT DISTINCT FROM $2 OR parent_id IN (SELECT id FROM scope)) \
               AND ($3::timestamptz IS NULL OR updated_at >= $3) \
               AND ($4::timestamptz IS NULL OR updated_at < $4) \
             ORDER BY is_folder DESC, created_at DESC"
        } else {
            "SELECT * FROM nodes \
             WHERE owner_id = $1 AND parent_id IS NOT DISTINCT FROM $2 AND deleted_at IS NULL \
               AND ($3::timestamptz IS NULL OR updated_at >= $3) \
               AND ($4::timestamptz IS NULL OR updated_at < $4) \
             ORDER BY is_folder DESC, created_at DESC"
        };

        let nodes = sqlx::query_as::<_, Node>(sql)
            .bind(filter.owner_id)
            .bind(filter.parent_id)
            .bind(filter.updated_from)
            .bind(filter.updated_before)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list nodes", e))?;

        // MIME classification lives in the entity crate, not in SQL.
        Ok(nodes.into_iter().filter(|n| filter.admits(n)).collect())
    }

    async fn list_trash(&self, owner_id: Uuid) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes WHERE owner_id = $1 AND deleted_at IS NOT NULL \
             ORDER BY is_folder DESC, deleted_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list trash", e))
    }

    async fn list_starred(&self, owner_id: Uuid) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes WHERE owner_id = $1 AND is_starred AND deleted_at IS NULL \
             ORDER BY is_folder DESC, updated_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list starred", e))
    }

    async fn search(
        &self,
        owner_id: Uuid,
        needle: &str,
        include_deleted: bool,
        limit: i64,
    ) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes \
             WHERE owner_id = $1 AND POSITION(LOWER($2) IN LOWER(name)) > 0 \
               AND ($3 OR deleted_at IS NULL) \
             ORDER BY is_folder DESC, updated_at DESC \
             LIMIT $4",
        )
        .bind(owner_id)
        .bind(needle)
        .bind(include_deleted)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to search nodes", e))
    }

    async fn insert(&self, node: &NewNode) -> AppResult<Node> {
        let row = sqlx::query_as::<_, Node>(
            "INSERT INTO nodes (id, owner_id, parent_id, name, is_folder, content_ref, size, \
             mime_type, is_starred, upload_key) \
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10 \
             WHERE $3::uuid IS NULL OR EXISTS ( \
                 SELECT 1 FROM nodes p \
                 WHERE p.id = $3 AND p.owner_id = $2 AND p.is_folder AND p.deleted_at IS NULL \
             ) \
             RETURNING *",
        )
        .bind(node.id)
        .bind(node.owner_id)
        .bind(node.parent_id)
        .bind(&node.name)
        .bind(node.is_folder)
        .bind(&node.content_ref)
        .bind(node.size)
        .bind(&node.mime_type)
        .bind(node.is_starred)
        .bind(&node.upload_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(e, "Failed to create node", SIBLING_NAME_INDEX, || {
                name_taken(&node.name)
            })
        })?;

        row.ok_or_else(|| AppError::not_found("Parent folder not found"))
    }

    async fn rename(&self, id: Uuid, expected_version: i64, name: &str) -> AppResult<Node> {
        sqlx::query_as::<_, Node>(
            "UPDATE nodes SET name = $3, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING *",
        )
        .bind(id)
        .bind(expected_version)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(e, "Failed to rename node", SIBLING_NAME_INDEX, || name_taken(name))
        })?
        .ok_or_else(|| stale(id))
    }

    async fn set_parent(
        &self,
        id: Uuid,
        expected_version: i64,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Node> {
        sqlx::query_as::<_, Node>(
            "WITH RECURSIVE ancestors AS ( \
                 SELECT id, parent_id FROM nodes WHERE id = $3 \
                 UNION \
                 SELECT n.id, n.parent_id FROM nodes n JOIN ancestors a ON n.id = a.parent_id \
             ) \
             UPDATE nodes SET parent_id = $3, name = $4, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
               AND ($3::uuid IS NULL OR ( \
                   EXISTS ( \
                       SELECT 1 FROM nodes p \
                       WHERE p.id = $3 AND p.owner_id = nodes.owner_id \
                         AND p.is_folder AND p.deleted_at IS NULL \
                   ) \
                   AND NOT EXISTS (SELECT 1 FROM ancestors WHERE ancestors.id = $1) \
               )) \
             RETURNING *",
        )
        .bind(id)
        .bind(expected_version)
        .bind(parent_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(e, "Failed to move node", SIBLING_NAME_INDEX, || name_taken(name))
        })?
        .ok_or_else(|| stale(id))
    }

    async fn set_starred(&self, id: Uuid, expected_version: i64, starred: bool) -> AppResult<Node> {
        sqlx::query_as::<_, Node>(
            "UPDATE nodes SET is_starred = $3, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING *",
        )
        .bind(id)
        .bind(expected_version)
        .bind(starred)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to star node", e))?
        .ok_or_else(|| stale(id))
    }

    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE nodes SET deleted_at = $2, version = version + 1 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to trash node", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_restored(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<Node>> {
        sqlx::query_as::<_, Node>(
            "UPDATE nodes SET deleted_at = NULL, parent_id = $2, name = $3, \
                 version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NOT NULL \
               AND ($2::uuid IS NULL OR EXISTS ( \
                   SELECT 1 FROM nodes p \
                   WHERE p.id = $2 AND p.owner_id = nodes.owner_id \
                     AND p.is_folder AND p.deleted_at IS NULL \
               )) \
             RETURNING *",
        )
        .bind(id)
        .bind(parent_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(e, "Failed to restore node", SIBLING_NAME_INDEX, || name_taken(name))
        })
    }

    async fn commit_content(&self, id: Uuid, content_ref: &str, size: i64) -> AppResult<Node> {
        sqlx::query_as::<_, Node>(
            "UPDATE nodes SET content_ref = $2, size = $3, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND NOT is_folder AND deleted_at IS NULL \
             RETURNING *",
        )
        .bind(id)
        .bind(content_ref)
        .bind(size)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit content", e))?
        .ok_or_else(|| AppError::not_found("File not found"))
    }

    async fn touch_accessed(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE nodes SET last_accessed_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to touch node", e))?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM nodes WHERE id = $1 AND deleted_at IS NOT NULL")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to purge node", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_pending_uploads(
        &self,
        owner_id: Uuid,
        created_before: DateTime<Utc>,
    ) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes \
             WHERE owner_id = $1 AND NOT is_folder AND content_ref IS NULL \
               AND deleted_at IS NULL AND created_at < $2 \
             ORDER BY created_at",
        )
        .bind(owner_id)
        .bind(created_before)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list pending uploads", e))
    }

    async fn discard_pending_upload(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM nodes WHERE id = $1 AND NOT is_folder AND content_ref IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to discard pending upload", e)
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn usage(&self, owner_id: Uuid) -> AppResult<(i64, i64)> {
        sqlx::query_as::<_, (i64, i64)>(
            "SELECT COALESCE(SUM(size), 0)::BIGINT, COUNT(*) FROM nodes \
             WHERE owner_id = $1 AND NOT is_folder AND deleted_at IS NULL",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to compute usage", e))
    }
}
