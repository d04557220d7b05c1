use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{AccessError, Role};
use crate::db::row_parsers::{parse_datetime, parse_uuid};
use crate::events::{ChangeFeed, ChangeKind, RoleChange};

/// Backing store for role assignments and role permission grants.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Raw role values assigned to `principal`. Values are returned as stored;
    /// validation against [`Role`] happens in the role store.
    async fn fetch_roles(&self, principal: Uuid) -> Result<Vec<String>, AccessError>;

    /// Whether any of `principal`'s roles carries the `(resource, action)` grant.
    async fn has_grant(&self, principal: Uuid, resource: &str, action: &str) -> Result<bool, AccessError>;

    /// Change notifications for the `user_roles` relation.
    fn subscribe(&self) -> broadcast::Receiver<RoleChange>;
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleGrant {
    pub role: Role,
    #[schema(example = "requests")]
    pub resource: String,
    #[schema(example = "create")]
    pub action: String,
}

/// SQLite implementation. Every `user_roles` mutation is published on the
/// change feed after the statement completes.
#[derive(Debug, Clone)]
pub struct SqliteRoleRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SqliteRoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::new(),
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Returns `false` when the pair already existed.
    pub async fn assign_role(&self, user_id: Uuid, role: Role) -> Result<bool, AccessError> {
        let result = sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role, created_at) VALUES (?, ?, ?)")
            .bind(user_id.to_string())
            .bind(role.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            tracing::info!(user_id = %user_id, role = %role, "role assigned");
            self.feed.publish(RoleChange::new(ChangeKind::Insert, Some(user_id)));
        }
        Ok(inserted)
    }

    /// Returns `false` when the pair was not assigned.
    pub async fn revoke_role(&self, user_id: Uuid, role: Role) -> Result<bool, AccessError> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role = ?")
            .bind(user_id.to_string())
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(user_id = %user_id, role = %role, "role revoked");
            self.feed.publish(RoleChange::new(ChangeKind::Delete, Some(user_id)));
        }
        Ok(deleted)
    }

    /// Typed assignments for one user. Unrecognized stored values are skipped.
    pub async fn list_user_roles(&self, user_id: Uuid) -> Result<Vec<UserRole>, AccessError> {
        let rows = sqlx::query("SELECT user_id, role, created_at FROM user_roles WHERE user_id = ? ORDER BY role")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut roles = Vec::with_capacity(rows.len());
        for row in &rows {
            match user_role_from_row(row) {
                Ok(role) => roles.push(role),
                Err(err) => tracing::warn!(user_id = %user_id, error = %err, "skipping unreadable role assignment"),
            }
        }
        Ok(roles)
    }

    pub async fn list_grants(&self) -> Result<Vec<RoleGrant>, AccessError> {
        let rows = sqlx::query("SELECT role, resource, action FROM role_permissions ORDER BY role, resource, action")
            .fetch_all(&self.pool)
            .await?;

        let mut grants = Vec::with_capacity(rows.len());
        for row in &rows {
            let role: String = row.try_get("role")?;
            let Ok(role) = role.parse::<Role>() else {
                tracing::warn!(role = %role, "skipping grant with unrecognized role");
                continue;
            };
            grants.push(RoleGrant {
                role,
                resource: row.try_get("resource")?,
                action: row.try_get("action")?,
            });
        }
        Ok(grants)
    }

    /// Returns `false` when the grant already existed.
    pub async fn grant_permission(&self, grant: &RoleGrant) -> Result<bool, AccessError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO role_permissions (role, resource, action, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(grant.role.as_str())
        .bind(&grant.resource)
        .bind(&grant.action)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns `false` when no such grant existed.
    pub async fn revoke_permission(&self, grant: &RoleGrant) -> Result<bool, AccessError> {
        let result = sqlx::query("DELETE FROM role_permissions WHERE role = ? AND resource = ? AND action = ?")
            .bind(grant.role.as_str())
            .bind(&grant.resource)
            .bind(&grant.action)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleRepository for SqliteRoleRepository {
    async fn fetch_roles(&self, principal: Uuid) -> Result<Vec<String>, AccessError> {
        let roles = sqlx::query_scalar::<_, String>("SELECT role FROM user_roles WHERE user_id = ? ORDER BY role")
            .bind(principal.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn has_grant(&self, principal: Uuid, resource: &str, action: &str) -> Result<bool, AccessError> {
        let exists: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM user_roles ur
                INNER JOIN role_permissions rp ON rp.role = ur.role
                WHERE ur.user_id = ? AND rp.resource = ? AND rp.action = ?
            )
            "#,
        )
        .bind(principal.to_string())
        .bind(resource)
        .bind(action)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    fn subscribe(&self) -> broadcast::Receiver<RoleChange> {
        self.feed.subscribe()
    }
}

fn user_role_from_row(row: &SqliteRow) -> Result<UserRole, AccessError> {
    let user_id: String = row.try_get("user_id")?;
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(UserRole {
        user_id: parse_uuid(&user_id).map_err(|e| AccessError::StoreQueryFailed(e.to_string()))?,
        role: role.parse()?,
        created_at: parse_datetime(&created_at).map_err(|e| AccessError::StoreQueryFailed(e.to_string()))?,
    })
}
