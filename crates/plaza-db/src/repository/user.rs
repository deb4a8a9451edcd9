//! # User Repository
//!
//! Tenant-scoped user accounts. Permission overrides are stored as a JSON
//! array column and decoded into typed [`Permission`] values on read;
//! unknown names in the column are dropped rather than failing the load.

use chrono::Utc;
use serde_json;
use sqlx::SqlitePool;
use tracing::{info, warn};

use plaza_core::{Permission, Role, User};

use crate::error::{DbError, DbResult};

/// Raw row shape: `permission_overrides` is the JSON text column.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    tenant_id: String,
    name: String,
    email: String,
    role: Role,
    permission_overrides: String,
    is_active: bool,
    password_hash: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        // Unknown permission names (from older or newer deployments) are
        // skipped; a corrupt column must not lock the account out entirely.
        let overrides: Vec<Permission> =
            match serde_json::from_str::<Vec<serde_json::Value>>(&self.permission_overrides) {
                Ok(values) => values
                    .into_iter()
                    .filter_map(|v| serde_json::from_value(v).ok())
                    .collect(),
                Err(e) => {
                    warn!(user_id = %self.id, error = %e, "Malformed permission overrides, treating as empty");
                    Vec::new()
                }
            };

        User {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            email: self.email,
            role: self.role,
            permission_overrides: overrides,
            is_active: self.is_active,
            password_hash: self.password_hash,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Repository for user accounts within one tenant namespace.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl UserRepository {
    pub fn new(pool: SqlitePool, tenant_id: String) -> Self {
        UserRepository { pool, tenant_id }
    }

    /// Creates a user in this namespace.
    ///
    /// The user's own `tenant_id` field is ignored; the repository's
    /// namespace wins, so a handle can never write into a foreign tenant.
    pub async fn insert(&self, user: &User) -> DbResult<()> {
        let overrides = serde_json::to_string(&user.permission_overrides)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, name, email, role, permission_overrides,
                               is_active, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&self.tenant_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(overrides)
        .bind(user.is_active)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        info!(user_id = %user.id, tenant_id = %self.tenant_id, "User created");
        Ok(())
    }

    /// Fetches a user by id within this namespace.
    pub async fn get_by_id(&self, user_id: &str) -> DbResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE id = ? AND tenant_id = ?",
        )
        .bind(user_id)
        .bind(&self.tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", user_id))?;

        Ok(row.into_user())
    }

    /// Fetches a user by email within this namespace.
    pub async fn get_by_email(&self, email: &str) -> DbResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE email = ? AND tenant_id = ?",
        )
        .bind(email)
        .bind(&self.tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", email))?;

        Ok(row.into_user())
    }

    /// Lists all users in this namespace.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE tenant_id = ? ORDER BY created_at",
        )
        .bind(&self.tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserRow::into_user).collect())
    }

    /// Deactivates a user. Soft operation: the row and its audit references
    /// remain; the next token verification fails `InactiveUser`.
    pub async fn deactivate(&self, user_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE users SET is_active = 0, updated_at = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(&self.tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", user_id));
        }

        info!(user_id = %user_id, "User deactivated");
        Ok(())
    }

    /// Replaces a user's additive permission overrides.
    ///
    /// Takes effect on the user's next request: permissions are re-derived
    /// from the live record at verification time, never cached in tokens.
    pub async fn set_permission_overrides(
        &self,
        user_id: &str,
        overrides: &[Permission],
    ) -> DbResult<()> {
        let json = serde_json::to_string(overrides)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE users SET permission_overrides = ?, updated_at = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(json)
        .bind(Utc::now())
        .bind(user_id)
        .bind(&self.tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", user_id));
        }

        info!(user_id = %user_id, count = overrides.len(), "Permission overrides updated");
        Ok(())
    }
}
