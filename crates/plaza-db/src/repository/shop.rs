//! # Shop Repository
//!
//! System-scoped directory of tenants. One row per shop; shops are never
//! hard-deleted, only status-transitioned.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use plaza_core::{Shop, ShopStatus};

use crate::error::{DbError, DbResult};

/// Repository for the shops directory.
///
/// Obtained from the system handle:
/// ```rust,ignore
/// let shops = router.resolve_system()?.shops();
/// let shop = shops.get("shop-42").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ShopRepository {
    pool: SqlitePool,
}

impl ShopRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShopRepository { pool }
    }

    /// Registers a new shop.
    pub async fn insert(&self, shop: &Shop) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shops (id, name, status, subscription_expires_at,
                               owner_email, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&shop.id)
        .bind(&shop.name)
        .bind(shop.status)
        .bind(shop.subscription_expires_at)
        .bind(&shop.owner_email)
        .bind(shop.created_at)
        .bind(shop.updated_at)
        .execute(&self.pool)
        .await?;

        info!(shop_id = %shop.id, name = %shop.name, "Shop registered");
        Ok(())
    }

    /// Fetches a shop by its identifier.
    pub async fn get(&self, shop_id: &str) -> DbResult<Shop> {
        sqlx::query_as::<_, Shop>("SELECT * FROM shops WHERE id = ?")
            .bind(shop_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Shop", shop_id))
    }

    /// Lists all shops, newest first.
    pub async fn list(&self) -> DbResult<Vec<Shop>> {
        let shops = sqlx::query_as::<_, Shop>("SELECT * FROM shops ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(shops)
    }

    /// Updates a shop's lifecycle status.
    pub async fn set_status(&self, shop_id: &str, status: ShopStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE shops SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(shop_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Shop", shop_id));
        }

        info!(shop_id = %shop_id, status = %status.as_str(), "Shop status updated");
        Ok(())
    }

    /// Moves a shop's subscription expiry.
    pub async fn set_subscription_expiry(
        &self,
        shop_id: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE shops SET subscription_expires_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(expires_at)
        .bind(Utc::now())
        .bind(shop_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Shop", shop_id));
        }
        Ok(())
    }
}
