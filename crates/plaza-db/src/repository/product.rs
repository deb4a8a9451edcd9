//! # Product Repository
//!
//! Tenant-scoped product catalog.
//!
//! ## Key Operations
//! - Insert creates the product AND its stock record in one transaction,
//!   so the 1:1 (tenant, product) → stock invariant holds from birth
//! - Soft delete only; sold products stay referenceable from history

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use plaza_core::Product;

use crate::error::{DbError, DbResult};

/// Repository for product operations within one tenant namespace.
///
/// ## Usage
/// ```rust,ignore
/// let products = router.resolve("shop-42")?.products();
/// let product = products.get_by_sku("COKE-330").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool, tenant_id: String) -> Self {
        ProductRepository { pool, tenant_id }
    }

    /// Creates a product and its stock record atomically.
    ///
    /// The stock record starts at `initial_qty` with the product's
    /// min-stock threshold denormalized onto it (missing threshold reads
    /// as 0).
    pub async fn insert(&self, product: &Product, initial_qty: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (id, tenant_id, sku, name, category, cost_cents,
                                  price_cents, unit, min_stock_level, is_active,
                                  created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&self.tenant_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(&product.unit)
        .bind(product.min_stock_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        let min_stock = product.min_stock();
        sqlx::query(
            r#"
            INSERT INTO stock_records (id, tenant_id, product_id, current_qty,
                                       reserved_qty, available_qty, min_stock_level,
                                       is_low_stock, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&self.tenant_id)
        .bind(&product.id)
        .bind(initial_qty)
        .bind(initial_qty)
        .bind(min_stock)
        .bind(initial_qty <= min_stock)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product.id,
            sku = %product.sku,
            initial_qty = initial_qty,
            "Product created"
        );
        Ok(())
    }

    /// Fetches a product by id.
    pub async fn get_by_id(&self, product_id: &str) -> DbResult<Product> {
        sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = ? AND tenant_id = ?",
        )
        .bind(product_id)
        .bind(&self.tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// Fetches a product by its SKU (business identifier).
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Product> {
        sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE sku = ? AND tenant_id = ?",
        )
        .bind(sku)
        .bind(&self.tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Product", sku))
    }

    /// Lists active products, newest first.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        debug!(tenant_id = %self.tenant_id, limit = limit, "Listing active products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE tenant_id = ? AND is_active = 1
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(&self.tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates a product's mutable fields (name, category, prices, unit,
    /// min-stock threshold).
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = ?, category = ?, cost_cents = ?, price_cents = ?,
                unit = ?, min_stock_level = ?, updated_at = ?
            WHERE id = ? AND tenant_id = ?
            "#,
        )
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(&product.unit)
        .bind(product.min_stock_level)
        .bind(Utc::now())
        .bind(&product.id)
        .bind(&self.tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product.id.as_str()));
        }
        Ok(())
    }

    /// Soft-deletes a product. History referencing it stays intact.
    pub async fn soft_delete(&self, product_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ? WHERE id = ? AND tenant_id = ?",
        )
        .bind(Utc::now())
        .bind(product_id)
        .bind(&self.tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        info!(product_id = %product_id, "Product deactivated");
        Ok(())
    }
}
