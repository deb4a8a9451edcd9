//! # Sale Repository
//!
//! Persistence for committed sales. The sale row plus all of its line
//! items are written in one transaction; partial sales are never visible.
//! Sales are immutable once written - the workflow layer compensates via
//! returns, never by editing or deleting a sale.

use sqlx::SqlitePool;
use tracing::info;

use plaza_core::{Sale, SaleItem};

use crate::error::{DbError, DbResult};

/// Repository for sales within one tenant namespace.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool, tenant_id: String) -> Self {
        SaleRepository { pool, tenant_id }
    }

    /// Persists a sale with its line items atomically.
    pub async fn insert(&self, sale: &Sale, items: &[SaleItem]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales (id, tenant_id, invoice_number, customer_ref,
                               subtotal_cents, discount_cents, tax_cents, total_cents,
                               cash_cents, bank_cents, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sale.id)
        .bind(&self.tenant_id)
        .bind(&sale.invoice_number)
        .bind(&sale.customer_ref)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.cash_cents)
        .bind(sale.bank_cents)
        .bind(&sale.created_by)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (id, sale_id, tenant_id, product_id,
                                        sku_snapshot, name_snapshot, unit_price_cents,
                                        quantity, line_total_cents, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.id)
            .bind(&sale.id)
            .bind(&self.tenant_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.line_total_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            invoice = %sale.invoice_number,
            items = items.len(),
            total_cents = sale.total_cents,
            "Sale persisted"
        );
        Ok(())
    }

    /// Fetches a sale by id.
    pub async fn get_by_id(&self, sale_id: &str) -> DbResult<Sale> {
        sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ? AND tenant_id = ?")
            .bind(sale_id)
            .bind(&self.tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))
    }

    /// Fetches a sale by its invoice number (business identifier).
    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Sale> {
        sqlx::query_as::<_, Sale>(
            "SELECT * FROM sales WHERE invoice_number = ? AND tenant_id = ?",
        )
        .bind(invoice_number)
        .bind(&self.tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", invoice_number))
    }

    /// Fetches the line items of a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ? AND tenant_id = ? ORDER BY created_at",
        )
        .bind(sale_id)
        .bind(&self.tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Lists recent sales, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            "SELECT * FROM sales WHERE tenant_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(&self.tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }
}
