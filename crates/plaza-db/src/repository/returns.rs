//! # Return Repository
//!
//! Persistence for returns against prior sales.
//!
//! ## Over-Return Serialization
//! The check "already returned + requested <= sold" and the insert of the
//! new return must be one atomic unit, or two concurrent returns can both
//! pass the check. The workflow layer opens one write transaction and uses
//! the `_tx` functions here inside it; SQLite's single-writer model then
//! serializes competing returns against the same sale.
//!
//! ## Exactly-Once Transitions
//! `update_status_guarded` compares-and-swaps the status column. The caller
//! applies ledger effects only when the swap reports `true`, so a replayed
//! or racing transition can never restore stock twice.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::info;

use plaza_core::{Return, ReturnItem, ReturnStatus};

use crate::error::{DbError, DbResult};

/// Repository for returns within one tenant namespace.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool, tenant_id: String) -> Self {
        ReturnRepository { pool, tenant_id }
    }

    /// Opens a write transaction for a check-then-insert sequence.
    pub async fn begin(&self) -> DbResult<sqlx::Transaction<'static, sqlx::Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Sums previously returned quantities per product for one sale,
    /// excluding cancelled returns.
    ///
    /// Transaction-scoped: call inside the same transaction that inserts
    /// the new return, or the sum can go stale under concurrency.
    pub async fn returned_qty_by_product_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        sale_id: &str,
    ) -> DbResult<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT ri.product_id, COALESCE(SUM(ri.quantity), 0)
            FROM return_items ri
            JOIN returns r ON r.id = ri.return_id
            WHERE ri.tenant_id = ? AND ri.sale_id = ? AND r.status != 'cancelled'
            GROUP BY ri.product_id
            "#,
        )
        .bind(tenant_id)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Inserts a return with its line items inside the caller's transaction.
    pub async fn insert_tx(
        conn: &mut SqliteConnection,
        ret: &Return,
        items: &[ReturnItem],
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO returns (id, tenant_id, return_number, sale_id, reason,
                                 refund_method, subtotal_cents, discount_cents,
                                 tax_cents, total_cents, status, created_by,
                                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&ret.id)
        .bind(&ret.tenant_id)
        .bind(&ret.return_number)
        .bind(&ret.sale_id)
        .bind(&ret.reason)
        .bind(&ret.refund_method)
        .bind(ret.subtotal_cents)
        .bind(ret.discount_cents)
        .bind(ret.tax_cents)
        .bind(ret.total_cents)
        .bind(ret.status)
        .bind(&ret.created_by)
        .bind(ret.created_at)
        .bind(ret.updated_at)
        .execute(&mut *conn)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO return_items (id, return_id, tenant_id, sale_id,
                                          product_id, quantity, unit_price_cents,
                                          line_total_cents, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.id)
            .bind(&ret.id)
            .bind(&ret.tenant_id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.line_total_cents)
            .bind(item.created_at)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Fetches a return by id.
    pub async fn get_by_id(&self, return_id: &str) -> DbResult<Return> {
        sqlx::query_as::<_, Return>("SELECT * FROM returns WHERE id = ? AND tenant_id = ?")
            .bind(return_id)
            .bind(&self.tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Return", return_id))
    }

    /// Fetches the line items of a return.
    pub async fn get_items(&self, return_id: &str) -> DbResult<Vec<ReturnItem>> {
        let items = sqlx::query_as::<_, ReturnItem>(
            "SELECT * FROM return_items WHERE return_id = ? AND tenant_id = ? ORDER BY created_at",
        )
        .bind(return_id)
        .bind(&self.tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Lists returns recorded against one sale.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<Return>> {
        let returns = sqlx::query_as::<_, Return>(
            "SELECT * FROM returns WHERE sale_id = ? AND tenant_id = ? ORDER BY created_at",
        )
        .bind(sale_id)
        .bind(&self.tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(returns)
    }

    /// Compare-and-swap on the status column.
    ///
    /// Returns `true` when THIS call performed the transition; `false` when
    /// the row was no longer in `from` (someone else already moved it).
    /// Callers apply ledger effects only on `true`.
    pub async fn update_status_guarded(
        &self,
        return_id: &str,
        from: ReturnStatus,
        to: ReturnStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE returns SET status = ?, updated_at = ? WHERE id = ? AND tenant_id = ? AND status = ?",
        )
        .bind(to)
        .bind(Utc::now())
        .bind(return_id)
        .bind(&self.tenant_id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        let won = result.rows_affected() == 1;
        if won {
            info!(
                return_id = %return_id,
                from = %from.as_str(),
                to = %to.as_str(),
                "Return status transitioned"
            );
        }
        Ok(won)
    }
}
