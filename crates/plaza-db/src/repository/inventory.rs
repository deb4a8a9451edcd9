//! # Inventory Ledger
//!
//! The single authority over stock quantities. Every mutation goes through
//! a guarded conditional update; collaborators never read-then-write.
//!
//! ## Guarded Mutation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Why A Conditional UPDATE, Not Read-Then-Write              │
//! │                                                                         │
//! │  Read-then-write (WRONG):          Guarded update (this module):       │
//! │                                                                         │
//! │  A: read qty = 5                   A: UPDATE ... WHERE qty + Δ >= 0    │
//! │  B: read qty = 5                   B: UPDATE ... WHERE qty + Δ >= 0    │
//! │  A: write qty = 0   (sold 5)       A: 1 row affected  (sold 5)         │
//! │  B: write qty = 0   (sold 5!)      B: 0 rows affected → refused        │
//! │       └── 10 sold from 5 ──┘             └── stock never negative ──┘   │
//! │                                                                         │
//! │  The WHERE clause is the enforcement point. rows_affected == 0 means   │
//! │  the guard refused; a follow-up SELECT distinguishes "no such record"  │
//! │  from "insufficient stock".                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Audit Trail
//! After a successful mutation a movement row is appended. If the append
//! fails the mutation STANDS: the failure is reported in the outcome and
//! logged at warn level. An audit gap is reconcilable; silently resurrected
//! stock is not.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use plaza_core::{MovementKind, StockMovement, StockRecord};

use crate::error::{DbError, DbResult};

/// Result of one ledger mutation.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    /// The stock record after the mutation.
    pub record: StockRecord,
    /// False when the movement append failed; the mutation itself stands.
    pub movement_logged: bool,
}

/// The inventory ledger for one tenant namespace.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
    tenant_id: String,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool, tenant_id: String) -> Self {
        InventoryRepository { pool, tenant_id }
    }

    /// Removes stock for a sale. Refuses to drive quantities negative.
    ///
    /// ## Errors
    /// - `NotFound` - no stock record for the product
    /// - `InsufficientStock` - guard refused; carries the live available qty
    pub async fn decrement(
        &self,
        product_id: &str,
        quantity: i64,
        actor_id: &str,
        ref_type: Option<&str>,
        ref_id: Option<&str>,
    ) -> DbResult<MutationOutcome> {
        self.apply_delta(
            product_id,
            -quantity,
            MovementKind::Sale,
            actor_id,
            ref_type,
            ref_id,
            None,
        )
        .await
    }

    /// Restores stock for a return.
    pub async fn increment(
        &self,
        product_id: &str,
        quantity: i64,
        actor_id: &str,
        ref_type: Option<&str>,
        ref_id: Option<&str>,
    ) -> DbResult<MutationOutcome> {
        self.apply_delta(
            product_id,
            quantity,
            MovementKind::Return,
            actor_id,
            ref_type,
            ref_id,
            None,
        )
        .await
    }

    /// Records a purchase receipt (inbound stock).
    pub async fn receive(
        &self,
        product_id: &str,
        quantity: i64,
        actor_id: &str,
        ref_id: Option<&str>,
    ) -> DbResult<MutationOutcome> {
        self.apply_delta(
            product_id,
            quantity,
            MovementKind::Purchase,
            actor_id,
            Some("purchase"),
            ref_id,
            None,
        )
        .await
    }

    /// Manual stock adjustment with an operator reason. The delta is
    /// signed; negative adjustments hit the same guard as sales.
    pub async fn adjust(
        &self,
        product_id: &str,
        delta: i64,
        actor_id: &str,
        reason: &str,
    ) -> DbResult<MutationOutcome> {
        self.apply_delta(
            product_id,
            delta,
            MovementKind::Adjustment,
            actor_id,
            None,
            None,
            Some(reason),
        )
        .await
    }

    /// The shared guarded mutation.
    ///
    /// One statement both checks and mutates: the WHERE clause refuses any
    /// delta that would leave `available_qty` (current - reserved) below
    /// zero, and `is_low_stock` is recomputed in the same statement so the
    /// flag can never lag the quantity.
    async fn apply_delta(
        &self,
        product_id: &str,
        delta: i64,
        kind: MovementKind,
        actor_id: &str,
        ref_type: Option<&str>,
        ref_id: Option<&str>,
        reason: Option<&str>,
    ) -> DbResult<MutationOutcome> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE stock_records
            SET current_qty = current_qty + ?,
                available_qty = current_qty + ? - reserved_qty,
                is_low_stock = CASE
                    WHEN current_qty + ? <= min_stock_level THEN 1
                    ELSE 0
                END,
                updated_at = ?
            WHERE tenant_id = ? AND product_id = ?
              AND current_qty + ? >= reserved_qty
            "#,
        )
        .bind(delta)
        .bind(delta)
        .bind(delta)
        .bind(now)
        .bind(&self.tenant_id)
        .bind(product_id)
        .bind(delta)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Guard refused or record missing; one SELECT tells them apart.
            let existing = self.try_get(product_id).await?;
            return match existing {
                None => Err(DbError::not_found("StockRecord", product_id)),
                Some(record) => Err(DbError::InsufficientStock {
                    product_id: product_id.to_string(),
                    available: record.available_qty,
                    requested: -delta,
                }),
            };
        }

        let record = self
            .try_get(product_id)
            .await?
            .ok_or_else(|| DbError::not_found("StockRecord", product_id))?;

        debug!(
            product_id = %product_id,
            delta = delta,
            current_qty = record.current_qty,
            low_stock = record.is_low_stock,
            "Stock mutated"
        );

        // Movement append is non-fatal: the mutation above stands either way.
        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            tenant_id: self.tenant_id.clone(),
            product_id: product_id.to_string(),
            kind,
            quantity: delta,
            ref_type: ref_type.map(str::to_string),
            ref_id: ref_id.map(str::to_string),
            reason: reason.map(str::to_string),
            actor_id: actor_id.to_string(),
            created_at: now,
        };

        let movement_logged = match self.append_movement(&movement).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    product_id = %product_id,
                    delta = delta,
                    error = %e,
                    "Stock movement audit append failed; mutation stands"
                );
                false
            }
        };

        Ok(MutationOutcome {
            record,
            movement_logged,
        })
    }

    async fn append_movement(&self, movement: &StockMovement) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, tenant_id, product_id, kind, quantity,
                                         ref_type, ref_id, reason, actor_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.tenant_id)
        .bind(&movement.product_id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(&movement.ref_type)
        .bind(&movement.ref_id)
        .bind(&movement.reason)
        .bind(&movement.actor_id)
        .bind(movement.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn try_get(&self, product_id: &str) -> DbResult<Option<StockRecord>> {
        let record = sqlx::query_as::<_, StockRecord>(
            "SELECT * FROM stock_records WHERE tenant_id = ? AND product_id = ?",
        )
        .bind(&self.tenant_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Fetches the stock record for a product.
    pub async fn get(&self, product_id: &str) -> DbResult<StockRecord> {
        self.try_get(product_id)
            .await?
            .ok_or_else(|| DbError::not_found("StockRecord", product_id))
    }

    /// Lists records currently at or below their low-stock threshold.
    pub async fn list_low_stock(&self) -> DbResult<Vec<StockRecord>> {
        let records = sqlx::query_as::<_, StockRecord>(
            r#"
            SELECT * FROM stock_records
            WHERE tenant_id = ? AND is_low_stock = 1
            ORDER BY current_qty ASC
            "#,
        )
        .bind(&self.tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Recent movements for a product, newest first.
    pub async fn movements(&self, product_id: &str, limit: u32) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE tenant_id = ? AND product_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(&self.tenant_id)
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::ProductRepository;
    use plaza_core::Product;
    use std::sync::Arc;

    const TENANT: &str = "shop-test";

    async fn setup(initial_qty: i64, min_stock: Option<i64>) -> (SqlitePool, String) {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrations::run_migrations(&pool).await.unwrap();

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            tenant_id: TENANT.to_string(),
            sku: "SKU-1".to_string(),
            name: "Widget".to_string(),
            category: None,
            cost_cents: 50,
            price_cents: 100,
            unit: None,
            min_stock_level: min_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        ProductRepository::new(pool.clone(), TENANT.to_string())
            .insert(&product, initial_qty)
            .await
            .unwrap();

        (pool, product.id)
    }

    #[tokio::test]
    async fn test_decrement_updates_quantity_and_low_stock_flag() {
        let (pool, product_id) = setup(12, Some(3)).await;
        let ledger = InventoryRepository::new(pool, TENANT.to_string());

        let outcome = ledger
            .decrement(&product_id, 10, "user-1", Some("sale"), Some("s-1"))
            .await
            .unwrap();

        assert_eq!(outcome.record.current_qty, 2);
        assert_eq!(outcome.record.available_qty, 2);
        assert!(outcome.record.is_low_stock);
        assert!(outcome.movement_logged);

        let movements = ledger.movements(&product_id, 10).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].quantity, -10);
        assert_eq!(movements[0].kind, MovementKind::Sale);
    }

    #[tokio::test]
    async fn test_decrement_refuses_insufficient_stock() {
        let (pool, product_id) = setup(5, None).await;
        let ledger = InventoryRepository::new(pool, TENANT.to_string());

        let err = ledger
            .decrement(&product_id, 6, "user-1", None, None)
            .await
            .unwrap_err();

        match err {
            DbError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Refused mutation leaves the record untouched and unlogged
        let record = ledger.get(&product_id).await.unwrap();
        assert_eq!(record.current_qty, 5);
        assert!(ledger.movements(&product_id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrement_unknown_product_is_not_found() {
        let (pool, _) = setup(5, None).await;
        let ledger = InventoryRepository::new(pool, TENANT.to_string());

        let err = ledger
            .decrement("no-such-product", 1, "user-1", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_increment_clears_low_stock_flag() {
        let (pool, product_id) = setup(2, Some(3)).await;
        let ledger = InventoryRepository::new(pool, TENANT.to_string());

        assert!(ledger.get(&product_id).await.unwrap().is_low_stock);

        let outcome = ledger
            .increment(&product_id, 10, "user-1", Some("return"), Some("r-1"))
            .await
            .unwrap();
        assert_eq!(outcome.record.current_qty, 12);
        assert!(!outcome.record.is_low_stock);
    }

    #[tokio::test]
    async fn test_adjust_negative_hits_the_same_guard() {
        let (pool, product_id) = setup(4, None).await;
        let ledger = InventoryRepository::new(pool, TENANT.to_string());

        let err = ledger
            .adjust(&product_id, -5, "user-1", "stocktake correction")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { .. }));

        let outcome = ledger
            .adjust(&product_id, -4, "user-1", "stocktake correction")
            .await
            .unwrap();
        assert_eq!(outcome.record.current_qty, 0);

        let movements = ledger.movements(&product_id, 10).await.unwrap();
        assert_eq!(movements[0].kind, MovementKind::Adjustment);
        assert_eq!(movements[0].reason.as_deref(), Some("stocktake correction"));
    }

    #[tokio::test]
    async fn test_concurrent_decrements_never_oversell() {
        // File-backed store so concurrent tasks share real pool contention
        let dir = std::env::temp_dir().join(format!("plaza-inv-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.db");

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite://{}?mode=rwc", path.display()))
            .await
            .unwrap();
        crate::migrations::run_migrations(&pool).await.unwrap();

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            tenant_id: TENANT.to_string(),
            sku: "SKU-RACE".to_string(),
            name: "Contested".to_string(),
            category: None,
            cost_cents: 10,
            price_cents: 20,
            unit: None,
            min_stock_level: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        ProductRepository::new(pool.clone(), TENANT.to_string())
            .insert(&product, 10)
            .await
            .unwrap();

        let ledger = Arc::new(InventoryRepository::new(pool, TENANT.to_string()));
        let mut handles = Vec::new();
        for i in 0..25 {
            let ledger = Arc::clone(&ledger);
            let product_id = product.id.clone();
            handles.push(tokio::spawn(async move {
                let sale_ref = format!("s-{i}");
                ledger
                    .decrement(&product_id, 1, "user-1", Some("sale"), Some(&sale_ref))
                    .await
                    .is_ok()
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(ledger.get(&product.id).await.unwrap().current_qty, 0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
