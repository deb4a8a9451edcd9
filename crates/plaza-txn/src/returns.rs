//! # Return Workflow
//!
//! Creates returns against prior sales and drives the return status state
//! machine.
//!
//! ## Guarantees
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Return Invariants                                   │
//! │                                                                         │
//! │  Over-return guard:                                                    │
//! │    Per product, sum of non-cancelled return quantities across ALL      │
//! │    returns on one sale never exceeds the quantity sold. The sum and    │
//! │    the insert run in ONE write transaction, so two concurrent returns  │
//! │    against the same sale serialize instead of both passing the check.  │
//! │                                                                         │
//! │  Exactly-once stock effects:                                           │
//! │    Transitions compare-and-swap the status row. Only the caller whose  │
//! │    swap succeeded applies ledger effects, so a double "complete"       │
//! │    restores stock once, not twice.                                     │
//! │                                                                         │
//! │  Refund proration:                                                     │
//! │    Sale-level discount and tax are prorated by the returned fraction   │
//! │    of the sale subtotal (see plaza-core::refund).                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use plaza_core::validation::{validate_line_count, validate_quantity};
use plaza_core::{
    check_return_qty, prorate_refund, CoreError, Money, Return, ReturnItem, ReturnStatus,
};
use plaza_db::repository::returns::ReturnRepository;
use plaza_db::{ConnectionRouter, DbError, StoreHandle};

use crate::error::TxnResult;

// =============================================================================
// Request / Outcome Types
// =============================================================================

/// One requested return line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A return creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReturnRequest {
    pub sale_id: String,
    pub lines: Vec<ReturnLine>,
    pub reason: Option<String>,
    pub refund_method: Option<String>,
    /// Explicit return number; generated when absent.
    pub return_number: Option<String>,
    /// Complete immediately (restock now) instead of leaving pending.
    pub complete_immediately: bool,
}

/// A stock restore/reversal that failed after a status transition.
#[derive(Debug, Clone, Serialize)]
pub struct StockEffectFailure {
    pub product_id: String,
    pub reason: String,
}

/// Result of a return creation or transition.
///
/// Non-empty `stock_failures` means the status transition stands but one
/// or more ledger effects did not apply; surfaced for reconciliation, the
/// same philosophy as sale partial failures.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnOutcome {
    pub ret: Return,
    pub items: Vec<ReturnItem>,
    pub stock_failures: Vec<StockEffectFailure>,
}

// =============================================================================
// Return Service
// =============================================================================

/// Orchestrates return creation and status transitions.
#[derive(Debug, Clone)]
pub struct ReturnService {
    router: Arc<ConnectionRouter>,
}

impl ReturnService {
    pub fn new(router: Arc<ConnectionRouter>) -> Self {
        ReturnService { router }
    }

    /// Creates a return against a sale.
    ///
    /// Line prices come from the ORIGINAL sale items, not current catalog
    /// pricing. A product that was not on the sale fails the over-return
    /// check with `sold = 0`.
    pub async fn create(
        &self,
        tenant_id: &str,
        actor_id: &str,
        request: CreateReturnRequest,
    ) -> TxnResult<ReturnOutcome> {
        validate_line_count(request.lines.len()).map_err(CoreError::from)?;
        for line in &request.lines {
            validate_quantity(line.quantity).map_err(CoreError::from)?;
        }

        let store = self.router.resolve(tenant_id)?;
        let sales = store.sales();
        let returns = store.returns();

        let sale = match sales.get_by_id(&request.sale_id).await {
            Ok(sale) => sale,
            Err(DbError::NotFound { .. }) => {
                return Err(CoreError::SaleNotFound(request.sale_id.clone()).into())
            }
            Err(e) => return Err(e.into()),
        };
        let sale_items = sales.get_items(&sale.id).await?;

        // Quantity sold and original unit price per product on this sale
        let sold: HashMap<&str, (i64, i64)> = sale_items
            .iter()
            .map(|i| (i.product_id.as_str(), (i.quantity, i.unit_price_cents)))
            .collect();

        let return_number = request.return_number.unwrap_or_else(next_return_number);

        // Check-then-insert runs in one write transaction: the returned-qty
        // sum cannot go stale between the check and the insert.
        let mut tx = returns.begin().await?;
        let already_returned =
            ReturnRepository::returned_qty_by_product_tx(&mut tx, tenant_id, &sale.id).await?;


        let now = Utc::now();
        let return_id = Uuid::new_v4().to_string();
        let mut subtotal = Money::zero();
        let mut items = Vec::with_capacity(request.lines.len());

        for line in &request.lines {
            let (sold_qty, unit_price_cents) = sold
                .get(line.product_id.as_str())
                .copied()
                .unwrap_or((0, 0));
            let prior = already_returned
                .get(&line.product_id)
                .copied()
                .unwrap_or(0);
            check_return_qty(&line.product_id, sold_qty, prior, line.quantity)?;

            let line_total = Money::from_cents(unit_price_cents).multiply_quantity(line.quantity);
            subtotal += line_total;
            items.push(ReturnItem {
                id: Uuid::new_v4().to_string(),
                return_id: return_id.clone(),
                tenant_id: tenant_id.to_string(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_cents,
                line_total_cents: line_total.cents(),
                created_at: now,
            });
        }

        let breakdown = prorate_refund(
            subtotal,
            Money::from_cents(sale.subtotal_cents),
            Money::from_cents(sale.discount_cents),
            Money::from_cents(sale.tax_cents),
        );

        let ret = Return {
            id: return_id,
            tenant_id: tenant_id.to_string(),
            return_number,
            sale_id: sale.id.clone(),
            reason: request.reason,
            refund_method: request.refund_method,
            subtotal_cents: breakdown.subtotal.cents(),
            discount_cents: breakdown.discount.cents(),
            tax_cents: breakdown.tax.cents(),
            total_cents: breakdown.total.cents(),
            status: ReturnStatus::Pending,
            created_by: actor_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        ReturnRepository::insert_tx(&mut tx, &ret, &items).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            return_id = %ret.id,
            sale_id = %sale.id,
            refund_cents = ret.total_cents,
            "Return recorded"
        );

        if request.complete_immediately {
            return self
                .set_status(tenant_id, actor_id, &ret.id, ReturnStatus::Completed)
                .await;
        }

        Ok(ReturnOutcome {
            ret,
            items,
            stock_failures: Vec::new(),
        })
    }

    /// Transitions a return's status, applying stock effects exactly once.
    ///
    /// ## Transition Effects
    /// - pending → completed: restock every returned line
    /// - completed → cancelled: reverse the restock
    /// - pending → cancelled: no stock effect
    ///
    /// ## Errors
    /// `InvalidTransition` for any move the state machine forbids, and for
    /// a lost race (the return was concurrently moved out of its observed
    /// status before this call's swap landed).
    pub async fn set_status(
        &self,
        tenant_id: &str,
        actor_id: &str,
        return_id: &str,
        to: ReturnStatus,
    ) -> TxnResult<ReturnOutcome> {
        let store = self.router.resolve(tenant_id)?;
        let returns = store.returns();

        let ret = match returns.get_by_id(return_id).await {
            Ok(ret) => ret,
            Err(DbError::NotFound { .. }) => {
                return Err(CoreError::ReturnNotFound(return_id.to_string()).into())
            }
            Err(e) => return Err(e.into()),
        };
        let from = ret.status;

        if !from.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            }
            .into());
        }

        // The swap decides the winner; losers see the live status and fail
        // like any other bad transition. Stock effects below run only on
        // the winning path, which is what makes them exactly-once.
        if !returns.update_status_guarded(return_id, from, to).await? {
            let live = returns.get_by_id(return_id).await?;
            return Err(CoreError::InvalidTransition {
                from: live.status.as_str().to_string(),
                to: to.as_str().to_string(),
            }
            .into());
        }

        let items = returns.get_items(return_id).await?;
        let stock_failures = match (from, to) {
            (ReturnStatus::Pending, ReturnStatus::Completed) => {
                self.apply_stock_effects(&store, &items, actor_id, return_id, false)
                    .await
            }
            (ReturnStatus::Completed, ReturnStatus::Cancelled) => {
                self.apply_stock_effects(&store, &items, actor_id, return_id, true)
                    .await
            }
            _ => Vec::new(),
        };

        let ret = returns.get_by_id(return_id).await?;
        Ok(ReturnOutcome {
            ret,
            items,
            stock_failures,
        })
    }

    /// Fetches a return with its line items.
    pub async fn get(
        &self,
        tenant_id: &str,
        return_id: &str,
    ) -> TxnResult<(Return, Vec<ReturnItem>)> {
        let store = self.router.resolve(tenant_id)?;
        let returns = store.returns();
        let ret = match returns.get_by_id(return_id).await {
            Ok(ret) => ret,
            Err(DbError::NotFound { .. }) => {
                return Err(CoreError::ReturnNotFound(return_id.to_string()).into())
            }
            Err(e) => return Err(e.into()),
        };
        let items = returns.get_items(return_id).await?;
        Ok((ret, items))
    }

    /// Restocks (or reverses a restock of) every line of a return.
    ///
    /// Failures do not roll the committed transition back; they are
    /// reported for reconciliation.
    async fn apply_stock_effects(
        &self,
        store: &StoreHandle,
        items: &[ReturnItem],
        actor_id: &str,
        return_id: &str,
        reverse: bool,
    ) -> Vec<StockEffectFailure> {
        let inventory = store.inventory();
        let mut failures = Vec::new();

        for item in items {
            let result = if reverse {
                inventory
                    .decrement(
                        &item.product_id,
                        item.quantity,
                        actor_id,
                        Some("return"),
                        Some(return_id),
                    )
                    .await
            } else {
                inventory
                    .increment(
                        &item.product_id,
                        item.quantity,
                        actor_id,
                        Some("return"),
                        Some(return_id),
                    )
                    .await
            };

            if let Err(e) = result {
                warn!(
                    return_id = %return_id,
                    product_id = %item.product_id,
                    reverse = reverse,
                    error = %e,
                    "Stock effect failed after return transition"
                );
                failures.push(StockEffectFailure {
                    product_id: item.product_id.clone(),
                    reason: e.to_string(),
                });
            }
        }

        failures
    }

}

/// Return numbers: timestamp plus a random tail, same collision-free
/// scheme as invoice numbers.
fn next_return_number() -> String {
    let tail = Uuid::new_v4().simple().to_string();
    format!(
        "RET-{}-{}",
        Utc::now().format("%Y%m%d-%H%M%S"),
        tail[..6].to_uppercase()
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TxnError;
    use crate::sale::{CreateSaleRequest, SaleLine, SaleService};
    use plaza_core::Product;
    use plaza_db::RouterConfig;

    const TENANT: &str = "shop-test";
    const ACTOR: &str = "user-1";

    /// Creates a router with one product (price 10.00, qty 100) and one
    /// committed sale of `sold_qty` units with the given discount/tax.
    async fn setup_with_sale(
        sold_qty: i64,
        discount_cents: i64,
        tax_cents: i64,
    ) -> (Arc<ConnectionRouter>, Product, String) {
        let router = Arc::new(
            ConnectionRouter::connect(RouterConfig::in_memory())
                .await
                .unwrap(),
        );

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            tenant_id: TENANT.to_string(),
            sku: "SKU-1".to_string(),
            name: "Widget".to_string(),
            category: None,
            cost_cents: 500,
            price_cents: 1000,
            unit: None,
            min_stock_level: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        router
            .resolve(TENANT)
            .unwrap()
            .products()
            .insert(&product, 100)
            .await
            .unwrap();

        let outcome = SaleService::new(Arc::clone(&router))
            .create(
                TENANT,
                ACTOR,
                CreateSaleRequest {
                    lines: vec![SaleLine {
                        product_id: product.id.clone(),
                        quantity: sold_qty,
                        unit_price_cents: None,
                    }],
                    customer_ref: None,
                    discount_cents,
                    tax_cents,
                    cash_cents: 0,
                    bank_cents: 0,
                    invoice_number: None,
                },
            )
            .await
            .unwrap();
        assert!(outcome.failed_lines.is_empty());

        (router, product, outcome.sale.id)
    }

    fn return_request(sale_id: &str, product_id: &str, quantity: i64) -> CreateReturnRequest {
        CreateReturnRequest {
            sale_id: sale_id.to_string(),
            lines: vec![ReturnLine {
                product_id: product_id.to_string(),
                quantity,
            }],
            reason: Some("defective".to_string()),
            refund_method: Some("cash".to_string()),
            return_number: None,
            complete_immediately: false,
        }
    }

    async fn current_qty(router: &ConnectionRouter, product_id: &str) -> i64 {
        router
            .resolve(TENANT)
            .unwrap()
            .inventory()
            .get(product_id)
            .await
            .unwrap()
            .current_qty
    }

    #[tokio::test]
    async fn test_over_return_guard_spans_multiple_returns() {
        let (router, product, sale_id) = setup_with_sale(10, 0, 0).await;
        let service = ReturnService::new(Arc::clone(&router));

        // Return 4 of 10: fine
        let outcome = service
            .create(TENANT, ACTOR, return_request(&sale_id, &product.id, 4))
            .await
            .unwrap();
        assert_eq!(outcome.ret.status, ReturnStatus::Pending);
        assert!(outcome.ret.return_number.starts_with("RET-"));

        // Then 7 more would make 11 of 10: rejected with full context
        let err = service
            .create(TENANT, ACTOR, return_request(&sale_id, &product.id, 7))
            .await
            .unwrap_err();
        match err {
            TxnError::Core(CoreError::OverReturn {
                sold,
                already_returned,
                requested,
                ..
            }) => {
                assert_eq!(sold, 10);
                assert_eq!(already_returned, 4);
                assert_eq!(requested, 7);
            }
            other => panic!("expected OverReturn, got {other:?}"),
        }

        // The exact remainder is still allowed
        assert!(service
            .create(TENANT, ACTOR, return_request(&sale_id, &product.id, 6))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_returns_on_one_sale_get_distinct_numbers() {
        let (router, product, sale_id) = setup_with_sale(10, 0, 0).await;
        let service = ReturnService::new(Arc::clone(&router));

        let first = service
            .create(TENANT, ACTOR, return_request(&sale_id, &product.id, 2))
            .await
            .unwrap();
        let second = service
            .create(TENANT, ACTOR, return_request(&sale_id, &product.id, 3))
            .await
            .unwrap();

        assert!(first.ret.return_number.starts_with("RET-"));
        assert_ne!(first.ret.return_number, second.ret.return_number);
    }

    #[tokio::test]
    async fn test_product_not_on_sale_fails_over_return_with_zero_sold() {
        let (router, _, sale_id) = setup_with_sale(10, 0, 0).await;
        let service = ReturnService::new(Arc::clone(&router));

        let err = service
            .create(TENANT, ACTOR, return_request(&sale_id, "other-product", 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TxnError::Core(CoreError::OverReturn { sold: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_returns_free_their_quantity() {
        let (router, product, sale_id) = setup_with_sale(10, 0, 0).await;
        let service = ReturnService::new(Arc::clone(&router));

        let first = service
            .create(TENANT, ACTOR, return_request(&sale_id, &product.id, 8))
            .await
            .unwrap();
        service
            .set_status(TENANT, ACTOR, &first.ret.id, ReturnStatus::Cancelled)
            .await
            .unwrap();

        // 8 were cancelled, so all 10 are returnable again
        assert!(service
            .create(TENANT, ACTOR, return_request(&sale_id, &product.id, 10))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_refund_proration_matches_sale_fraction() {
        // Sale: 10 × 10.00 = 100.00, discount 10.00, tax 5.00
        let (router, product, sale_id) = setup_with_sale(10, 1000, 500).await;
        let service = ReturnService::new(Arc::clone(&router));

        // Return 4 lines = 40.00 → 40% of discount and tax
        let outcome = service
            .create(TENANT, ACTOR, return_request(&sale_id, &product.id, 4))
            .await
            .unwrap();
        assert_eq!(outcome.ret.subtotal_cents, 4000);
        assert_eq!(outcome.ret.discount_cents, 400);
        assert_eq!(outcome.ret.tax_cents, 200);
        assert_eq!(outcome.ret.total_cents, 3800);
        assert_eq!(outcome.items[0].unit_price_cents, 1000);
    }

    #[tokio::test]
    async fn test_completion_restores_stock_exactly_once() {
        let (router, product, sale_id) = setup_with_sale(10, 0, 0).await;
        let service = ReturnService::new(Arc::clone(&router));
        assert_eq!(current_qty(&router, &product.id).await, 90);

        let pending = service
            .create(TENANT, ACTOR, return_request(&sale_id, &product.id, 4))
            .await
            .unwrap();
        // Pending returns have no stock effect yet
        assert_eq!(current_qty(&router, &product.id).await, 90);

        let completed = service
            .set_status(TENANT, ACTOR, &pending.ret.id, ReturnStatus::Completed)
            .await
            .unwrap();
        assert!(completed.stock_failures.is_empty());
        assert_eq!(current_qty(&router, &product.id).await, 94);

        // Completing again is an invalid transition and restores nothing
        let err = service
            .set_status(TENANT, ACTOR, &pending.ret.id, ReturnStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TxnError::Core(CoreError::InvalidTransition { .. })
        ));
        assert_eq!(current_qty(&router, &product.id).await, 94);
    }

    #[tokio::test]
    async fn test_cancelling_completed_return_reverses_restock() {
        let (router, product, sale_id) = setup_with_sale(10, 0, 0).await;
        let service = ReturnService::new(Arc::clone(&router));

        let mut request = return_request(&sale_id, &product.id, 4);
        request.complete_immediately = true;
        let outcome = service.create(TENANT, ACTOR, request).await.unwrap();
        assert_eq!(outcome.ret.status, ReturnStatus::Completed);
        assert_eq!(current_qty(&router, &product.id).await, 94);

        service
            .set_status(TENANT, ACTOR, &outcome.ret.id, ReturnStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(current_qty(&router, &product.id).await, 90);

        // Cancelled is terminal
        assert!(matches!(
            service
                .set_status(TENANT, ACTOR, &outcome.ret.id, ReturnStatus::Completed)
                .await,
            Err(TxnError::Core(CoreError::InvalidTransition { .. }))
        ));
    }

    #[tokio::test]
    async fn test_full_return_round_trip_restores_presale_stock() {
        let (router, product, sale_id) = setup_with_sale(10, 0, 0).await;
        let service = ReturnService::new(Arc::clone(&router));

        let mut request = return_request(&sale_id, &product.id, 10);
        request.complete_immediately = true;
        let outcome = service.create(TENANT, ACTOR, request).await.unwrap();

        assert_eq!(outcome.ret.total_cents, 10000);
        assert_eq!(current_qty(&router, &product.id).await, 100);
    }
}
