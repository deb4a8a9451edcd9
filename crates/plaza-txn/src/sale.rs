//! # Sale Workflow
//!
//! Creates sales: validates the cart, prices it from the live catalog,
//! persists the sale, then applies stock decrements.
//!
//! ## Partial Failure Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    create(request)                                      │
//! │                                                                         │
//! │  1. Validate cart shape              → fail whole request              │
//! │  2. Load products + advisory check   → fail whole request              │
//! │  3. Persist sale + items (atomic)    → fail whole request              │
//! │  4. Decrement stock per line         → per-line failures REPORTED      │
//! │                                        in SaleOutcome.failed_lines     │
//! │                                                                         │
//! │  Step 4 failures do NOT delete the sale: money already (conceptually)  │
//! │  changed hands, and a compensating delete would hide the discrepancy   │
//! │  instead of surfacing it for reconciliation. The advisory check in     │
//! │  step 2 makes step 4 failures rare; the ledger guard makes concurrent  │
//! │  oversell impossible either way.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use plaza_core::validation::{
    validate_line_count, validate_non_negative_amount, validate_quantity,
};
use plaza_core::{CoreError, Money, Sale, SaleItem};
use plaza_db::{ConnectionRouter, DbError};

use crate::error::TxnResult;

// =============================================================================
// Request / Outcome Types
// =============================================================================

/// One requested cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
    /// Optional price override in cents. Ignored unless positive; the
    /// catalog price is authoritative otherwise.
    pub unit_price_cents: Option<i64>,
}

/// A sale creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleRequest {
    pub lines: Vec<SaleLine>,
    pub customer_ref: Option<String>,
    pub discount_cents: i64,
    pub tax_cents: i64,
    /// Payment split. Not reconciled against the total here; the source
    /// system records the split as tendered.
    pub cash_cents: i64,
    pub bank_cents: i64,
    /// Explicit invoice number; generated when absent.
    pub invoice_number: Option<String>,
}

/// A stock decrement that failed after the sale was committed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedLine {
    pub product_id: String,
    pub sku: String,
    pub reason: String,
}

/// Result of a sale creation.
///
/// `failed_lines` non-empty means the sale stands but one or more stock
/// decrements did not apply; the caller surfaces this for reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct SaleOutcome {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub failed_lines: Vec<FailedLine>,
}

// =============================================================================
// Sale Service
// =============================================================================

/// Orchestrates sale creation for any tenant.
#[derive(Debug, Clone)]
pub struct SaleService {
    router: Arc<ConnectionRouter>,
}

impl SaleService {
    pub fn new(router: Arc<ConnectionRouter>) -> Self {
        SaleService { router }
    }

    /// Creates a sale.
    ///
    /// Pricing is authoritative from the catalog: a line's override price
    /// is honored only when positive, otherwise the product's current
    /// price applies. Line snapshots freeze sku/name/price at this moment.
    pub async fn create(
        &self,
        tenant_id: &str,
        actor_id: &str,
        request: CreateSaleRequest,
    ) -> TxnResult<SaleOutcome> {
        validate_line_count(request.lines.len()).map_err(CoreError::from)?;
        validate_non_negative_amount("discount", request.discount_cents)
            .map_err(CoreError::from)?;
        validate_non_negative_amount("tax", request.tax_cents).map_err(CoreError::from)?;
        validate_non_negative_amount("cash", request.cash_cents).map_err(CoreError::from)?;
        validate_non_negative_amount("bank", request.bank_cents).map_err(CoreError::from)?;
        for line in &request.lines {
            validate_quantity(line.quantity).map_err(CoreError::from)?;
        }

        let store = self.router.resolve(tenant_id)?;
        let products = store.products();
        let inventory = store.inventory();
        let sales = store.sales();
        let now = Utc::now();

        // Load + advisory stock check. This pass rejects obviously
        // unfulfillable carts before anything is written; the ledger guard
        // below remains the authoritative enforcement.
        let mut priced = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let product = match products.get_by_id(&line.product_id).await {
                Ok(p) if p.is_active => p,
                Ok(_) | Err(DbError::NotFound { .. }) => {
                    return Err(CoreError::ProductNotFound(line.product_id.clone()).into())
                }
                Err(e) => return Err(e.into()),
            };

            let stock = inventory.get(&product.id).await?;
            if stock.available_qty < line.quantity {
                return Err(CoreError::InsufficientStock {
                    sku: product.sku.clone(),
                    available: stock.available_qty,
                    requested: line.quantity,
                }
                .into());
            }

            let unit_price = match line.unit_price_cents {
                Some(cents) if cents > 0 => Money::from_cents(cents),
                _ => product.price(),
            };
            priced.push((product, line.quantity, unit_price));
        }

        let subtotal = priced
            .iter()
            .fold(Money::zero(), |acc, (_, qty, price)| {
                acc + price.multiply_quantity(*qty)
            });
        let total = subtotal - Money::from_cents(request.discount_cents)
            + Money::from_cents(request.tax_cents);
        if !total.is_positive() {
            return Err(CoreError::Validation(
                plaza_core::ValidationError::MustBePositive {
                    field: "total".to_string(),
                },
            )
            .into());
        }

        let invoice_number = request.invoice_number.unwrap_or_else(next_invoice_number);

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            invoice_number,
            customer_ref: request.customer_ref,
            subtotal_cents: subtotal.cents(),
            discount_cents: request.discount_cents,
            tax_cents: request.tax_cents,
            total_cents: total.cents(),
            cash_cents: request.cash_cents,
            bank_cents: request.bank_cents,
            created_by: actor_id.to_string(),
            created_at: now,
        };

        let items: Vec<SaleItem> = priced
            .iter()
            .map(|(product, qty, price)| SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                tenant_id: tenant_id.to_string(),
                product_id: product.id.clone(),
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                unit_price_cents: price.cents(),
                quantity: *qty,
                line_total_cents: price.multiply_quantity(*qty).cents(),
                created_at: now,
            })
            .collect();

        sales.insert(&sale, &items).await?;

        // Apply stock effects. A failure here leaves the committed sale in
        // place and is reported, never silently compensated.
        let mut failed_lines = Vec::new();
        for item in &items {
            if let Err(e) = inventory
                .decrement(
                    &item.product_id,
                    item.quantity,
                    actor_id,
                    Some("sale"),
                    Some(&sale.id),
                )
                .await
            {
                warn!(
                    sale_id = %sale.id,
                    product_id = %item.product_id,
                    error = %e,
                    "Stock decrement failed after sale commit"
                );
                failed_lines.push(FailedLine {
                    product_id: item.product_id.clone(),
                    sku: item.sku_snapshot.clone(),
                    reason: e.to_string(),
                });
            }
        }

        info!(
            sale_id = %sale.id,
            invoice = %sale.invoice_number,
            total_cents = sale.total_cents,
            failed_lines = failed_lines.len(),
            "Sale created"
        );

        Ok(SaleOutcome {
            sale,
            items,
            failed_lines,
        })
    }

    /// Fetches a sale with its line items.
    pub async fn get(&self, tenant_id: &str, sale_id: &str) -> TxnResult<(Sale, Vec<SaleItem>)> {
        let store = self.router.resolve(tenant_id)?;
        let sales = store.sales();
        let sale = match sales.get_by_id(sale_id).await {
            Ok(sale) => sale,
            Err(DbError::NotFound { .. }) => {
                return Err(CoreError::SaleNotFound(sale_id.to_string()).into())
            }
            Err(e) => return Err(e.into()),
        };
        let items = sales.get_items(sale_id).await?;
        Ok((sale, items))
    }

}

/// Invoice numbers: timestamp plus a random tail, e.g.
/// `INV-20260829-143502-7F3A9C`. No shared counter, so concurrent
/// creates cannot mint the same number.
fn next_invoice_number() -> String {
    let tail = Uuid::new_v4().simple().to_string();
    format!(
        "INV-{}-{}",
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
    use plaza_core::Product;
    use plaza_db::RouterConfig;

    const TENANT: &str = "shop-test";
    const ACTOR: &str = "user-1";

    async fn setup() -> Arc<ConnectionRouter> {
        Arc::new(
            ConnectionRouter::connect(RouterConfig::in_memory())
                .await
                .unwrap(),
        )
    }

    async fn insert_product(
        router: &ConnectionRouter,
        sku: &str,
        price_cents: i64,
        min_stock: Option<i64>,
        qty: i64,
    ) -> Product {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            tenant_id: TENANT.to_string(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            category: None,
            cost_cents: price_cents / 2,
            price_cents,
            unit: None,
            min_stock_level: min_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        router
            .resolve(TENANT)
            .unwrap()
            .products()
            .insert(&product, qty)
            .await
            .unwrap();
        product
    }

    fn one_line_request(product_id: &str, quantity: i64) -> CreateSaleRequest {
        CreateSaleRequest {
            lines: vec![SaleLine {
                product_id: product_id.to_string(),
                quantity,
                unit_price_cents: None,
            }],
            customer_ref: None,
            discount_cents: 0,
            tax_cents: 0,
            cash_cents: 0,
            bank_cents: 0,
            invoice_number: None,
        }
    }

    #[tokio::test]
    async fn test_sale_decrements_stock_and_recomputes_low_stock() {
        let router = setup().await;
        let product = insert_product(&router, "SKU-1", 100, Some(3), 12).await;
        let service = SaleService::new(Arc::clone(&router));

        let outcome = service
            .create(TENANT, ACTOR, one_line_request(&product.id, 10))
            .await
            .unwrap();

        assert!(outcome.failed_lines.is_empty());
        assert_eq!(outcome.sale.subtotal_cents, 1000);
        assert_eq!(outcome.sale.total_cents, 1000);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].sku_snapshot, "SKU-1");
        assert!(outcome.sale.invoice_number.starts_with("INV-"));

        let stock = router
            .resolve(TENANT)
            .unwrap()
            .inventory()
            .get(&product.id)
            .await
            .unwrap();
        assert_eq!(stock.current_qty, 2);
        assert!(stock.is_low_stock);
    }

    #[tokio::test]
    async fn test_sale_rejects_insufficient_stock_upfront() {
        let router = setup().await;
        let product = insert_product(&router, "SKU-1", 100, None, 5).await;
        let service = SaleService::new(Arc::clone(&router));

        let err = service
            .create(TENANT, ACTOR, one_line_request(&product.id, 6))
            .await
            .unwrap_err();

        match err {
            TxnError::Core(CoreError::InsufficientStock {
                sku,
                available,
                requested,
            }) => {
                assert_eq!(sku, "SKU-1");
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Nothing was written
        let stock = router
            .resolve(TENANT)
            .unwrap()
            .inventory()
            .get(&product.id)
            .await
            .unwrap();
        assert_eq!(stock.current_qty, 5);
    }

    #[tokio::test]
    async fn test_sale_rejects_unknown_and_inactive_products() {
        let router = setup().await;
        let product = insert_product(&router, "SKU-1", 100, None, 5).await;
        let service = SaleService::new(Arc::clone(&router));

        let err = service
            .create(TENANT, ACTOR, one_line_request("no-such-id", 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TxnError::Core(CoreError::ProductNotFound(_))
        ));

        router
            .resolve(TENANT)
            .unwrap()
            .products()
            .soft_delete(&product.id)
            .await
            .unwrap();
        let err = service
            .create(TENANT, ACTOR, one_line_request(&product.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TxnError::Core(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_catalog_price_is_authoritative() {
        let router = setup().await;
        let product = insert_product(&router, "SKU-1", 250, None, 10).await;
        let service = SaleService::new(Arc::clone(&router));

        // Zero/negative overrides are ignored; positive overrides apply
        let mut request = one_line_request(&product.id, 2);
        request.lines[0].unit_price_cents = Some(0);
        let outcome = service.create(TENANT, ACTOR, request).await.unwrap();
        assert_eq!(outcome.sale.subtotal_cents, 500);

        let mut request = one_line_request(&product.id, 2);
        request.lines[0].unit_price_cents = Some(200);
        let outcome = service.create(TENANT, ACTOR, request).await.unwrap();
        assert_eq!(outcome.sale.subtotal_cents, 400);
    }

    #[tokio::test]
    async fn test_sale_totals_with_discount_and_tax() {
        let router = setup().await;
        let product = insert_product(&router, "SKU-1", 1000, None, 100).await;
        let service = SaleService::new(Arc::clone(&router));

        let mut request = one_line_request(&product.id, 10);
        request.discount_cents = 1000;
        request.tax_cents = 500;
        request.cash_cents = 9500;

        let outcome = service.create(TENANT, ACTOR, request).await.unwrap();
        assert_eq!(outcome.sale.subtotal_cents, 10000);
        assert_eq!(outcome.sale.total_cents, 9500);

        let mut request = one_line_request(&product.id, 1);
        request.discount_cents = -5;
        assert!(matches!(
            service.create(TENANT, ACTOR, request).await,
            Err(TxnError::Core(CoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_sales_get_distinct_invoice_numbers() {
        let router = setup().await;
        let product = insert_product(&router, "SKU-1", 100, None, 100).await;
        let service = Arc::new(SaleService::new(Arc::clone(&router)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = Arc::clone(&service);
            let product_id = product.id.clone();
            handles.push(tokio::spawn(async move {
                service
                    .create(TENANT, ACTOR, one_line_request(&product_id, 1))
                    .await
            }));
        }

        let mut invoices = std::collections::HashSet::new();
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            invoices.insert(outcome.sale.invoice_number);
        }
        assert_eq!(invoices.len(), 8);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let router = setup().await;
        let service = SaleService::new(Arc::clone(&router));

        let request = CreateSaleRequest {
            lines: vec![],
            customer_ref: None,
            discount_cents: 0,
            tax_cents: 0,
            cash_cents: 0,
            bank_cents: 0,
            invoice_number: None,
        };
        assert!(matches!(
            service.create(TENANT, ACTOR, request).await,
            Err(TxnError::Core(CoreError::Validation(_)))
        ));
    }
}
