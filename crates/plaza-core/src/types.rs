//! # Domain Types
//!
//! Core domain types used throughout Plaza POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Shop       │   │      User       │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id             │       │
//! │  │  status         │   │  role           │   │  sku (business) │       │
//! │  │  subscription   │   │  overrides      │   │  price_cents    │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │ 1:1            │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────┴────────┐       │
//! │  │      Sale       │   │     Return      │   │  StockRecord    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  invoice_number │◄──┤  sale_id        │   │  current_qty    │       │
//! │  │  line items     │   │  status machine │   │  available_qty  │       │
//! │  │  totals         │   │  refund amounts │   │  is_low_stock   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, invoice_number, return_number) - human-readable,
//!   unique per tenant
//!
//! ## Tenant Scoping
//! Every tenant-owned row carries `tenant_id`. The reserved namespace
//! [`SYSTEM_TENANT_ID`] holds the shops directory and super-admin users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::permissions::{Permission, Role};

/// Reserved namespace for system-scoped records (shops directory,
/// super-admin users). Never a valid shop identifier.
pub const SYSTEM_TENANT_ID: &str = "system";

// =============================================================================
// Shop (Tenant)
// =============================================================================

/// Lifecycle status of a shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ShopStatus {
    /// Open for business; requests for this tenant pass the status gate.
    Active,
    /// Temporarily blocked (billing, abuse). Data retained, requests denied.
    Suspended,
    /// Closed. Terminal state; data retained for audit, requests denied.
    Inactive,
}

impl ShopStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ShopStatus::Active => "active",
            ShopStatus::Suspended => "suspended",
            ShopStatus::Inactive => "inactive",
        }
    }
}

/// A shop (tenant): the isolation unit. One row in the system namespace.
///
/// Shops are never hard-deleted and never merged with another tenant's data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Shop {
    /// Unique identifier; also the storage-namespace key.
    pub id: String,
    pub name: String,
    pub status: ShopStatus,
    /// Requests fail `SubscriptionExpired` once this passes, independent of
    /// status. Re-checked on every request, never cached in a token.
    pub subscription_expires_at: DateTime<Utc>,
    pub owner_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shop {
    /// Whether the subscription has lapsed as of `now`.
    pub fn subscription_expired(&self, now: DateTime<Utc>) -> bool {
        self.subscription_expires_at < now
    }
}

// =============================================================================
// User
// =============================================================================

/// A user account.
///
/// Super-admin users live in the system namespace (`tenant_id = "system"`);
/// all other users live inside their shop's namespace. Email is unique
/// within its namespace. Users are deactivated, never hard-deleted, once
/// referenced by any transactional record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Namespace the user lives in: [`SYSTEM_TENANT_ID`] for super-admins.
    pub tenant_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Additive permission grants beyond the role's defaults.
    pub permission_overrides: Vec<Permission>,
    pub is_active: bool,
    /// Argon2 hash; never the credential itself.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The tenant this user is bound to, or `None` for super-admins.
    pub fn tenant_context(&self) -> Option<&str> {
        if self.tenant_id == SYSTEM_TENANT_ID {
            None
        } else {
            Some(&self.tenant_id)
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Tenant this product belongs to.
    pub tenant_id: String,
    /// Stock Keeping Unit - business identifier, unique per tenant.
    pub sku: String,
    /// Display name shown on receipts.
    pub name: String,
    pub category: Option<String>,
    /// Purchase price in cents.
    pub cost_cents: i64,
    /// Selling price in cents. Authoritative for sale pricing.
    pub price_cents: i64,
    /// Unit of measure ("pcs", "kg", ...).
    pub unit: Option<String>,
    /// Low-stock threshold. `None` means never configured; the ledger
    /// treats that as 0 (source-system behavior, preserved).
    pub min_stock_level: Option<i64>,
    /// Whether product is active (soft delete).
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// The effective low-stock threshold (missing threshold reads as 0).
    #[inline]
    pub fn min_stock(&self) -> i64 {
        self.min_stock_level.unwrap_or(0)
    }
}

// =============================================================================
// Stock Record
// =============================================================================

/// One stock record per (tenant, product) pair.
///
/// ## Invariants
/// - `available_qty = current_qty - reserved_qty`, always >= 0
/// - `is_low_stock = current_qty <= min_stock_level`
///
/// Mutated exclusively through the inventory ledger's guarded updates;
/// collaborators must never write these rows directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockRecord {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub current_qty: i64,
    pub reserved_qty: i64,
    pub available_qty: i64,
    /// Denormalized from the product at creation time.
    pub min_stock_level: i64,
    pub is_low_stock: bool,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// What caused a stock mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Sale,
    Return,
    Purchase,
    Adjustment,
}

/// An immutable audit record of one stock mutation.
///
/// Appended after every successful ledger mutation. If the append itself
/// fails, the stock mutation stands and the failure is surfaced as a
/// warning - audit gaps are reconcilable, silently lost stock is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub kind: MovementKind,
    /// Signed delta: negative for outflow, positive for inflow.
    pub quantity: i64,
    /// What the movement references ("sale", "return", ...).
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    /// Operator-supplied reason, set for manual adjustments.
    pub reason: Option<String>,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale.
///
/// Immutable once created. Returns reference it via `returns.sale_id`;
/// nothing on the sale row itself is ever updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    /// Business identifier, unique per tenant.
    pub invoice_number: String,
    pub customer_ref: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Payment split: cash portion.
    pub cash_cents: i64,
    /// Payment split: bank portion.
    pub bank_cents: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub tenant_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Line total (unit_price × quantity).
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

// =============================================================================
// Return
// =============================================================================

/// The status of a return, with a one-way state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    /// Recorded, stock not yet restored.
    Pending,
    /// Stock restored, refund owed/paid.
    Completed,
    /// Withdrawn. Terminal: nothing transitions out of cancelled.
    Cancelled,
}

impl ReturnStatus {
    /// The transition table:
    /// pending → completed, pending → cancelled, completed → cancelled.
    pub const fn can_transition_to(&self, next: ReturnStatus) -> bool {
        matches!(
            (self, next),
            (ReturnStatus::Pending, ReturnStatus::Completed)
                | (ReturnStatus::Pending, ReturnStatus::Cancelled)
                | (ReturnStatus::Completed, ReturnStatus::Cancelled)
        )
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Completed => "completed",
            ReturnStatus::Cancelled => "cancelled",
        }
    }
}

/// A return against a prior sale.
///
/// Refund amounts are prorated from sale-level discount/tax by the fraction
/// of the sale subtotal being returned (see `refund` module). This is a
/// preserved approximation, not per-line tax re-derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Return {
    pub id: String,
    pub tenant_id: String,
    /// Business identifier, unique per tenant.
    pub return_number: String,
    /// The originating sale.
    pub sale_id: String,
    pub reason: Option<String>,
    pub refund_method: Option<String>,
    /// Sum of returned lines at original sale prices.
    pub subtotal_cents: i64,
    /// Prorated share of the sale's discount.
    pub discount_cents: i64,
    /// Prorated share of the sale's tax.
    pub tax_cents: i64,
    /// subtotal - discount + tax.
    pub total_cents: i64,
    pub status: ReturnStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item in a return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReturnItem {
    pub id: String,
    pub return_id: String,
    pub tenant_id: String,
    /// Denormalized for the per-sale over-return sum.
    pub sale_id: String,
    pub product_id: String,
    /// Quantity returned.
    pub quantity: i64,
    /// Unit price at time of the ORIGINAL sale, not current pricing.
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
