//! # plaza-core: Pure Business Logic for Plaza POS
//!
//! This crate is the **heart** of Plaza POS. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Plaza POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               External Collaborators                            │   │
//! │  │    HTTP layer ── bulk import ── reporting ── notifications      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          plaza-txn (Sale/Return) · plaza-auth (Sessions)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ plaza-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │permissions│  │  refund   │  │   │
//! │  │   │ Shop/User │  │   Money   │  │ Role table│  │ proration │  │   │
//! │  │   │ Sale/Stock│  │  prorate  │  │ overrides │  │over-return│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    plaza-db (Storage Layer)                     │   │
//! │  │         ConnectionRouter, repositories, inventory ledger        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Shop, User, Product, StockRecord, Sale, Return)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`permissions`] - Closed permission enum and the role table
//! - [`refund`] - Over-return guard and ratio-based refund proration
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//! 5. **Closed Permission Set**: authorization can never be driven by a free-form string

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod permissions;
pub mod refund;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use plaza_core::Money` instead of
// `use plaza_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use permissions::{effective_permissions, has_permission, Permission, Role};
pub use refund::{check_return_qty, prorate_refund, remaining_returnable, RefundBreakdown};
pub use types::*;
