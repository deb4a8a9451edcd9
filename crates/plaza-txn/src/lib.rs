//! # plaza-txn: Sale & Return Workflows for Plaza POS
//!
//! Multi-step transactional workflows over the storage layer.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          plaza-txn                                      │
//! │                                                                         │
//! │  SaleService::create                                                   │
//! │    validate → price from catalog → persist sale (atomic)               │
//! │    → guarded stock decrements, per-line failures REPORTED              │
//! │                                                                         │
//! │  ReturnService::create                                                 │
//! │    validate → over-return check + insert in ONE transaction            │
//! │    → refund proration from sale-level amounts                          │
//! │                                                                         │
//! │  ReturnService::set_status                                             │
//! │    state machine check → compare-and-swap → exactly-once stock effect  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod returns;
pub mod sale;

pub use error::{TxnError, TxnResult};
pub use returns::{CreateReturnRequest, ReturnLine, ReturnOutcome, ReturnService};
pub use sale::{CreateSaleRequest, FailedLine, SaleLine, SaleOutcome, SaleService};
