//! # Error Types
//!
//! Domain-specific error types for plaza-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  plaza-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  plaza-db errors (separate crate)                                      │
//! │  └── DbError          - Storage and routing failures                   │
//! │                                                                         │
//! │  plaza-auth errors (separate crate)                                    │
//! │  └── AuthError        - Token, identity, tenant-status failures        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → TxnError → HTTP status code       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, quantities, status)
//! 3. Errors are enum variants, never String
//! 4. Every variant is recoverable and caller-correctable - never a panic

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    ///
    /// ## When This Occurs
    /// - Product ID doesn't exist in the tenant's namespace
    /// - Product was deactivated (soft delete)
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Insufficient stock to complete a sale line.
    ///
    /// ## When This Occurs
    /// - The advisory pre-check sees `current_qty < requested`
    /// - The ledger's guarded decrement refuses to go negative
    ///
    /// Note the pre-check is advisory only; the guarded update in the
    /// ledger is the enforcement point under concurrency.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Return not found.
    #[error("Return not found: {0}")]
    ReturnNotFound(String),

    /// A return line asks for more than remains returnable on the sale.
    ///
    /// ## Invariant
    /// For every product line, the sum of non-cancelled return quantities
    /// across all returns referencing one sale must never exceed the
    /// quantity sold on that sale.
    #[error(
        "Over-return for product {product_id}: sold {sold}, \
         already returned {already_returned}, requested {requested}"
    )]
    OverReturn {
        product_id: String,
        sold: i64,
        already_returned: i64,
        requested: i64,
    },

    /// Illegal return status transition.
    ///
    /// Allowed: pending → completed, pending → cancelled,
    /// completed → cancelled. Nothing leaves cancelled.
    #[error("Invalid return transition: {from} → {to}")]
    InvalidTransition { from: String, to: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative (zero allowed).
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid identifier, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate SKU within a tenant).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "COKE-330".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for COKE-330: available 3, requested 5"
        );
    }

    #[test]
    fn test_over_return_message() {
        let err = CoreError::OverReturn {
            product_id: "p1".to_string(),
            sold: 10,
            already_returned: 4,
            requested: 7,
        };
        assert!(err.to_string().contains("sold 10"));
        assert!(err.to_string().contains("requested 7"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
