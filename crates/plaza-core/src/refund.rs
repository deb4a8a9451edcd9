//! # Refund Math
//!
//! Pure calculations for return validation and refund proration.
//!
//! ## Proration Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Ratio-Based Refund Proration                         │
//! │                                                                         │
//! │  Sale:   subtotal 100.00, discount 10.00, tax 5.00                     │
//! │  Return: lines worth 40.00 at original sale prices                     │
//! │                                                                         │
//! │  ratio           = 4000 / 10000            (40% of the sale)           │
//! │  refund_discount = 10.00 × ratio = 4.00                                │
//! │  refund_tax      =  5.00 × ratio = 2.00                                │
//! │  total_refund    = 40.00 - 4.00 + 2.00 = 38.00                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Discount and tax are prorated from SALE-LEVEL amounts by the returned
//! fraction of the subtotal, not re-derived per line. This is a preserved
//! approximation kept for output compatibility with the existing system;
//! revising it is a spec change, not a bug fix.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Over-Return Guard
// =============================================================================

/// How much of one product line may still be returned.
///
/// `sold` is the quantity on the original sale line; `already_returned` is
/// the sum over all NON-CANCELLED returns referencing the same sale and
/// product. Never negative.
#[inline]
pub fn remaining_returnable(sold: i64, already_returned: i64) -> i64 {
    (sold - already_returned).max(0)
}

/// Validates one requested return line against the over-return invariant.
pub fn check_return_qty(
    product_id: &str,
    sold: i64,
    already_returned: i64,
    requested: i64,
) -> CoreResult<()> {
    if requested > remaining_returnable(sold, already_returned) {
        return Err(CoreError::OverReturn {
            product_id: product_id.to_string(),
            sold,
            already_returned,
            requested,
        });
    }
    Ok(())
}

// =============================================================================
// Refund Proration
// =============================================================================

/// The prorated refund amounts for one return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundBreakdown {
    /// Returned lines at original sale prices.
    pub subtotal: Money,
    /// Prorated share of the sale's discount.
    pub discount: Money,
    /// Prorated share of the sale's tax.
    pub tax: Money,
    /// subtotal - discount + tax.
    pub total: Money,
}

/// Prorates sale-level discount and tax over the returned fraction.
///
/// A zero sale subtotal prorates nothing (the refund is the raw return
/// subtotal); a full return refunds discount and tax in full with no
/// rounding residue.
pub fn prorate_refund(
    return_subtotal: Money,
    sale_subtotal: Money,
    sale_discount: Money,
    sale_tax: Money,
) -> RefundBreakdown {
    let discount = sale_discount.prorate(return_subtotal.cents(), sale_subtotal.cents());
    let tax = sale_tax.prorate(return_subtotal.cents(), sale_subtotal.cents());

    RefundBreakdown {
        subtotal: return_subtotal,
        discount,
        tax,
        total: return_subtotal - discount + tax,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_returnable() {
        assert_eq!(remaining_returnable(10, 0), 10);
        assert_eq!(remaining_returnable(10, 4), 6);
        assert_eq!(remaining_returnable(10, 10), 0);
        // Over-returned data (shouldn't happen) still clamps at zero
        assert_eq!(remaining_returnable(10, 12), 0);
    }

    #[test]
    fn test_check_return_qty_allows_exact_remainder() {
        assert!(check_return_qty("p1", 10, 4, 6).is_ok());
    }

    #[test]
    fn test_check_return_qty_rejects_over_return() {
        // 4 already returned of 10 sold; 7 more would make 11 > 10
        let err = check_return_qty("p1", 10, 4, 7).unwrap_err();
        match err {
            CoreError::OverReturn {
                sold,
                already_returned,
                requested,
                ..
            } => {
                assert_eq!(sold, 10);
                assert_eq!(already_returned, 4);
                assert_eq!(requested, 7);
            }
            other => panic!("expected OverReturn, got {other:?}"),
        }
    }

    #[test]
    fn test_prorate_refund_partial() {
        let breakdown = prorate_refund(
            Money::from_cents(4000),
            Money::from_cents(10000),
            Money::from_cents(1000),
            Money::from_cents(500),
        );
        assert_eq!(breakdown.discount.cents(), 400);
        assert_eq!(breakdown.tax.cents(), 200);
        assert_eq!(breakdown.total.cents(), 3800);
    }

    #[test]
    fn test_prorate_refund_full_return_is_exact() {
        let breakdown = prorate_refund(
            Money::from_cents(10000),
            Money::from_cents(10000),
            Money::from_cents(999), // awkward amounts must not leave residue
            Money::from_cents(333),
        );
        assert_eq!(breakdown.discount.cents(), 999);
        assert_eq!(breakdown.tax.cents(), 333);
        assert_eq!(breakdown.total.cents(), 10000 - 999 + 333);
    }

    #[test]
    fn test_prorate_refund_zero_subtotal_sale() {
        let breakdown = prorate_refund(
            Money::from_cents(500),
            Money::zero(),
            Money::from_cents(100),
            Money::from_cents(50),
        );
        assert_eq!(breakdown.discount.cents(), 0);
        assert_eq!(breakdown.tax.cents(), 0);
        assert_eq!(breakdown.total.cents(), 500);
    }
}
