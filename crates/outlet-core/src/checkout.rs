//! # Checkout Pricing
//!
//! Turns batch allocations and a tender into the totals stored on a `Sale`.
//!
//! ## User Workflow
//! ```text
//! allocations ──► subtotal ──► + tax ──► total
//!                                          │
//!                     cash: payment >= total, change = payment - total
//!                     card: payment == total, change = 0
//! ```
//! Prices are tax-exclusive: `total_amount = subtotal + tax_amount`.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::inventory::BatchAllocation;
use crate::money::Money;
use crate::types::{PaymentMethod, TaxRate};

/// Amounts written onto a new sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub payment: Money,
    pub change: Money,
}

/// Prices a checkout.
///
/// ## Errors
/// * `CoreError::EmptyCart` - no allocations
/// * `CoreError::InvalidPayment` - cash short of the total, or a card amount
///   that differs from it
pub fn price_checkout(
    allocations: &[BatchAllocation],
    tax_rate: TaxRate,
    method: PaymentMethod,
    payment: Money,
) -> CoreResult<CheckoutTotals> {
    if allocations.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let subtotal: Money = allocations.iter().map(BatchAllocation::line_total).sum();
    let tax = subtotal.calculate_tax(tax_rate);
    let total = subtotal + tax;

    let change = match method {
        PaymentMethod::Cash => {
            if payment < total {
                return Err(CoreError::InvalidPayment {
                    reason: format!("cash {} does not cover total {}", payment, total),
                });
            }
            payment - total
        }
        PaymentMethod::Card => {
            if payment != total {
                return Err(CoreError::InvalidPayment {
                    reason: format!("card amount {} must equal total {}", payment, total),
                });
            }
            Money::zero()
        }
    };

    Ok(CheckoutTotals {
        subtotal,
        tax,
        total,
        payment,
        change,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(qty: i64, price: i64) -> BatchAllocation {
        BatchAllocation {
            product_id: 1,
            batch_id: 1,
            quantity: qty,
            unit_price: Money::from_cents(price),
        }
    }

    #[test]
    fn test_cash_with_change() {
        let allocs = [alloc(2, 1500), alloc(1, 1000)];
        let totals = price_checkout(
            &allocs,
            TaxRate::from_bps(1200),
            PaymentMethod::Cash,
            Money::from_cents(5000),
        )
        .unwrap();

        assert_eq!(totals.subtotal.cents(), 4000);
        assert_eq!(totals.tax.cents(), 480);
        assert_eq!(totals.total.cents(), 4480);
        assert_eq!(totals.change.cents(), 520);
    }

    #[test]
    fn test_cash_short_is_rejected() {
        let err = price_checkout(
            &[alloc(1, 1000)],
            TaxRate::zero(),
            PaymentMethod::Cash,
            Money::from_cents(999),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPayment { .. }));
    }

    #[test]
    fn test_card_must_be_exact() {
        let allocs = [alloc(1, 1000)];
        let ok = price_checkout(&allocs, TaxRate::zero(), PaymentMethod::Card, Money::from_cents(1000))
            .unwrap();
        assert!(ok.change.is_zero());

        assert!(price_checkout(&allocs, TaxRate::zero(), PaymentMethod::Card, Money::from_cents(2000))
            .is_err());
    }

    #[test]
    fn test_empty_cart() {
        assert!(matches!(
            price_checkout(&[], TaxRate::zero(), PaymentMethod::Cash, Money::zero()),
            Err(CoreError::EmptyCart)
        ));
    }
}
