//! # Inventory Allocation
//!
//! Splits a sale quantity across a product's batches, oldest stock first.
//!
//! ## FIFO Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sell 7 × Non                                                          │
//! │                                                                         │
//! │  B-1  arrived 01-05  remaining 4   ──► take 4                          │
//! │  B-2  arrived 01-05  remaining 0   ──► skip (empty)                    │
//! │  B-3  arrived 01-09  expired       ──► skip (expired)                  │
//! │  B-4  arrived 01-12  remaining 10  ──► take 3                          │
//! │                                                                         │
//! │  Result: [(B-1, 4 @ 15.00), (B-4, 3 @ 16.00)]                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ties on `arrival_date` break on `created_at`, then `id`, which is the
//! order the batch table is listed in.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::ProductBatch;
use crate::validation::validate_quantity;

/// A slice of one batch assigned to a sale line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAllocation {
    pub product_id: i64,
    pub batch_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
}

impl BatchAllocation {
    /// unit_price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Sellable stock on `on`: remaining units in non-expired batches.
pub fn sellable_stock(batches: &[ProductBatch], on: NaiveDate) -> i64 {
    batches
        .iter()
        .filter(|b| b.is_sellable(on))
        .map(|b| b.remaining_quantity)
        .sum()
}

/// Allocates `quantity` units across `batches` in FIFO order.
///
/// ## Arguments
/// * `product` - Label used in the error message (`"Non - 4780001"`)
/// * `batches` - All batches of one product, in any order
/// * `quantity` - Units requested
/// * `on` - Sale date, used to skip expired batches
///
/// ## Errors
/// * `CoreError::Validation` - quantity is not positive or too large
/// * `CoreError::InsufficientStock` - sellable stock is short
pub fn allocate_fifo(
    product: &str,
    batches: &[ProductBatch],
    quantity: i64,
    on: NaiveDate,
) -> CoreResult<Vec<BatchAllocation>> {
    validate_quantity(quantity)?;

    let available = sellable_stock(batches, on);
    if available < quantity {
        return Err(CoreError::InsufficientStock {
            product: product.to_string(),
            available,
            requested: quantity,
        });
    }

    let mut ordered: Vec<&ProductBatch> = batches.iter().filter(|b| b.is_sellable(on)).collect();
    ordered.sort_by_key(|b| (b.arrival_date, b.created_at, b.id));

    let mut left = quantity;
    let mut allocations = Vec::new();

    for batch in ordered {
        if left == 0 {
            break;
        }

        let take = left.min(batch.remaining_quantity);
        allocations.push(BatchAllocation {
            product_id: batch.product_id,
            batch_id: batch.id,
            quantity: take,
            unit_price: batch.selling_price(),
        });
        left -= take;
    }

    Ok(allocations)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn batch(id: i64, arrival: NaiveDate, remaining: i64, price: i64) -> ProductBatch {
        ProductBatch {
            id,
            product_id: 9,
            batch_number: format!("B-{}", id),
            purchase_price_cents: 100,
            selling_price_cents: price,
            initial_quantity: 10,
            remaining_quantity: remaining,
            arrival_date: arrival,
            expiry_date: date(12, 31),
            created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
            created_by: 1,
        }
    }

    #[test]
    fn test_allocates_oldest_first_across_batches() {
        let batches = vec![
            batch(4, date(1, 12), 10, 1600),
            batch(1, date(1, 5), 4, 1500),
            batch(2, date(1, 5), 0, 1500),
        ];

        let allocs = allocate_fifo("Non", &batches, 7, date(2, 1)).unwrap();

        assert_eq!(allocs.len(), 2);
        assert_eq!((allocs[0].batch_id, allocs[0].quantity), (1, 4));
        assert_eq!((allocs[1].batch_id, allocs[1].quantity), (4, 3));
        assert_eq!(allocs[1].unit_price.cents(), 1600);
        assert_eq!(allocs[1].line_total().cents(), 4800);
    }

    #[test]
    fn test_same_arrival_date_breaks_on_creation() {
        let batches = vec![batch(3, date(1, 5), 5, 1000), batch(2, date(1, 5), 5, 1100)];

        let allocs = allocate_fifo("Non", &batches, 2, date(2, 1)).unwrap();
        assert_eq!(allocs[0].batch_id, 2);
    }

    #[test]
    fn test_expired_batches_are_skipped() {
        let mut old = batch(1, date(1, 1), 5, 1000);
        old.expiry_date = date(1, 31);
        let batches = vec![old, batch(2, date(1, 10), 5, 1200)];

        let allocs = allocate_fifo("Non", &batches, 3, date(2, 1)).unwrap();
        assert_eq!(allocs, vec![BatchAllocation {
            product_id: 9,
            batch_id: 2,
            quantity: 3,
            unit_price: Money::from_cents(1200),
        }]);

        // On the expiry day itself the batch is still sellable
        let allocs = allocate_fifo("Non", &batches, 3, date(1, 31)).unwrap();
        assert_eq!(allocs[0].batch_id, 1);
    }

    #[test]
    fn test_insufficient_stock() {
        let batches = vec![batch(1, date(1, 1), 2, 1000), batch(2, date(1, 2), 1, 1000)];

        let err = allocate_fifo("Non - 478", &batches, 4, date(2, 1)).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                product,
                available,
                requested,
            } => {
                assert_eq!(product, "Non - 478");
                assert_eq!(available, 3);
                assert_eq!(requested, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let batches = vec![batch(1, date(1, 1), 2, 1000)];
        assert!(matches!(
            allocate_fifo("Non", &batches, 0, date(2, 1)),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_sellable_stock_skips_expired() {
        let mut expired = batch(2, date(1, 1), 3, 1);
        expired.expiry_date = date(1, 31);
        let batches = vec![batch(1, date(1, 1), 4, 1), expired];

        assert_eq!(sellable_stock(&batches, date(1, 31)), 7);
        assert_eq!(sellable_stock(&batches, date(2, 1)), 4);
    }
}
