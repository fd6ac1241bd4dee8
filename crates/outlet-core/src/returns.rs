//! # Returns
//!
//! Validates a return against the original sale and works out what changes.
//!
//! ## Return Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale #S-1 (completed)                                                 │
//! │    item 11: Non x 3 (returned 0)                                       │
//! │    item 12: Sut x 1 (returned 0)                                       │
//! │                                                                         │
//! │  plan_return([11 x 2]) ← THIS MODULE                                   │
//! │    ├── item belongs to sale?            yes                            │
//! │    ├── 2 <= remaining (3)?              yes                            │
//! │    ├── amount = unit_price x 2                                         │
//! │    └── status after: partially_returned                                │
//! │                                                                         │
//! │  outlet-db then applies the plan in one transaction:                   │
//! │    SaleItem.returned_quantity += 2                                     │
//! │    ProductBatch.remaining_quantity += 2                                │
//! │    Sale.status = partially_returned                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Sale, SaleItem, SaleStatus};
use crate::validation::validate_quantity;

/// One requested line of a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub sale_item_id: i64,
    pub quantity: i64,
}

/// A validated line, ready to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedReturn {
    pub sale_item_id: i64,
    pub batch_id: i64,
    pub quantity: i64,
    pub amount: Money,
}

/// Everything a return changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnPlan {
    pub lines: Vec<PlannedReturn>,
    pub total: Money,
    pub new_status: SaleStatus,
}

/// Sale status implied by the returned quantities of its items.
pub fn status_after_return(items: &[SaleItem]) -> SaleStatus {
    if !items.is_empty() && items.iter().all(SaleItem::is_fully_returned) {
        SaleStatus::Returned
    } else if items.iter().any(|i| i.returned_quantity > 0) {
        SaleStatus::PartiallyReturned
    } else {
        SaleStatus::Completed
    }
}

/// Validates `lines` against `sale` and its `items`.
///
/// Lines naming the same sale item are merged before checking.
///
/// ## Errors
/// * `CoreError::EmptyCart` - no lines
/// * `CoreError::SaleFullyReturned` - nothing left to return on the sale
/// * `CoreError::ItemNotInSale` - a line names an item of another sale
/// * `CoreError::ReturnExceedsSold` - more than the item's remaining quantity
/// * `CoreError::Validation` - non-positive quantity
pub fn plan_return(sale: &Sale, items: &[SaleItem], lines: &[ReturnLine]) -> CoreResult<ReturnPlan> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    if sale.status == SaleStatus::Returned {
        return Err(CoreError::SaleFullyReturned {
            sale_number: sale.sale_number.clone(),
        });
    }

    let mut merged: BTreeMap<i64, i64> = BTreeMap::new();
    for line in lines {
        validate_quantity(line.quantity)?;
        *merged.entry(line.sale_item_id).or_insert(0) += line.quantity;
    }

    let mut after: Vec<SaleItem> = items.to_vec();
    let mut planned = Vec::with_capacity(merged.len());

    for (sale_item_id, quantity) in merged {
        let item = after
            .iter_mut()
            .find(|i| i.id == sale_item_id && i.sale_id == sale.id)
            .ok_or(CoreError::ItemNotInSale {
                sale_item_id,
                sale_id: sale.id,
            })?;

        let remaining = item.remaining_quantity();
        if quantity > remaining {
            return Err(CoreError::ReturnExceedsSold {
                sale_item_id,
                remaining,
                requested: quantity,
            });
        }

        item.returned_quantity += quantity;
        planned.push(PlannedReturn {
            sale_item_id,
            batch_id: item.batch_id,
            quantity,
            amount: item.unit_price().multiply_quantity(quantity),
        });
    }

    let total = planned.iter().map(|p| p.amount).sum();

    Ok(ReturnPlan {
        lines: planned,
        total,
        new_status: status_after_return(&after),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;
    use chrono::Utc;

    fn sale(status: SaleStatus) -> Sale {
        Sale {
            id: 1,
            sale_number: "S-1".to_string(),
            cashier_id: 1,
            total_amount_cents: 5500,
            tax_amount_cents: 0,
            payment_method: PaymentMethod::Cash,
            payment_amount_cents: 5500,
            change_amount_cents: 0,
            status,
            created_at: Utc::now(),
        }
    }

    fn item(id: i64, sale_id: i64, qty: i64, returned: i64, price: i64) -> SaleItem {
        SaleItem {
            id,
            sale_id,
            product_id: 1,
            batch_id: 100 + id,
            quantity: qty,
            unit_price_cents: price,
            total_price_cents: qty * price,
            returned_quantity: returned,
        }
    }

    #[test]
    fn test_partial_return() {
        let items = vec![item(11, 1, 3, 0, 1500), item(12, 1, 1, 0, 1000)];
        let plan = plan_return(
            &sale(SaleStatus::Completed),
            &items,
            &[ReturnLine { sale_item_id: 11, quantity: 2 }],
        )
        .unwrap();

        assert_eq!(plan.total.cents(), 3000);
        assert_eq!(plan.new_status, SaleStatus::PartiallyReturned);
        assert_eq!(plan.lines[0].batch_id, 111);
    }

    #[test]
    fn test_returning_everything_marks_sale_returned() {
        let items = vec![item(11, 1, 3, 1, 1500), item(12, 1, 1, 0, 1000)];
        let plan = plan_return(
            &sale(SaleStatus::PartiallyReturned),
            &items,
            &[
                ReturnLine { sale_item_id: 11, quantity: 1 },
                ReturnLine { sale_item_id: 12, quantity: 1 },
                ReturnLine { sale_item_id: 11, quantity: 1 },
            ],
        )
        .unwrap();

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.total.cents(), 4000);
        assert_eq!(plan.new_status, SaleStatus::Returned);
    }

    #[test]
    fn test_cannot_return_more_than_remaining() {
        let items = vec![item(11, 1, 3, 2, 1500)];
        let err = plan_return(
            &sale(SaleStatus::PartiallyReturned),
            &items,
            &[ReturnLine { sale_item_id: 11, quantity: 2 }],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CoreError::ReturnExceedsSold { remaining: 1, requested: 2, .. }
        ));
    }

    #[test]
    fn test_item_from_other_sale_is_rejected() {
        let items = vec![item(11, 2, 3, 0, 1500)];
        let err = plan_return(
            &sale(SaleStatus::Completed),
            &items,
            &[ReturnLine { sale_item_id: 11, quantity: 1 }],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ItemNotInSale { sale_item_id: 11, sale_id: 1 }));
    }

    #[test]
    fn test_fully_returned_sale_is_closed() {
        let items = vec![item(11, 1, 1, 1, 1500)];
        assert!(matches!(
            plan_return(
                &sale(SaleStatus::Returned),
                &items,
                &[ReturnLine { sale_item_id: 11, quantity: 1 }],
            ),
            Err(CoreError::SaleFullyReturned { .. })
        ));
    }

    #[test]
    fn test_status_after_return() {
        assert_eq!(status_after_return(&[item(1, 1, 2, 0, 1)]), SaleStatus::Completed);
        assert_eq!(status_after_return(&[item(1, 1, 2, 1, 1)]), SaleStatus::PartiallyReturned);
        assert_eq!(status_after_return(&[item(1, 1, 2, 2, 1)]), SaleStatus::Returned);
    }
}
