//! # Return Repository
//!
//! Returns against earlier sales.
//!
//! ## Return Transaction
//! ```text
//! BEGIN IMMEDIATE
//!   load sale + items
//!   plan_return(...)                         ← outlet-core
//!   INSERT return_sales, return_items
//!   UPDATE sale_items     returned += qty    (guard: returned + qty <= quantity)
//!   UPDATE product_batches remaining += qty  (guard: remaining + qty <= initial)
//!   UPDATE sales status                      (forward only)
//! COMMIT
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{begin_immediate, document_number, finish};
use crate::repository::sale::SALE_ITEM_COLUMNS;
use outlet_core::returns::{plan_return, ReturnLine};
use outlet_core::{CoreError, ReturnItem, ReturnSale, Sale, SaleItem};

const RETURN_COLUMNS: &str =
    "id, original_sale_id, return_number, cashier_id, total_return_amount_cents, reason, created_at";

const RETURN_ITEM_COLUMNS: &str =
    "id, return_sale_id, sale_item_id, returned_quantity, return_amount_cents";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub sale_id: i64,
    pub cashier_id: i64,
    /// Free text, may be empty.
    #[serde(default)]
    pub reason: String,
    pub lines: Vec<ReturnLine>,
}

/// A committed return with its lines and the sale as it now stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnReceipt {
    pub return_sale: ReturnSale,
    pub items: Vec<ReturnItem>,
    pub sale: Sale,
}

#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    pub async fn process_return(&self, request: &ReturnRequest) -> DbResult<ReturnReceipt> {
        self.process_return_at(request, Utc::now()).await
    }

    /// Books a return as of `at`.
    ///
    /// Returned units go back into the batch they were sold from, and the
    /// sale's status advances to `partially_returned` or `returned`.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - unknown sale
    /// * `CoreError::ItemNotInSale` / `ReturnExceedsSold` / `SaleFullyReturned`
    pub async fn process_return_at(
        &self,
        request: &ReturnRequest,
        at: DateTime<Utc>,
    ) -> DbResult<ReturnReceipt> {
        debug!(
            sale_id = request.sale_id,
            lines = request.lines.len(),
            "Processing return"
        );

        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = write_return(&mut conn, request, at).await;
        let receipt = finish(&mut conn, result).await?;

        info!(
            return_number = %receipt.return_sale.return_number,
            sale_number = %receipt.sale.sale_number,
            amount = %receipt.return_sale.total_return_amount(),
            status = receipt.sale.status.code(),
            "Return processed"
        );

        Ok(receipt)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<ReturnSale>> {
        let ret = sqlx::query_as::<_, ReturnSale>(&format!(
            "SELECT {RETURN_COLUMNS} FROM return_sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ret)
    }

    pub async fn get_by_number(&self, return_number: &str) -> DbResult<Option<ReturnSale>> {
        let ret = sqlx::query_as::<_, ReturnSale>(&format!(
            "SELECT {RETURN_COLUMNS} FROM return_sales WHERE return_number = ?1"
        ))
        .bind(return_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ret)
    }

    pub async fn items(&self, return_sale_id: i64) -> DbResult<Vec<ReturnItem>> {
        let items = sqlx::query_as::<_, ReturnItem>(&format!(
            "SELECT {RETURN_ITEM_COLUMNS} FROM return_items WHERE return_sale_id = ?1 ORDER BY id"
        ))
        .bind(return_sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Returns booked against one sale, oldest first.
    pub async fn list_for_sale(&self, sale_id: i64) -> DbResult<Vec<ReturnSale>> {
        let returns = sqlx::query_as::<_, ReturnSale>(&format!(
            "SELECT {RETURN_COLUMNS} FROM return_sales WHERE original_sale_id = ?1 ORDER BY created_at, id"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(returns)
    }
}

/// Books the return on a connection that already holds the write lock.
async fn write_return(
    conn: &mut SqliteConnection,
    request: &ReturnRequest,
    at: DateTime<Utc>,
) -> DbResult<ReturnReceipt> {
    let mut sale = sqlx::query_as::<_, Sale>(
        "SELECT id, sale_number, cashier_id, total_amount_cents, tax_amount_cents, \
         payment_method, payment_amount_cents, change_amount_cents, status, created_at \
         FROM sales WHERE id = ?1",
    )
    .bind(request.sale_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Sale", request.sale_id))?;

    let sale_items = sqlx::query_as::<_, SaleItem>(&format!(
        "SELECT {SALE_ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY id"
    ))
    .bind(sale.id)
    .fetch_all(&mut *conn)
    .await?;

    let plan = plan_return(&sale, &sale_items, &request.lines)?;
    let return_number = document_number("R", at);
    let reason = request.reason.trim().to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO return_sales (
            original_sale_id, return_number, cashier_id,
            total_return_amount_cents, reason, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(sale.id)
    .bind(&return_number)
    .bind(request.cashier_id)
    .bind(plan.total.cents())
    .bind(&reason)
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from(e).with_value(&return_number))?;

    let return_sale_id = result.last_insert_rowid();
    let mut items = Vec::with_capacity(plan.lines.len());

    for line in &plan.lines {
        let updated = sqlx::query(
            r#"
            UPDATE sale_items
            SET returned_quantity = returned_quantity + ?1
            WHERE id = ?2 AND returned_quantity + ?1 <= quantity
            "#,
        )
        .bind(line.quantity)
        .bind(line.sale_item_id)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            let remaining: i64 = sqlx::query_scalar(
                "SELECT quantity - returned_quantity FROM sale_items WHERE id = ?1",
            )
            .bind(line.sale_item_id)
            .fetch_one(&mut *conn)
            .await?;

            return Err(CoreError::ReturnExceedsSold {
                sale_item_id: line.sale_item_id,
                remaining,
                requested: line.quantity,
            }
            .into());
        }

        let restocked = sqlx::query(
            r#"
            UPDATE product_batches
            SET remaining_quantity = remaining_quantity + ?1
            WHERE id = ?2 AND remaining_quantity + ?1 <= initial_quantity
            "#,
        )
        .bind(line.quantity)
        .bind(line.batch_id)
        .execute(&mut *conn)
        .await?;

        if restocked.rows_affected() == 0 {
            return Err(DbError::TransactionFailed(format!(
                "returning {} units would overfill batch {}",
                line.quantity, line.batch_id
            )));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO return_items (
                return_sale_id, sale_item_id, returned_quantity, return_amount_cents
            ) VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(return_sale_id)
        .bind(line.sale_item_id)
        .bind(line.quantity)
        .bind(line.amount.cents())
        .execute(&mut *conn)
        .await?;

        items.push(ReturnItem {
            id: inserted.last_insert_rowid(),
            return_sale_id,
            sale_item_id: line.sale_item_id,
            returned_quantity: line.quantity,
            return_amount_cents: line.amount.cents(),
        });
    }

    if plan.new_status > sale.status {
        sqlx::query("UPDATE sales SET status = ?2 WHERE id = ?1")
            .bind(sale.id)
            .bind(plan.new_status)
            .execute(&mut *conn)
            .await?;
        sale.status = plan.new_status;
    }

    Ok(ReturnReceipt {
        return_sale: ReturnSale {
            id: return_sale_id,
            original_sale_id: sale.id,
            return_number,
            cashier_id: request.cashier_id,
            total_return_amount_cents: plan.total.cents(),
            reason,
            created_at: at,
        },
        items,
        sale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::repository::{CartLine, CheckoutReceipt, CheckoutRequest};
    use crate::Database;
    use outlet_core::{Money, PaymentMethod, ProductBatch, SaleStatus, TaxRate, User};

    fn at(m: u32, d: u32) -> DateTime<Utc> {
        fixtures::date(m, d)
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
    }

    /// One product, two batches (2 @ 10.00 then 5 @ 12.00), and a sale of
    /// 4 units that draws 2 from each.
    async fn sold() -> (Database, User, ProductBatch, ProductBatch, CheckoutReceipt) {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Non").await;
        let p = fixtures::product(&db, &user, &cat, "4780001").await;
        let b1 = fixtures::batch(&db, &user, &p, "B-1", 2, 1000, fixtures::date(1, 5)).await;
        let b2 = fixtures::batch(&db, &user, &p, "B-2", 5, 1200, fixtures::date(1, 9)).await;

        let receipt = db
            .sales()
            .checkout_at(
                &CheckoutRequest {
                    cashier_id: user.id,
                    lines: vec![CartLine { product_id: p.id, quantity: 4 }],
                    tax_rate: TaxRate::zero(),
                    payment_method: PaymentMethod::Cash,
                    payment: Money::from_cents(5000),
                },
                at(2, 1),
            )
            .await
            .unwrap();

        (db, user, b1, b2, receipt)
    }

    fn request(user: &User, receipt: &CheckoutReceipt, lines: Vec<(usize, i64)>) -> ReturnRequest {
        ReturnRequest {
            sale_id: receipt.sale.id,
            cashier_id: user.id,
            reason: "Sifatsiz".to_string(),
            lines: lines
                .into_iter()
                .map(|(idx, quantity)| ReturnLine {
                    sale_item_id: receipt.items[idx].id,
                    quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_partial_then_full_return() {
        let (db, user, b1, b2, receipt) = sold().await;

        let first = db
            .returns()
            .process_return_at(&request(&user, &receipt, vec![(0, 1)]), at(2, 2))
            .await
            .unwrap();

        assert_eq!(first.sale.status, SaleStatus::PartiallyReturned);
        assert_eq!(first.return_sale.total_return_amount_cents, 1000);
        assert!(first.return_sale.return_number.starts_with("R-20260202-"));
        assert_eq!(db.batches().get_by_id(b1.id).await.unwrap().unwrap().remaining_quantity, 1);

        let second = db
            .returns()
            .process_return_at(&request(&user, &receipt, vec![(0, 1), (1, 2)]), at(2, 3))
            .await
            .unwrap();

        assert_eq!(second.sale.status, SaleStatus::Returned);
        assert_eq!(second.return_sale.total_return_amount_cents, 1000 + 2 * 1200);
        assert_eq!(db.batches().get_by_id(b1.id).await.unwrap().unwrap().remaining_quantity, 2);
        assert_eq!(db.batches().get_by_id(b2.id).await.unwrap().unwrap().remaining_quantity, 5);

        let stored = db.sales().get_by_id(receipt.sale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SaleStatus::Returned);
        assert!(db
            .sales()
            .items(stored.id)
            .await
            .unwrap()
            .iter()
            .all(SaleItem::is_fully_returned));

        let history = db.returns().list_for_sale(stored.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(db.returns().items(history[1].id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_over_return_is_rejected_and_rolled_back() {
        let (db, user, b1, _, receipt) = sold().await;

        let err = db
            .returns()
            .process_return_at(&request(&user, &receipt, vec![(0, 3)]), at(2, 2))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::ReturnExceedsSold { remaining: 2, requested: 3, .. })
        ));
        assert!(db.returns().list_for_sale(receipt.sale.id).await.unwrap().is_empty());
        assert_eq!(db.batches().get_by_id(b1.id).await.unwrap().unwrap().remaining_quantity, 0);
    }

    #[tokio::test]
    async fn test_fully_returned_sale_rejects_more() {
        let (db, user, _, _, receipt) = sold().await;
        db.returns()
            .process_return_at(&request(&user, &receipt, vec![(0, 2), (1, 2)]), at(2, 2))
            .await
            .unwrap();

        let err = db
            .returns()
            .process_return_at(&request(&user, &receipt, vec![(0, 1)]), at(2, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::SaleFullyReturned { .. })));
    }

    #[tokio::test]
    async fn test_item_of_other_sale_is_rejected() {
        let (db, user, _, _, receipt) = sold().await;

        let mut req = request(&user, &receipt, vec![(0, 1)]);
        req.lines[0].sale_item_id = 9_999;

        let err = db.returns().process_return_at(&req, at(2, 2)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ItemNotInSale { .. })));
    }

    #[tokio::test]
    async fn test_return_number_is_unique() {
        let (db, user, _, _, receipt) = sold().await;
        let ret = db
            .returns()
            .process_return_at(&request(&user, &receipt, vec![(0, 1)]), at(2, 2))
            .await
            .unwrap();

        let err = sqlx::query(
            "INSERT INTO return_sales (original_sale_id, return_number, cashier_id, total_return_amount_cents, reason, created_at) VALUES (?1, ?2, ?3, 0, '', ?4)",
        )
        .bind(receipt.sale.id)
        .bind(&ret.return_sale.return_number)
        .bind(user.id)
        .bind(at(2, 2))
        .execute(db.pool())
        .await
        .map_err(DbError::from)
        .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field.contains("return_number")));
        assert_eq!(db.returns().list_for_sale(receipt.sale.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deleting_sale_cascades_to_returns() {
        let (db, user, _, _, receipt) = sold().await;
        let ret = db
            .returns()
            .process_return_at(&request(&user, &receipt, vec![(0, 1)]), at(2, 2))
            .await
            .unwrap();

        db.sales().delete(receipt.sale.id).await.unwrap();

        assert!(db.returns().get_by_id(ret.return_sale.id).await.unwrap().is_none());
        assert!(db.returns().get_by_number(&ret.return_sale.return_number).await.unwrap().is_none());
        assert!(db.returns().items(ret.return_sale.id).await.unwrap().is_empty());
    }
}
