//! # Sale Repository
//!
//! Checkout and sale history.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN IMMEDIATE                                                        │
//! │    for each cart line:                                                 │
//! │      load product + batches (FIFO order)                               │
//! │      allocate_fifo(...)              ← outlet-core                     │
//! │    price_checkout(...)               ← outlet-core                     │
//! │    INSERT sales                                                         │
//! │    for each allocation:                                                │
//! │      UPDATE product_batches                                            │
//! │        SET remaining = remaining - qty                                 │
//! │        WHERE id = ? AND remaining >= qty    ← 0 rows: abort            │
//! │      INSERT sale_items                                                  │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Any error rolls the whole sale back: no stock moves without a sale row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::batch::BATCH_COLUMNS;
use crate::repository::product::PRODUCT_COLUMNS;
use crate::repository::{begin_immediate, document_number, finish};
use outlet_core::checkout::price_checkout;
use outlet_core::inventory::{allocate_fifo, BatchAllocation};
use outlet_core::validation::validate_quantity;
use outlet_core::{
    CoreError, Money, PaymentMethod, Product, ProductBatch, Sale, SaleItem, SaleStatus, TaxRate,
    ValidationError, MAX_ITEM_QUANTITY, MAX_SALE_LINES,
};

const SALE_COLUMNS: &str = "id, sale_number, cashier_id, total_amount_cents, tax_amount_cents, \
     payment_method, payment_amount_cents, change_amount_cents, status, created_at";

pub(crate) const SALE_ITEM_COLUMNS: &str = "id, sale_id, product_id, batch_id, quantity, \
     unit_price_cents, total_price_cents, returned_quantity";

/// One product and quantity in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub cashier_id: i64,
    pub lines: Vec<CartLine>,
    pub tax_rate: TaxRate,
    pub payment_method: PaymentMethod,
    pub payment: Money,
}

/// A committed sale with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Completes a sale now.
    pub async fn checkout(&self, request: &CheckoutRequest) -> DbResult<CheckoutReceipt> {
        self.checkout_at(request, Utc::now()).await
    }

    /// Completes a sale as of `at`. Batches that expired before `at`'s date
    /// are not sold from.
    ///
    /// Lines for the same product are merged, and the merged quantity is
    /// held to the same per-line limit. Each batch the quantity is drawn
    /// from becomes its own `SaleItem`.
    ///
    /// ## Errors
    /// * `CoreError::EmptyCart` / `TooManyLines` - cart shape
    /// * `CoreError::InsufficientStock` - not enough sellable stock
    /// * `CoreError::InvalidPayment` - tender does not fit the total
    /// * `DbError::NotFound` - unknown product
    pub async fn checkout_at(
        &self,
        request: &CheckoutRequest,
        at: DateTime<Utc>,
    ) -> DbResult<CheckoutReceipt> {
        let lines = merge_lines(&request.lines)?;

        debug!(
            cashier_id = request.cashier_id,
            lines = lines.len(),
            method = request.payment_method.code(),
            "Starting checkout"
        );

        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = write_sale(&mut conn, request, &lines, at).await;
        let receipt = finish(&mut conn, result).await?;

        info!(
            sale_number = %receipt.sale.sale_number,
            total = %receipt.sale.total_amount(),
            items = receipt.items.len(),
            "Sale completed"
        );

        Ok(receipt)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    pub async fn get_by_number(&self, sale_number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE sale_number = ?1"
        ))
        .bind(sale_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Lines of a sale in insertion order.
    pub async fn items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {SALE_ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY id"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Newest sales first.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Deletes a sale with its items and returns. Stock is not restored.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Sums quantities per product, keeping first-seen order.
///
/// Each line and each merged total must stay within `MAX_ITEM_QUANTITY`.
fn merge_lines(lines: &[CartLine]) -> DbResult<Vec<CartLine>> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }

    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        validate_quantity(line.quantity)?;
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(*line),
        }
    }

    if let Some(line) = merged.iter().find(|m| m.quantity > MAX_ITEM_QUANTITY) {
        return Err(ValidationError::OutOfRange {
            field: format!("total quantity of product {}", line.product_id),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        }
        .into());
    }

    if merged.len() > MAX_SALE_LINES {
        return Err(CoreError::TooManyLines { max: MAX_SALE_LINES }.into());
    }

    Ok(merged)
}

/// Books the sale on a connection that already holds the write lock.
async fn write_sale(
    conn: &mut SqliteConnection,
    request: &CheckoutRequest,
    lines: &[CartLine],
    at: DateTime<Utc>,
) -> DbResult<CheckoutReceipt> {
    let today = at.date_naive();

    let mut allocations: Vec<(String, BatchAllocation)> = Vec::new();
    for line in lines {
        let product = fetch_product(conn, line.product_id).await?;
        let batches = fetch_batches(conn, line.product_id).await?;
        let label = product.to_string();

        for allocation in allocate_fifo(&label, &batches, line.quantity, today)? {
            allocations.push((label.clone(), allocation));
        }
    }

    let plain: Vec<BatchAllocation> = allocations.iter().map(|(_, a)| *a).collect();
    let totals = price_checkout(
        &plain,
        request.tax_rate,
        request.payment_method,
        request.payment,
    )?;

    let sale_number = document_number("S", at);

    let result = sqlx::query(
        r#"
        INSERT INTO sales (
            sale_number, cashier_id, total_amount_cents, tax_amount_cents,
            payment_method, payment_amount_cents, change_amount_cents, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&sale_number)
    .bind(request.cashier_id)
    .bind(totals.total.cents())
    .bind(totals.tax.cents())
    .bind(request.payment_method)
    .bind(totals.payment.cents())
    .bind(totals.change.cents())
    .bind(SaleStatus::Completed)
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from(e).with_value(&sale_number))?;

    let sale_id = result.last_insert_rowid();
    let mut items = Vec::with_capacity(allocations.len());

    for (label, allocation) in &allocations {
        let updated = sqlx::query(
            r#"
            UPDATE product_batches
            SET remaining_quantity = remaining_quantity - ?1
            WHERE id = ?2 AND remaining_quantity >= ?1
            "#,
        )
        .bind(allocation.quantity)
        .bind(allocation.batch_id)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            let available: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(remaining_quantity), 0) FROM product_batches WHERE product_id = ?1 AND expiry_date >= ?2",
            )
            .bind(allocation.product_id)
            .bind(today)
            .fetch_one(&mut *conn)
            .await?;

            return Err(CoreError::InsufficientStock {
                product: label.clone(),
                available,
                requested: allocation.quantity,
            }
            .into());
        }

        let line_total = allocation.line_total();
        let inserted = sqlx::query(
            r#"
            INSERT INTO sale_items (
                sale_id, product_id, batch_id, quantity,
                unit_price_cents, total_price_cents, returned_quantity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
            "#,
        )
        .bind(sale_id)
        .bind(allocation.product_id)
        .bind(allocation.batch_id)
        .bind(allocation.quantity)
        .bind(allocation.unit_price.cents())
        .bind(line_total.cents())
        .execute(&mut *conn)
        .await?;

        items.push(SaleItem {
            id: inserted.last_insert_rowid(),
            sale_id,
            product_id: allocation.product_id,
            batch_id: allocation.batch_id,
            quantity: allocation.quantity,
            unit_price_cents: allocation.unit_price.cents(),
            total_price_cents: line_total.cents(),
            returned_quantity: 0,
        });
    }

    Ok(CheckoutReceipt {
        sale: Sale {
            id: sale_id,
            sale_number,
            cashier_id: request.cashier_id,
            total_amount_cents: totals.total.cents(),
            tax_amount_cents: totals.tax.cents(),
            payment_method: request.payment_method,
            payment_amount_cents: totals.payment.cents(),
            change_amount_cents: totals.change.cents(),
            status: SaleStatus::Completed,
            created_at: at,
        },
        items,
    })
}

async fn fetch_product(conn: &mut SqliteConnection, id: i64) -> DbResult<Product> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Product", id))
}

async fn fetch_batches(conn: &mut SqliteConnection, product_id: i64) -> DbResult<Vec<ProductBatch>> {
    let batches = sqlx::query_as::<_, ProductBatch>(&format!(
        "SELECT {BATCH_COLUMNS} FROM product_batches WHERE product_id = ?1 ORDER BY arrival_date, created_at, id"
    ))
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::Database;
    use outlet_core::{Category, User};

    fn at(m: u32, d: u32) -> DateTime<Utc> {
        fixtures::date(m, d)
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn cash(cashier: &User, lines: Vec<CartLine>, payment: i64) -> CheckoutRequest {
        CheckoutRequest {
            cashier_id: cashier.id,
            lines,
            tax_rate: TaxRate::zero(),
            payment_method: PaymentMethod::Cash,
            payment: Money::from_cents(payment),
        }
    }

    async fn setup() -> (Database, User, Category, Product) {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Non").await;
        let product = fixtures::product(&db, &user, &cat, "4780001").await;
        (db, user, cat, product)
    }

    #[tokio::test]
    async fn test_checkout_consumes_batches_fifo() {
        let (db, user, _, product) = setup().await;
        let old = fixtures::batch(&db, &user, &product, "B-1", 4, 1500, fixtures::date(1, 5)).await;
        let new = fixtures::batch(&db, &user, &product, "B-2", 10, 1600, fixtures::date(1, 12)).await;

        let receipt = db
            .sales()
            .checkout_at(
                &cash(&user, vec![CartLine { product_id: product.id, quantity: 7 }], 20000),
                at(2, 1),
            )
            .await
            .unwrap();

        assert_eq!(receipt.items.len(), 2);
        assert_eq!((receipt.items[0].batch_id, receipt.items[0].quantity), (old.id, 4));
        assert_eq!((receipt.items[1].batch_id, receipt.items[1].quantity), (new.id, 3));
        assert_eq!(receipt.sale.total_amount_cents, 4 * 1500 + 3 * 1600);
        assert_eq!(receipt.sale.change_amount_cents, 20000 - 10800);
        assert!(receipt.sale.sale_number.starts_with("S-20260201-"));

        let old = db.batches().get_by_id(old.id).await.unwrap().unwrap();
        let new = db.batches().get_by_id(new.id).await.unwrap().unwrap();
        assert_eq!(old.remaining_quantity, 0);
        assert_eq!(new.remaining_quantity, 7);

        let stored = db.sales().get_by_number(&receipt.sale.sale_number).await.unwrap().unwrap();
        assert_eq!(stored.status, SaleStatus::Completed);
        assert_eq!(stored.payment_method, PaymentMethod::Cash);
        assert_eq!(db.sales().items(stored.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let (db, user, _, product) = setup().await;
        let b = fixtures::batch(&db, &user, &product, "B-1", 2, 1500, fixtures::date(1, 5)).await;

        let err = db
            .sales()
            .checkout_at(
                &cash(
                    &user,
                    vec![
                        CartLine { product_id: product.id, quantity: 2 },
                        CartLine { product_id: product.id, quantity: 1 },
                    ],
                    10000,
                ),
                at(2, 1),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 2, requested: 3, .. })
        ));
        assert_eq!(db.sales().count().await.unwrap(), 0);
        assert_eq!(db.batches().get_by_id(b.id).await.unwrap().unwrap().remaining_quantity, 2);
    }

    #[tokio::test]
    async fn test_short_payment_leaves_stock_alone() {
        let (db, user, _, product) = setup().await;
        let b = fixtures::batch(&db, &user, &product, "B-1", 5, 1500, fixtures::date(1, 5)).await;

        let err = db
            .sales()
            .checkout_at(
                &cash(&user, vec![CartLine { product_id: product.id, quantity: 1 }], 100),
                at(2, 1),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::InvalidPayment { .. })));
        assert_eq!(db.batches().get_by_id(b.id).await.unwrap().unwrap().remaining_quantity, 5);
    }

    #[tokio::test]
    async fn test_card_checkout_with_tax() {
        let (db, user, _, product) = setup().await;
        fixtures::batch(&db, &user, &product, "B-1", 5, 1000, fixtures::date(1, 5)).await;

        let receipt = db
            .sales()
            .checkout_at(
                &CheckoutRequest {
                    cashier_id: user.id,
                    lines: vec![CartLine { product_id: product.id, quantity: 2 }],
                    tax_rate: TaxRate::from_bps(1200),
                    payment_method: PaymentMethod::Card,
                    payment: Money::from_cents(2240),
                },
                at(2, 1),
            )
            .await
            .unwrap();

        assert_eq!(receipt.sale.tax_amount_cents, 240);
        assert_eq!(receipt.sale.total_amount_cents, 2240);
        assert_eq!(receipt.sale.change_amount_cents, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_and_empty_cart() {
        let (db, user, _, _) = setup().await;

        let err = db
            .sales()
            .checkout_at(&cash(&user, vec![CartLine { product_id: 42, quantity: 1 }], 100), at(2, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = db.sales().checkout_at(&cash(&user, vec![], 0), at(2, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_sale_number_is_unique() {
        let (db, user, _, product) = setup().await;
        fixtures::batch(&db, &user, &product, "B-1", 5, 1000, fixtures::date(1, 5)).await;

        let receipt = db
            .sales()
            .checkout_at(&cash(&user, vec![CartLine { product_id: product.id, quantity: 1 }], 1000), at(2, 1))
            .await
            .unwrap();

        let err = sqlx::query(
            "INSERT INTO sales (sale_number, cashier_id, total_amount_cents, tax_amount_cents, payment_method, payment_amount_cents, created_at) VALUES (?1, ?2, 0, 0, 'cash', 0, ?3)",
        )
        .bind(&receipt.sale.sale_number)
        .bind(user.id)
        .bind(at(2, 1))
        .execute(db.pool())
        .await
        .map_err(DbError::from)
        .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field.contains("sale_number")));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_items() {
        let (db, user, _, product) = setup().await;
        fixtures::batch(&db, &user, &product, "B-1", 5, 1000, fixtures::date(1, 5)).await;

        let receipt = db
            .sales()
            .checkout_at(&cash(&user, vec![CartLine { product_id: product.id, quantity: 1 }], 1000), at(2, 1))
            .await
            .unwrap();

        db.sales().delete(receipt.sale.id).await.unwrap();
        assert!(db.sales().items(receipt.sale.id).await.unwrap().is_empty());
        assert!(db.sales().list(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_on_one_store_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = fixtures::file_db(&dir).await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Non").await;
        let product = fixtures::product(&db, &user, &cat, "4780001").await;
        let b = fixtures::batch(&db, &user, &product, "B-1", 1000, 1000, fixtures::date(1, 5)).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sales = db.sales();
            let request = cash(&user, vec![CartLine { product_id: product.id, quantity: 1 }], 1000);
            handles.push(tokio::spawn(async move { sales.checkout_at(&request, at(2, 1)).await }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(db.sales().count().await.unwrap(), 8);
        assert_eq!(db.batches().get_by_id(b.id).await.unwrap().unwrap().remaining_quantity, 992);
    }

    #[test]
    fn test_merged_quantity_names_the_product() {
        let err = merge_lines(&[
            CartLine { product_id: 7, quantity: 6000 },
            CartLine { product_id: 7, quantity: 6000 },
        ])
        .unwrap_err();

        match err {
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { field, max, .. })) => {
                assert_eq!(field, "total quantity of product 7");
                assert_eq!(max, MAX_ITEM_QUANTITY);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_merge_lines() {
        let merged = merge_lines(&[
            CartLine { product_id: 2, quantity: 1 },
            CartLine { product_id: 1, quantity: 1 },
            CartLine { product_id: 2, quantity: 3 },
        ])
        .unwrap();

        assert_eq!(
            merged,
            vec![
                CartLine { product_id: 2, quantity: 4 },
                CartLine { product_id: 1, quantity: 1 },
            ]
        );
    }
}
