//! # Batch Repository
//!
//! Stock deliveries. A batch arrives with `remaining_quantity =
//! initial_quantity`; sales decrement it and returns put units back.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use outlet_core::validation::{
    validate_batch_dates, validate_batch_number, validate_batch_quantities, validate_price_cents,
};
use outlet_core::{Money, ProductBatch};

pub(crate) const BATCH_COLUMNS: &str = "id, product_id, batch_number, purchase_price_cents, \
     selling_price_cents, initial_quantity, remaining_quantity, arrival_date, expiry_date, \
     created_at, created_by";

/// A delivery being booked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBatch {
    pub product_id: i64,
    pub batch_number: String,
    pub purchase_price: Money,
    pub selling_price: Money,
    pub quantity: i64,
    pub arrival_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub created_by: i64,
}

#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// Books in a delivery.
    pub async fn receive(&self, new: &NewBatch) -> DbResult<ProductBatch> {
        validate_batch_number(&new.batch_number)?;
        validate_price_cents("purchase_price", new.purchase_price.cents())?;
        validate_price_cents("selling_price", new.selling_price.cents())?;
        validate_batch_quantities(new.quantity, new.quantity)?;
        validate_batch_dates(new.arrival_date, new.expiry_date)?;

        let batch_number = new.batch_number.trim();
        let now = Utc::now();

        debug!(
            product_id = new.product_id,
            batch_number = %batch_number,
            quantity = new.quantity,
            "Receiving batch"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO product_batches (
                product_id, batch_number, purchase_price_cents, selling_price_cents,
                initial_quantity, remaining_quantity, arrival_date, expiry_date,
                created_at, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(new.product_id)
        .bind(batch_number)
        .bind(new.purchase_price.cents())
        .bind(new.selling_price.cents())
        .bind(new.quantity)
        .bind(new.arrival_date)
        .bind(new.expiry_date)
        .bind(now)
        .bind(new.created_by)
        .execute(&self.pool)
        .await?;

        Ok(ProductBatch {
            id: result.last_insert_rowid(),
            product_id: new.product_id,
            batch_number: batch_number.to_string(),
            purchase_price_cents: new.purchase_price.cents(),
            selling_price_cents: new.selling_price.cents(),
            initial_quantity: new.quantity,
            remaining_quantity: new.quantity,
            arrival_date: new.arrival_date,
            expiry_date: new.expiry_date,
            created_at: now,
            created_by: new.created_by,
        })
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<ProductBatch>> {
        let batch = sqlx::query_as::<_, ProductBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM product_batches WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(batch)
    }

    /// All batches of a product in FIFO order, empty ones included.
    pub async fn list_for_product(&self, product_id: i64) -> DbResult<Vec<ProductBatch>> {
        let batches = sqlx::query_as::<_, ProductBatch>(&format!(
            r#"
            SELECT {BATCH_COLUMNS} FROM product_batches
            WHERE product_id = ?1
            ORDER BY arrival_date, created_at, id
            "#
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM product_batches WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductBatch", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_receive_sets_remaining_to_initial() {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Sut").await;
        let p = fixtures::product(&db, &user, &cat, "4780100").await;

        let batch = fixtures::batch(&db, &user, &p, "B-1", 12, 900, fixtures::date(1, 5)).await;
        let stored = db.batches().get_by_id(batch.id).await.unwrap().unwrap();

        assert_eq!(stored.initial_quantity, 12);
        assert_eq!(stored.remaining_quantity, 12);
        assert_eq!(stored.sold_quantity(), 0);
        assert_eq!(stored.arrival_date, fixtures::date(1, 5));
        assert_eq!(stored.to_string(), "B-1 (12/12)");
    }

    #[tokio::test]
    async fn test_list_for_product_is_fifo() {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Sut").await;
        let p = fixtures::product(&db, &user, &cat, "4780100").await;

        fixtures::batch(&db, &user, &p, "late", 1, 900, fixtures::date(3, 1)).await;
        fixtures::batch(&db, &user, &p, "early", 1, 900, fixtures::date(1, 1)).await;

        let numbers: Vec<String> = db
            .batches()
            .list_for_product(p.id)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.batch_number)
            .collect();
        assert_eq!(numbers, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_invalid_batches_are_rejected() {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Sut").await;
        let p = fixtures::product(&db, &user, &cat, "4780100").await;

        let mut new = NewBatch {
            product_id: p.id,
            batch_number: "B-1".to_string(),
            purchase_price: Money::from_cents(100),
            selling_price: Money::from_cents(150),
            quantity: 0,
            arrival_date: fixtures::date(1, 5),
            expiry_date: fixtures::date(1, 10),
            created_by: user.id,
        };
        assert!(matches!(db.batches().receive(&new).await, Err(DbError::Domain(_))));

        new.quantity = 5;
        new.expiry_date = fixtures::date(1, 1);
        assert!(matches!(db.batches().receive(&new).await, Err(DbError::Domain(_))));
    }

    #[tokio::test]
    async fn test_remaining_cannot_exceed_initial() {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Sut").await;
        let p = fixtures::product(&db, &user, &cat, "4780100").await;
        let b = fixtures::batch(&db, &user, &p, "B-1", 5, 900, fixtures::date(1, 5)).await;

        let err = sqlx::query("UPDATE product_batches SET remaining_quantity = 6 WHERE id = ?1")
            .bind(b.id)
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
