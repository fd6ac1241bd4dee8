//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Barcode lookup (scanner input)
//! - Substring search over name and barcode
//! - Price and stock derived from the product's batches
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products                       product_batches                        │
//! │  ┌────┬─────────┬──────┐        ┌────┬─────┬───────┬─────────┐         │
//! │  │ id │ barcode │ name │ 1 ── * │ id │ rem │ price │ created │         │
//! │  ├────┼─────────┼──────┤        ├────┼─────┼───────┼─────────┤         │
//! │  │ 7  │ 478001  │ Non  │        │ 1  │ 0   │ 15.00 │ 01-05   │         │
//! │  └────┴─────────┴──────┘        │ 2  │ 4   │ 16.00 │ 01-12 ◄─┼─ price  │
//! │                                 └────┴─────┴───────┴─────────┘         │
//! │  total_stock = 4, current_selling_price = 16.00                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::batch::BatchRepository;
use outlet_core::validation::{validate_barcode, validate_product_name};
use outlet_core::{current_selling_price, total_stock, Money, Product, Unit};

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, barcode, name, category_id, image, unit, created_at, created_by";

/// Fields supplied when registering a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub barcode: String,
    pub name: String,
    pub category_id: i64,
    pub image: Option<String>,
    pub unit: Unit,
    pub created_by: i64,
}

#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Registers a product.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - barcode already used in this store
    /// * `DbError::ForeignKeyViolation` - unknown category or user
    pub async fn create(&self, new: &NewProduct) -> DbResult<Product> {
        validate_barcode(&new.barcode)?;
        validate_product_name(&new.name)?;

        let barcode = new.barcode.trim();
        let name = new.name.trim();
        let now = Utc::now();

        debug!(barcode = %barcode, name = %name, "Creating product");

        let result = sqlx::query(
            r#"
            INSERT INTO products (barcode, name, category_id, image, unit, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(barcode)
        .bind(name)
        .bind(new.category_id)
        .bind(&new.image)
        .bind(new.unit)
        .bind(now)
        .bind(new.created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(barcode))?;

        Ok(Product {
            id: result.last_insert_rowid(),
            barcode: barcode.to_string(),
            name: name.to_string(),
            category_id: new.category_id,
            image: new.image.clone(),
            unit: new.unit,
            created_at: now,
            created_by: new.created_by,
        })
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Looks up a product by its scanned barcode.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ?1"
        ))
        .bind(barcode.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Newest products first.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Case-insensitive substring match on name or barcode.
    ///
    /// An empty query behaves like [`list`](Self::list).
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list(limit, 0).await;
        }

        let pattern = format!("%{}%", escape_like(query));

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE name LIKE ?1 ESCAPE '\' OR barcode LIKE ?1 ESCAPE '\'
            ORDER BY name, id
            LIMIT ?2
            "#
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Selling price of the newest batch with stock, zero when sold out.
    pub async fn current_selling_price(&self, product_id: i64) -> DbResult<Money> {
        let batches = BatchRepository::new(self.pool.clone())
            .list_for_product(product_id)
            .await?;
        Ok(current_selling_price(&batches))
    }

    /// Units on hand across all of the product's batches.
    pub async fn total_stock(&self, product_id: i64) -> DbResult<i64> {
        let batches = BatchRepository::new(self.pool.clone())
            .list_for_product(product_id)
            .await?;
        Ok(total_stock(&batches))
    }

    /// Deletes a product, its batches and the sale lines that drew from them.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id = id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("non"), "non");
    }

    #[tokio::test]
    async fn test_barcode_is_unique() {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Non").await;
        fixtures::product(&db, &user, &cat, "4780001").await;

        let err = db
            .products()
            .create(&NewProduct {
                barcode: "4780001".to_string(),
                name: "Boshqa".to_string(),
                category_id: cat.id,
                image: None,
                unit: Unit::Kg,
                created_by: user.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::UniqueViolation { ref field, ref value } if field.contains("barcode") && value == "4780001"
        ));
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected() {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;

        let err = db
            .products()
            .create(&NewProduct {
                barcode: "1".to_string(),
                name: "Yetim".to_string(),
                category_id: 999,
                image: None,
                unit: Unit::Piece,
                created_by: user.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_lookup_and_search() {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Non").await;
        let p = fixtures::product(&db, &user, &cat, "4780001").await;
        fixtures::product(&db, &user, &cat, "4780002").await;

        let found = db.products().get_by_barcode("4780001").await.unwrap().unwrap();
        assert_eq!(found.id, p.id);
        assert_eq!(found.unit, Unit::Piece);

        assert_eq!(db.products().search("mahsulot", 10).await.unwrap().len(), 2);
        assert_eq!(db.products().search("0002", 10).await.unwrap().len(), 1);
        assert_eq!(db.products().search("", 10).await.unwrap().len(), 2);
        assert_eq!(db.products().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_price_and_stock_follow_batches() {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Non").await;
        let p = fixtures::product(&db, &user, &cat, "4780001").await;

        assert!(db.products().current_selling_price(p.id).await.unwrap().is_zero());

        fixtures::batch(&db, &user, &p, "B-1", 5, 1500, fixtures::date(1, 5)).await;
        fixtures::batch(&db, &user, &p, "B-2", 3, 1600, fixtures::date(1, 12)).await;

        assert_eq!(db.products().current_selling_price(p.id).await.unwrap().cents(), 1600);
        assert_eq!(db.products().total_stock(p.id).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_delete_product() {
        let db = fixtures::db().await;
        let user = fixtures::staff(&db).await;
        let cat = fixtures::category(&db, "Non").await;
        let p = fixtures::product(&db, &user, &cat, "4780001").await;
        let b = fixtures::batch(&db, &user, &p, "B-1", 5, 1500, fixtures::date(1, 5)).await;

        db.products().delete(p.id).await.unwrap();

        assert!(db.batches().get_by_id(b.id).await.unwrap().is_none());
        assert!(matches!(db.products().delete(p.id).await, Err(DbError::NotFound { .. })));
    }
}
