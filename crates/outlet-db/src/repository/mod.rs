//! # Repository Module
//!
//! Database repositories for one store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  registry.using("store1")?.sales().checkout(&request)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── checkout(&self, request)      ← one transaction                   │
//! │  ├── get_by_id(&self, id)                                              │
//! │  └── items(&self, sale_id)                                             │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database (store1.db)                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`] - Staff accounts and password checks
//! - [`CategoryRepository`] - Categories
//! - [`ProductRepository`] - Products, lookup and search
//! - [`BatchRepository`] - Stock deliveries
//! - [`SaleRepository`] - Checkout and sale history
//! - [`ReturnRepository`] - Returns against earlier sales

pub mod batch;
pub mod category;
pub mod product;
pub mod returns;
pub mod sale;
pub mod user;

pub use batch::{BatchRepository, NewBatch};
pub use category::CategoryRepository;
pub use product::{NewProduct, ProductRepository};
pub use returns::{ReturnReceipt, ReturnRepository, ReturnRequest};
pub use sale::{CartLine, CheckoutReceipt, CheckoutRequest, SaleRepository};
pub use user::UserRepository;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::warn;
use uuid::Uuid;

use crate::error::DbResult;

/// Builds a sale or return number: `S-20260114-9F1C2A7B`.
///
/// The date part groups receipts by day; the suffix comes from a v4 UUID.
pub(crate) fn document_number(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        at.format("%Y%m%d"),
        suffix[..8].to_uppercase()
    )
}

/// Opens a write transaction on `conn`.
///
/// `BEGIN IMMEDIATE` takes the write lock before the first read, so a second
/// till waits out the busy timeout instead of failing with `database is locked`
/// when its read snapshot turns stale.
pub(crate) async fn begin_immediate(conn: &mut SqliteConnection) -> DbResult<()> {
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(())
}

/// Commits when `result` is `Ok`, rolls back otherwise.
pub(crate) async fn finish<T>(conn: &mut SqliteConnection, result: DbResult<T>) -> DbResult<T> {
    match result {
        Ok(value) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}
