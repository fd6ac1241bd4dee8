//! # Domain Types
//!
//! The entities of one store database.
//!
//! ## Entity Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Store Schema                                    │
//! │                                                                         │
//! │  Category 1──* Product 1──* ProductBatch                               │
//! │                   │              │                                      │
//! │                   │              │ (batch consumed FIFO)                │
//! │                   ▼              ▼                                      │
//! │  Sale 1──────────* SaleItem ◄────┘                                      │
//! │   │                  │                                                  │
//! │   │                  │ returned_quantity += ReturnItem.returned_quantity│
//! │   ▼                  ▼                                                  │
//! │  ReturnSale 1──* ReturnItem                                             │
//! │                                                                         │
//! │  User ── created_by / cashier on Product, ProductBatch, Sale, Return   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Rows use auto-increment integer keys. Business identifiers (barcode,
//! sale_number, return_number) are unique per store database. No row carries
//! a store id: the store is the database the row lives in.
//!
//! ## Money Columns
//! Monetary fields are `*_cents: i64` with a `Money` accessor, so rows map
//! straight onto SQLite integers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points: 1200 bps = 12%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Choice Enums
// =============================================================================

/// Unit of measure a product is sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Kg,
    #[default]
    Piece,
    Liter,
    Meter,
}

impl Unit {
    pub const ALL: [Unit; 4] = [Unit::Kg, Unit::Piece, Unit::Liter, Unit::Meter];

    /// Stored code.
    pub fn code(&self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::Piece => "piece",
            Unit::Liter => "liter",
            Unit::Meter => "meter",
        }
    }

    /// Label shown on the admin screens.
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Kg => "Kilogram",
            Unit::Piece => "Dona",
            Unit::Liter => "Litr",
            Unit::Meter => "Metr",
        }
    }
}

impl FromStr for Unit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::ALL
            .into_iter()
            .find(|u| u.code() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "unit".to_string(),
                allowed: Unit::ALL.iter().map(|u| u.code().to_string()).collect(),
            })
    }
}

/// How a sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 2] = [PaymentMethod::Cash, PaymentMethod::Card];

    pub fn code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Naqd",
            PaymentMethod::Card => "Karta",
        }
    }
}

/// Lifecycle of a sale after checkout.
///
/// ```text
/// completed ──(some items returned)──► partially_returned ──(rest)──► returned
///     └──────────────(everything returned at once)───────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    #[default]
    Completed,
    PartiallyReturned,
    Returned,
}

impl SaleStatus {
    pub const ALL: [SaleStatus; 3] = [
        SaleStatus::Completed,
        SaleStatus::PartiallyReturned,
        SaleStatus::Returned,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::PartiallyReturned => "partially_returned",
            SaleStatus::Returned => "returned",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "Yakunlangan",
            SaleStatus::PartiallyReturned => "Qisman qaytarilgan",
            SaleStatus::Returned => "Qaytarilgan",
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// A staff account: product creators, cashiers, admin browser users.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip)]
    pub password_hash: String,
    /// Staff users may sign in to the admin browser.
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

// =============================================================================
// Category
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: i64,
    /// Unique per store.
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalogue. Prices live on its batches.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,
    /// Unique per store.
    pub barcode: String,
    pub name: String,
    pub category_id: i64,
    /// Relative path of the uploaded image under the media root.
    pub image: Option<String>,
    pub unit: Unit,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub created_by: i64,
}

impl Product {
    /// Public URL of the product image, if one was uploaded.
    ///
    /// ```rust,ignore
    /// product.image_url("/media/") // Some("/media/products/non.jpg")
    /// ```
    pub fn image_url(&self, media_url: &str) -> Option<String> {
        self.image
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(|path| format!("{}{}", media_url, path))
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.barcode)
    }
}

// =============================================================================
// Product Batch
// =============================================================================

/// One delivery of stock for a product, with its own prices and dates.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductBatch {
    pub id: i64,
    pub product_id: i64,
    pub batch_number: String,
    pub purchase_price_cents: i64,
    pub selling_price_cents: i64,
    pub initial_quantity: i64,
    /// Decremented by sales, incremented by returns. Never above initial.
    pub remaining_quantity: i64,
    #[ts(as = "String")]
    pub arrival_date: NaiveDate,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub created_by: i64,
}

impl ProductBatch {
    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Units that have left this batch.
    #[inline]
    pub fn sold_quantity(&self) -> i64 {
        self.initial_quantity - self.remaining_quantity
    }

    /// Expired batches are not sellable from the day after `expiry_date`.
    #[inline]
    pub fn is_expired(&self, on: NaiveDate) -> bool {
        self.expiry_date < on
    }

    #[inline]
    pub fn is_sellable(&self, on: NaiveDate) -> bool {
        self.remaining_quantity > 0 && !self.is_expired(on)
    }
}

/// `B-1 (8/10)`. The admin list prefixes the product name
/// (`Non - B-1 (8/10)`), which a bare batch row does not carry.
impl fmt::Display for ProductBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{})",
            self.batch_number, self.remaining_quantity, self.initial_quantity
        )
    }
}

/// Selling price of the most recently created batch that still has stock.
///
/// Zero when the product is sold out.
pub fn current_selling_price(batches: &[ProductBatch]) -> Money {
    batches
        .iter()
        .filter(|b| b.remaining_quantity > 0)
        .max_by_key(|b| (b.created_at, b.id))
        .map(|b| b.selling_price())
        .unwrap_or_default()
}

/// Units on hand across all batches.
pub fn total_stock(batches: &[ProductBatch]) -> i64 {
    batches
        .iter()
        .filter(|b| b.remaining_quantity > 0)
        .map(|b| b.remaining_quantity)
        .sum()
}

// =============================================================================
// Sale
// =============================================================================

/// A completed checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    /// Unique per store.
    pub sale_number: String,
    pub cashier_id: i64,
    /// Subtotal plus tax.
    pub total_amount_cents: i64,
    pub tax_amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_amount_cents: i64,
    pub change_amount_cents: i64,
    pub status: SaleStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    #[inline]
    pub fn tax_amount(&self) -> Money {
        Money::from_cents(self.tax_amount_cents)
    }

    #[inline]
    pub fn payment_amount(&self) -> Money {
        Money::from_cents(self.payment_amount_cents)
    }

    #[inline]
    pub fn change_amount(&self) -> Money {
        Money::from_cents(self.change_amount_cents)
    }
}

impl fmt::Display for Sale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Savdo #{} - {} so'm", self.sale_number, self.total_amount())
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// One line of a sale, drawn from exactly one batch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub batch_id: i64,
    pub quantity: i64,
    /// The batch's selling price at the time of sale.
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
    /// Never above `quantity`.
    pub returned_quantity: i64,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }

    /// Units that can still be returned.
    #[inline]
    pub fn remaining_quantity(&self) -> i64 {
        self.quantity - self.returned_quantity
    }

    #[inline]
    pub fn is_fully_returned(&self) -> bool {
        self.remaining_quantity() <= 0
    }
}

// =============================================================================
// Returns
// =============================================================================

/// A return processed against an earlier sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnSale {
    pub id: i64,
    pub original_sale_id: i64,
    /// Unique per store.
    pub return_number: String,
    pub cashier_id: i64,
    pub total_return_amount_cents: i64,
    /// Free text, may be empty.
    pub reason: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ReturnSale {
    #[inline]
    pub fn total_return_amount(&self) -> Money {
        Money::from_cents(self.total_return_amount_cents)
    }
}

impl fmt::Display for ReturnSale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qaytarish #{}", self.return_number)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnItem {
    pub id: i64,
    pub return_sale_id: i64,
    pub sale_item_id: i64,
    pub returned_quantity: i64,
    pub return_amount_cents: i64,
}

impl ReturnItem {
    #[inline]
    pub fn return_amount(&self) -> Money {
        Money::from_cents(self.return_amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
