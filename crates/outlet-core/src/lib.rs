//! # outlet-core: Pure Business Logic for Outlet POS
//!
//! Entity definitions, money arithmetic, FIFO batch allocation, checkout
//! pricing and return bookkeeping. Zero I/O: every function here is
//! deterministic and testable without a database.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Outlet POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              apps/admin (read-only record browser)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             outlet-db (repositories, stores, views)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ outlet-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌─────────┐ ┌────────┐ │   │
//! │  │   │  types  │ │  money  │ │ inventory │ │checkout │ │returns │ │   │
//! │  │   └─────────┘ └─────────┘ └───────────┘ └─────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Category, Product, ProductBatch, Sale, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`inventory`] - FIFO allocation of a sale quantity across batches
//! - [`checkout`] - Sale totals, tax, payment and change
//! - [`returns`] - Return validation and sale status progression
//! - [`validation`] - Field rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use outlet_core::money::Money;
//! use outlet_core::types::TaxRate;
//!
//! let price = Money::from_cents(1000);
//! let tax = price.calculate_tax(TaxRate::from_bps(1200)); // 12%
//! assert_eq!(tax.cents(), 120);
//! ```

pub mod checkout;
pub mod error;
pub mod inventory;
pub mod money;
pub mod returns;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

/// Maximum quantity of a single product in one sale line.
///
/// Guards against typos at the till (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Maximum number of distinct lines in one checkout.
pub const MAX_SALE_LINES: usize = 200;
