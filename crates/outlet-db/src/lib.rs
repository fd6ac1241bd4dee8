//! # outlet-db: Database Layer for Outlet POS
//!
//! Each store keeps its own SQLite database. This crate opens them, runs the
//! embedded migrations, and exposes repositories plus read-only views bound
//! to one store at a time.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Outlet POS Data Flow                             │
//! │                                                                         │
//! │  GET /admin/store1/sale/        seed binary / till code                │
//! │       │                                │                                │
//! │       ▼                                ▼                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     outlet-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌───────────────┐    │   │
//! │  │   │ StoreRegistry │   │ ReadOnlyView  │   │ Repositories  │    │   │
//! │  │   │ (stores.rs)   │──►│ (views.rs)    │   │ SaleRepo      │    │   │
//! │  │   │ alias → DB    │   │ SELECT only   │   │ ReturnRepo .. │    │   │
//! │  │   └───────┬───────┘   └───────────────┘   └───────────────┘    │   │
//! │  │           ▼                                                     │   │
//! │  │   ┌───────────────┐   ┌───────────────┐                        │   │
//! │  │   │   Database    │   │  Migrations   │                        │   │
//! │  │   │   (pool.rs)   │   │  (embedded)   │                        │   │
//! │  │   └───────────────┘   └───────────────┘                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                         │                                       │
//! │       ▼                         ▼                                       │
//! │   store1.db                 store2.db                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, sale, return, ...)
//! - [`stores`] - Store alias routing
//! - [`views`] - Read-only per-store record views
//!
//! ## Usage
//!
//! ```rust,ignore
//! use outlet_db::{AdminEntity, DbConfig, StoreInfo, StoreRegistry};
//!
//! let registry = StoreRegistry::open([
//!     (StoreInfo::new("store1", "Do‘kon 1"), DbConfig::new("store1.db")),
//!     (StoreInfo::new("store2", "Do‘kon 2"), DbConfig::new("store2.db")),
//! ])
//! .await?;
//!
//! let receipt = registry.using("store1")?.sales().checkout(&request).await?;
//! let page = registry.view("store1", AdminEntity::Sale)?.list(1, 50).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod stores;
pub mod views;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use stores::{StoreInfo, StoreRegistry};
pub use views::{AdminEntity, ColumnHeader, ColumnKind, ListPage, Permissions, ReadOnlyView, RecordDetail};

// Repository re-exports for convenience
pub use repository::{
    BatchRepository, CartLine, CategoryRepository, CheckoutReceipt, CheckoutRequest, NewBatch,
    NewProduct, ProductRepository, ReturnReceipt, ReturnRepository, ReturnRequest, SaleRepository,
    UserRepository,
};
