//! # Store Routing
//!
//! Each outlet keeps its own SQLite file. The registry maps a store alias to
//! that store's [`Database`], so every query names the store it runs on.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  StoreRegistry                                                         │
//! │  ├── "store1" (Do‘kon 1) ──► Database ──► /var/lib/outlet/store1.db    │
//! │  └── "store2" (Do‘kon 2) ──► Database ──► /var/lib/outlet/store2.db    │
//! │                                                                         │
//! │  registry.using("store2")?.sales().list(50, 0)                         │
//! │  registry.using("store9")  ──► DbError::UnknownStore                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here reads across stores: a query bound to one alias only sees
//! that store's rows.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::{Database, DbConfig};
use crate::views::{AdminEntity, ReadOnlyView};
use outlet_core::validation::validate_store_alias;

/// A store as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Connection alias, used in URLs (`store1`).
    pub alias: String,
    /// Suffix of every view name (`Do‘kon 1`).
    pub display_name: String,
}

impl StoreInfo {
    pub fn new(alias: impl Into<String>, display_name: impl Into<String>) -> Self {
        StoreInfo {
            alias: alias.into(),
            display_name: display_name.into(),
        }
    }
}

/// One open database per store, in registration order.
#[derive(Debug, Clone, Default)]
pub struct StoreRegistry {
    stores: Vec<(StoreInfo, Database)>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        StoreRegistry::default()
    }

    /// Opens (and migrates) every store's database.
    pub async fn open(stores: impl IntoIterator<Item = (StoreInfo, DbConfig)>) -> DbResult<Self> {
        let mut registry = StoreRegistry::new();

        for (info, config) in stores {
            info!(store = %info.alias, path = %config.database_path.display(), "Opening store");
            let db = Database::new(config).await?;
            registry.register(info, db)?;
        }

        Ok(registry)
    }

    /// Adds an already open database.
    ///
    /// ## Errors
    /// * `DbError::Domain` - alias is not a valid store alias
    /// * `DbError::UniqueViolation` - alias already registered
    pub fn register(&mut self, info: StoreInfo, db: Database) -> DbResult<()> {
        validate_store_alias(&info.alias)?;

        if self.stores.iter().any(|(s, _)| s.alias == info.alias) {
            return Err(DbError::duplicate("store alias", info.alias));
        }

        self.stores.push((info, db));
        Ok(())
    }

    /// The database bound to `alias`.
    pub fn using(&self, alias: &str) -> DbResult<&Database> {
        self.entry(alias).map(|(_, db)| db)
    }

    pub fn info(&self, alias: &str) -> DbResult<&StoreInfo> {
        self.entry(alias).map(|(info, _)| info)
    }

    /// Registered stores, in order.
    pub fn stores(&self) -> impl Iterator<Item = &StoreInfo> {
        self.stores.iter().map(|(info, _)| info)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Read-only view of one entity in one store.
    pub fn view(&self, alias: &str, entity: AdminEntity) -> DbResult<ReadOnlyView> {
        let (info, db) = self.entry(alias)?;
        Ok(ReadOnlyView::new(info.clone(), entity, db.clone()))
    }

    /// Every entity for every store: stores in order, entities in
    /// [`AdminEntity::ALL`] order.
    pub fn views(&self) -> Vec<ReadOnlyView> {
        self.stores
            .iter()
            .flat_map(|(info, db)| {
                AdminEntity::ALL
                    .into_iter()
                    .map(move |entity| ReadOnlyView::new(info.clone(), entity, db.clone()))
            })
            .collect()
    }

    /// `(alias, healthy)` for each store.
    pub async fn health(&self) -> Vec<(String, bool)> {
        let mut report = Vec::with_capacity(self.stores.len());
        for (info, db) in &self.stores {
            report.push((info.alias.clone(), db.health_check().await));
        }
        report
    }

    pub async fn close(&self) {
        for (_, db) in &self.stores {
            db.close().await;
        }
    }

    fn entry(&self, alias: &str) -> DbResult<&(StoreInfo, Database)> {
        self.stores
            .iter()
            .find(|(info, _)| info.alias == alias)
            .ok_or_else(|| DbError::UnknownStore(alias.to_string()))
    }
}
