//! # Admin Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     OUTLET_PORT=8000                                                   │
//! │     OUTLET_JWT_SECRET=...                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/outletpos/admin.toml (Linux)                             │
//! │     ~/Library/Application Support/com.outlet.pos/admin.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     store1 + store2 in the working directory                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # admin.toml
//! [server]
//! bind_addr = "127.0.0.1"
//! port = 8000
//! media_url = "/media/"
//! page_size = 100
//!
//! [auth]
//! jwt_secret = "change-me"
//! token_lifetime_secs = 28800
//!
//! [site]
//! header = "Barcha Do'konlar Ma'lumotlari"
//! title = "Admin Panel"
//! index_title = "Do'konlarni boshqarish"
//!
//! [[stores]]
//! alias = "store1"
//! name = "Do‘kon 1"
//! database_path = "/var/lib/outlet/store1.db"
//!
//! [[stores]]
//! alias = "store2"
//! name = "Do‘kon 2"
//! database_path = "/var/lib/outlet/store2.db"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use outlet_core::validation::validate_store_alias;
use outlet_db::views::MAX_PER_PAGE;
use outlet_db::{DbConfig, StoreInfo};

// =============================================================================
// Server Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Public prefix of uploaded product images.
    #[serde(default = "default_media_url")]
    pub media_url: String,

    /// Rows per list page when the request does not say.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_media_url() -> String {
    "/media/".to_string()
}

fn default_page_size() -> u32 {
    100
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
            media_url: default_media_url(),
            page_size: default_page_size(),
        }
    }
}

impl ServerSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Auth Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret for access tokens. Must be set outside development.
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: i64,
}

fn default_token_lifetime() -> i64 {
    8 * 60 * 60
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            jwt_secret: String::new(),
            token_lifetime_secs: default_token_lifetime(),
        }
    }
}

// =============================================================================
// Site Strings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default = "default_site_header")]
    pub header: String,

    #[serde(default = "default_site_title")]
    pub title: String,

    #[serde(default = "default_index_title")]
    pub index_title: String,
}

fn default_site_header() -> String {
    "Barcha Do'konlar Ma'lumotlari".to_string()
}

fn default_site_title() -> String {
    "Admin Panel".to_string()
}

fn default_index_title() -> String {
    "Do'konlarni boshqarish".to_string()
}

impl Default for SiteSettings {
    fn default() -> Self {
        SiteSettings {
            header: default_site_header(),
            title: default_site_title(),
            index_title: default_index_title(),
        }
    }
}

// =============================================================================
// Stores
// =============================================================================

/// One store database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub alias: String,
    pub name: String,
    pub database_path: PathBuf,
}

impl StoreEntry {
    pub fn new(alias: &str, name: &str, database_path: impl Into<PathBuf>) -> Self {
        StoreEntry {
            alias: alias.to_string(),
            name: name.to_string(),
            database_path: database_path.into(),
        }
    }

    pub fn info(&self) -> StoreInfo {
        StoreInfo::new(self.alias.as_str(), self.name.as_str())
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
    }
}

fn default_stores() -> Vec<StoreEntry> {
    vec![
        StoreEntry::new("store1", "Do‘kon 1", "store1.db"),
        StoreEntry::new("store2", "Do‘kon 2", "store2.db"),
    ]
}

// =============================================================================
// Main Admin Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub site: SiteSettings,

    /// Store databases, in display order.
    #[serde(default = "default_stores")]
    pub stores: Vec<StoreEntry>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        AdminConfig {
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            site: SiteSettings::default(),
            stores: default_stores(),
        }
    }
}

impl AdminConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (admin.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ApiResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading admin config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| ApiError::Config(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> ApiResult<Self> {
        toml::from_str(contents).map_err(|e| ApiError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ApiError::Config(
                "auth.jwt_secret must be set (or OUTLET_JWT_SECRET)".into(),
            ));
        }

        if self.auth.token_lifetime_secs <= 0 {
            return Err(ApiError::Config(
                "auth.token_lifetime_secs must be greater than 0".into(),
            ));
        }

        if self.server.page_size == 0 || self.server.page_size > MAX_PER_PAGE {
            return Err(ApiError::Config(format!(
                "server.page_size must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }

        if self.stores.is_empty() {
            return Err(ApiError::Config("at least one store is required".into()));
        }

        for (i, store) in self.stores.iter().enumerate() {
            validate_store_alias(&store.alias)
                .map_err(|e| ApiError::Config(format!("stores[{}]: {}", i, e)))?;

            if self.stores[..i].iter().any(|s| s.alias == store.alias) {
                return Err(ApiError::Config(format!(
                    "store alias '{}' is listed twice",
                    store.alias
                )));
            }

            if store.name.trim().is_empty() {
                return Err(ApiError::Config(format!("stores[{}]: name is empty", i)));
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("OUTLET_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Ok(port) = std::env::var("OUTLET_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding port from environment");
                    self.server.port = p;
                }
                Err(_) => warn!(port = %port, "Ignoring invalid OUTLET_PORT"),
            }
        }

        if let Ok(secret) = std::env::var("OUTLET_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Ok(url) = std::env::var("OUTLET_MEDIA_URL") {
            self.server.media_url = url;
        }

        // OUTLET_STORE1_DB=/data/store1.db
        for store in &mut self.stores {
            let key = format!("OUTLET_{}_DB", store.alias.to_uppercase());
            if let Ok(path) = std::env::var(&key) {
                debug!(store = %store.alias, path = %path, "Overriding store database from environment");
                store.database_path = PathBuf::from(path);
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "outlet", "pos")
            .map(|dirs| dirs.config_dir().join("admin.toml"))
    }
}
