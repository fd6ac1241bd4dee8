//! # Outlet Admin
//!
//! Read-only HTTP browser over every store's records.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET    /health                        liveness + per-store DB health  │
//! │  POST   /auth/login                    staff login → bearer token      │
//! │                                                                         │
//! │  GET    /admin                         site strings + every view       │
//! │  GET    /admin/{store}/{entity}        one page of rows                │
//! │  GET    /admin/{store}/{entity}/{id}   one record                      │
//! │  POST/PUT/PATCH/DELETE on the above    403 (views are read-only)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;

use crate::auth::JwtManager;
use crate::config::AdminConfig;
use outlet_db::{DbResult, StoreRegistry};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StoreRegistry>,
    pub jwt: Arc<JwtManager>,
    pub config: Arc<AdminConfig>,
}

impl AppState {
    pub fn new(registry: StoreRegistry, config: AdminConfig) -> Self {
        let jwt = JwtManager::new(config.auth.jwt_secret.clone(), config.auth.token_lifetime_secs);
        AppState {
            registry: Arc::new(registry),
            jwt: Arc::new(jwt),
            config: Arc::new(config),
        }
    }

    /// Opens every configured store database.
    pub async fn open(config: AdminConfig) -> DbResult<Self> {
        let registry =
            StoreRegistry::open(config.stores.iter().map(|s| (s.info(), s.db_config()))).await?;
        Ok(AppState::new(registry, config))
    }
}

pub fn build_router(state: AppState) -> Router {
    routes::router().with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared setup for route tests.

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{build_router, AppState};
    use crate::config::AdminConfig;
    use outlet_db::{DbConfig, StoreInfo, StoreRegistry};

    pub async fn state() -> AppState {
        let registry = StoreRegistry::open([
            (StoreInfo::new("store1", "Do‘kon 1"), DbConfig::in_memory()),
            (StoreInfo::new("store2", "Do‘kon 2"), DbConfig::in_memory()),
        ])
        .await
        .unwrap();

        let mut config = AdminConfig::default();
        config.auth.jwt_secret = "test-secret".to_string();

        let state = AppState::new(registry, config);
        let store1 = state.registry.using("store1").unwrap();
        store1.users().create("admin", "parol123", true).await.unwrap();
        store1.users().create("kassir", "parol123", false).await.unwrap();
        state
    }

    pub async fn token(state: &AppState) -> String {
        let user = state
            .registry
            .using("store1")
            .unwrap()
            .users()
            .get_by_username("admin")
            .await
            .unwrap()
            .unwrap();
        state.jwt.generate_access_token(&user, "store1").unwrap()
    }

    pub async fn send(
        app: Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn app() -> (Router, AppState) {
        let state = state().await;
        (build_router(state.clone()), state)
    }
}
