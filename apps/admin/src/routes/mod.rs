//! HTTP routes.

pub mod admin;
pub mod health;
pub mod login;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(login::login))
        .route("/admin", get(admin::index))
        .route(
            "/admin/{store}/{entity}",
            get(admin::list)
                .post(admin::reject_write)
                .put(admin::reject_write)
                .patch(admin::reject_write)
                .delete(admin::reject_write),
        )
        .route(
            "/admin/{store}/{entity}/{id}",
            get(admin::detail)
                .post(admin::reject_write)
                .put(admin::reject_write)
                .patch(admin::reject_write)
                .delete(admin::reject_write),
        )
}
