use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StoreHealth {
    pub alias: String,
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stores: Vec<StoreHealth>,
}

/// 200 when every store database answers, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let stores: Vec<StoreHealth> = state
        .registry
        .health()
        .await
        .into_iter()
        .map(|(alias, healthy)| StoreHealth { alias, healthy })
        .collect();

    let all_healthy = stores.iter().all(|s| s.healthy);
    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if all_healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            stores,
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::testing;

    #[tokio::test]
    async fn test_health_reports_every_store() {
        let (app, _) = testing::app().await;
        let (status, body) = testing::send(app, "GET", "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["stores"][0]["alias"], "store1");
        assert_eq!(body["stores"][1]["alias"], "store2");
        assert_eq!(body["stores"][1]["healthy"], true);
    }
}
