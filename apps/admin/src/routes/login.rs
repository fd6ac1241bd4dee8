use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use outlet_core::User;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Store whose users table is checked; the first configured store when absent.
    #[serde(default)]
    pub store: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub store: String,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let store = match request.store {
        Some(alias) => alias,
        None => state
            .registry
            .stores()
            .next()
            .map(|s| s.alias.clone())
            .ok_or_else(|| ApiError::Unavailable("No stores configured".to_string()))?,
    };

    let db = state.registry.using(&store)?;

    let user = db
        .users()
        .verify_password(&request.username, &request.password)
        .await?
        .ok_or_else(|| ApiError::AuthFailed("Invalid username or password".to_string()))?;

    if !user.is_staff {
        warn!(user = %user.username, store = %store, "Non-staff user tried to sign in");
        return Err(ApiError::Forbidden("Staff access required".to_string()));
    }

    let access_token = state.jwt.generate_access_token(&user, &store)?;
    info!(user = %user.username, store = %store, "Staff user signed in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.jwt.lifetime_secs(),
        store,
        user,
    }))
}
