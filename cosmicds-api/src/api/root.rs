//! Welcome, key-permission and health endpoints
//!
//! These are the only routes reachable without a key or an allowed origin.

use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::presented_key;
use crate::AppState;

const WELCOME: &str = "Welcome to the CosmicDS server!";
const NEEDS_KEY: &str =
    " You'll need to include a valid API key with your requests in order to access other endpoints.";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /
pub async fn welcome(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let mut message = WELCOME.to_string();
    if presented_key(&state.db, &headers).await.is_none() {
        message.push_str(NEEDS_KEY);
    }
    Json(json!({ "message": message }))
}

/// GET /permission
///
/// Describes the presented key so clients can check what it unlocks.
pub async fn permission(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let key = presented_key(&state.db, &headers).await;
    Json(json!({
        "valid_key": key.is_some(),
        "permissions_root": key.and_then(|k| k.permissions_root),
    }))
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "cosmicds-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn root_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome))
        .route("/permission", get(permission))
        .route("/health", get(health_check))
}
