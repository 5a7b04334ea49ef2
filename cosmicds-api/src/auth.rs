//! API key and origin gate
//!
//! Requests from an allowed browser origin pass untouched. Everything else
//! must present an API key in the `Authorization` header, and the key's
//! permission root (when it has one) must prefix the request path.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use cosmicds_common::auth::key_permits_path;
use cosmicds_common::db::ApiKey;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db::api_keys;
use crate::AppState;

/// Paths reachable without a key
pub const PUBLIC_PATHS: [&str; 3] = ["/", "/permission", "/health"];

/// Look up the key presented in the `Authorization` header
pub async fn presented_key(db: &SqlitePool, headers: &HeaderMap) -> Option<ApiKey> {
    let key = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    match api_keys::find_by_key(db, key).await {
        Ok(found) => found,
        Err(e) => {
            warn!("API key lookup failed: {}", e);
            None
        }
    }
}

fn origin_allowed(allowed: &[String], headers: &HeaderMap) -> bool {
    headers
        .get(header::ORIGIN)
        .and_then(|origin| origin.to_str().ok())
        .is_some_and(|origin| allowed.iter().any(|o| o == origin))
}

/// Authentication middleware
pub async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if PUBLIC_PATHS.contains(&path.as_str()) || origin_allowed(&state.allowed_origins, request.headers()) {
        return next.run(request).await;
    }

    match presented_key(&state.db, request.headers()).await {
        Some(key) if key_permits_path(key.permissions_root.as_deref(), &path) => next.run(request).await,
        Some(key) => {
            debug!("Key for client {} refused for {}", key.client, path);
            AuthError::Forbidden.into_response()
        }
        None => AuthError::MissingKey.into_response(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No key, or a key that does not exist
    MissingKey,
    /// A valid key whose permission root excludes the path
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingKey => (StatusCode::UNAUTHORIZED, "You must provide a valid CosmicDS API key!"),
            AuthError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Your API key does not provide permission to access this endpoint!",
            ),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_origin_allowed() {
        let allowed = vec!["https://cosmicds.github.io".to_string()];
        let mut headers = HeaderMap::new();
        assert!(!origin_allowed(&allowed, &headers));

        headers.insert(header::ORIGIN, HeaderValue::from_static("https://example.com"));
        assert!(!origin_allowed(&allowed, &headers));

        headers.insert(header::ORIGIN, HeaderValue::from_static("https://cosmicds.github.io"));
        assert!(origin_allowed(&allowed, &headers));
    }

    #[test]
    fn test_auth_error_statuses() {
        assert_eq!(AuthError::MissingKey.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
    }
}
