//! HTTP API handlers for the shared (non-story) endpoints

pub mod classes;
pub mod options;
pub mod questions;
pub mod root;
pub mod states;
pub mod users;

use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;

use crate::AppState;

pub use classes::class_routes;
pub use options::option_routes;
pub use questions::question_routes;
pub use root::root_routes;
pub use states::state_routes;
pub use users::user_routes;

/// Every shared endpoint
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(root_routes())
        .merge(user_routes())
        .merge(class_routes())
        .merge(state_routes())
        .merge(question_routes())
        .merge(option_routes())
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("Not found: {}", uri.path()) })),
    )
        .into_response()
}

/// Path identifiers that do not parse become 0, which matches no row
pub fn parse_id(raw: &str) -> i64 {
    raw.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42"), 42);
        assert_eq!(parse_id("abc"), 0);
        assert_eq!(parse_id(""), 0);
    }
}
