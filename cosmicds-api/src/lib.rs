//! cosmicds-api library - CosmicDS educational data service
//!
//! Shared account, class and state endpoints plus one route tree per story,
//! all behind the API-key/origin gate in [`auth`].

use std::sync::Arc;

use axum::{middleware, Router};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod body;
pub mod db;
pub mod error;
pub mod results;
pub mod schema;
pub mod stories;

use stories::StoryRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Browser origins admitted without an API key
    pub allowed_origins: Arc<Vec<String>>,
    pub stories: Arc<StoryRegistry>,
}

impl AppState {
    pub fn new(db: SqlitePool, allowed_origins: Vec<String>, stories: StoryRegistry) -> Self {
        Self {
            db,
            allowed_origins: Arc::new(allowed_origins),
            stories: Arc::new(stories),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let router = state.stories.mount(api::api_routes());

    router
        .fallback(api::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
