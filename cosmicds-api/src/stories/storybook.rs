//! Storybook: a story with no data of its own, only user-experience ratings

use axum::Router;
use cosmicds_common::Result;
use sqlx::SqlitePool;

use super::Story;
use crate::AppState;

pub struct Storybook;

#[axum::async_trait]
impl Story for Storybook {
    fn name(&self) -> &'static str {
        "storybook"
    }

    fn display_name(&self) -> &'static str {
        "Storybook"
    }

    fn router(&self) -> Router<AppState> {
        Router::new()
    }

    async fn setup(&self, _db: &SqlitePool) -> Result<()> {
        Ok(())
    }
}
