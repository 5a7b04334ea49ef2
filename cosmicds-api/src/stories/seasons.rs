//! Seasons story analytics

use axum::Router;
use chrono::{DateTime, Utc};
use cosmicds_common::Result;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::SqlitePool;

use super::accumulate::{data_routes, AccumulatingTable, ArrayColumn, DataRoutes};
use super::Story;
use crate::schema::{Field, FieldType, Schema, INTEGER_ARRAY, STRING_ARRAY};
use crate::AppState;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SeasonsData {
    pub id: i64,
    pub user_uuid: String,
    pub user_selected_dates: Json<Vec<i64>>,
    pub user_selected_dates_count: i64,
    pub user_selected_locations: Json<Vec<String>>,
    pub user_selected_locations_count: i64,
    pub response: Option<String>,
    pub last_updated: DateTime<Utc>,
}

static ROUTES: DataRoutes = DataRoutes {
    table: AccumulatingTable {
        table: "seasons_data",
        arrays: &[
            ArrayColumn {
                column: "user_selected_dates",
                count: "user_selected_dates_count",
            },
            ArrayColumn {
                column: "user_selected_locations",
                count: "user_selected_locations_count",
            },
        ],
        counters: &[],
        flags: &[],
        replaced: &["response"],
    },
    entry: Schema {
        fields: &[
            Field::required("user_uuid", FieldType::String),
            Field::optional("user_selected_dates", INTEGER_ARRAY),
            Field::optional("user_selected_dates_count", FieldType::Integer),
            Field::optional("user_selected_locations", STRING_ARRAY),
            Field::optional("user_selected_locations_count", FieldType::Integer),
            Field::optional("response", FieldType::String),
        ],
    },
    update: Schema {
        fields: &[
            Field::optional("user_selected_dates", INTEGER_ARRAY),
            Field::optional("user_selected_locations", STRING_ARRAY),
            Field::optional("response", FieldType::String),
        ],
    },
    label: "Seasons",
};

pub struct Seasons;

#[axum::async_trait]
impl Story for Seasons {
    fn name(&self) -> &'static str {
        "seasons"
    }

    fn display_name(&self) -> &'static str {
        "Seasons"
    }

    fn router(&self) -> Router<AppState> {
        data_routes::<SeasonsData>(&ROUTES)
    }

    async fn setup(&self, db: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seasons_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_uuid TEXT NOT NULL UNIQUE,
                user_selected_dates TEXT NOT NULL DEFAULT '[]',
                user_selected_dates_count INTEGER NOT NULL DEFAULT 0,
                user_selected_locations TEXT NOT NULL DEFAULT '[]',
                user_selected_locations_count INTEGER NOT NULL DEFAULT 0,
                response TEXT,
                last_updated TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(db)
        .await?;
        Ok(())
    }
}
