//! Planet Parade usage analytics

use axum::Router;
use chrono::{DateTime, Utc};
use cosmicds_common::Result;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::SqlitePool;

use super::accumulate::{data_routes, AccumulatingTable, ArrayColumn, DataRoutes};
use super::Story;
use crate::schema::{Field, FieldType, Schema, LAT_LON_ARRAY};
use crate::AppState;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PlanetParadeData {
    pub id: i64,
    pub user_uuid: String,
    pub user_selected_search_locations: Json<Vec<[f64; 2]>>,
    pub user_selected_search_locations_count: i64,
    pub user_selected_map_locations: Json<Vec<[f64; 2]>>,
    pub user_selected_map_locations_count: i64,
    pub app_time_ms: i64,
    pub info_time_ms: i64,
    pub video_time_ms: i64,
    pub video_opened: bool,
    pub video_played: bool,
    pub last_updated: DateTime<Utc>,
}

static ROUTES: DataRoutes = DataRoutes {
    table: AccumulatingTable {
        table: "planet_parade_data",
        arrays: &[
            ArrayColumn {
                column: "user_selected_search_locations",
                count: "user_selected_search_locations_count",
            },
            ArrayColumn {
                column: "user_selected_map_locations",
                count: "user_selected_map_locations_count",
            },
        ],
        counters: &["app_time_ms", "info_time_ms", "video_time_ms"],
        // Once opened or played, the video stays that way
        flags: &["video_opened", "video_played"],
        replaced: &[],
    },
    entry: Schema {
        fields: &[
            Field::required("user_uuid", FieldType::String),
            Field::required("user_selected_search_locations", LAT_LON_ARRAY),
            Field::optional("user_selected_search_locations_count", FieldType::Integer),
            Field::required("user_selected_map_locations", LAT_LON_ARRAY),
            Field::optional("user_selected_map_locations_count", FieldType::Integer),
            Field::optional("app_time_ms", FieldType::Integer),
            Field::optional("info_time_ms", FieldType::Integer),
            Field::optional("video_time_ms", FieldType::Integer),
            Field::optional("video_opened", FieldType::Boolean),
            Field::optional("video_played", FieldType::Boolean),
        ],
    },
    update: Schema {
        fields: &[
            Field::optional("user_selected_search_locations", LAT_LON_ARRAY),
            Field::optional("user_selected_map_locations", LAT_LON_ARRAY),
            Field::optional("delta_app_time_ms", FieldType::Integer),
            Field::optional("delta_info_time_ms", FieldType::Integer),
            Field::optional("delta_video_time_ms", FieldType::Integer),
            Field::optional("video_opened", FieldType::Boolean),
            Field::optional("video_played", FieldType::Boolean),
        ],
    },
    label: "planet parade",
};

pub struct PlanetParade;

#[axum::async_trait]
impl Story for PlanetParade {
    fn name(&self) -> &'static str {
        "planet-parade"
    }

    fn display_name(&self) -> &'static str {
        "Planet Parade"
    }

    fn router(&self) -> Router<AppState> {
        data_routes::<PlanetParadeData>(&ROUTES)
    }

    async fn setup(&self, db: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS planet_parade_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_uuid TEXT NOT NULL UNIQUE,
                user_selected_search_locations TEXT NOT NULL DEFAULT '[]',
                user_selected_search_locations_count INTEGER NOT NULL DEFAULT 0,
                user_selected_map_locations TEXT NOT NULL DEFAULT '[]',
                user_selected_map_locations_count INTEGER NOT NULL DEFAULT 0,
                app_time_ms INTEGER NOT NULL DEFAULT 0,
                info_time_ms INTEGER NOT NULL DEFAULT 0,
                video_time_ms INTEGER NOT NULL DEFAULT 0,
                video_opened INTEGER NOT NULL DEFAULT 0,
                video_played INTEGER NOT NULL DEFAULT 0,
                last_updated TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(db)
        .await?;
        Ok(())
    }
}
