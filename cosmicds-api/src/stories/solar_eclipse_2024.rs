//! Solar eclipse 2024 location and timing analytics

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
pub struct SolarEclipse2024Data {
    pub id: i64,
    pub user_uuid: String,
    pub selected_locations: Json<Vec<[f64; 2]>>,
    pub selected_locations_count: i64,
    pub cloud_cover_selected_locations: Json<Vec<[f64; 2]>>,
    pub cloud_cover_selected_locations_count: i64,
    pub info_time_ms: i64,
    pub app_time_ms: i64,
    pub last_updated: DateTime<Utc>,
}

static ROUTES: DataRoutes = DataRoutes {
    table: AccumulatingTable {
        table: "solar_eclipse_2024_data",
        arrays: &[
            ArrayColumn {
                column: "selected_locations",
                count: "selected_locations_count",
            },
            ArrayColumn {
                column: "cloud_cover_selected_locations",
                count: "cloud_cover_selected_locations_count",
            },
        ],
        counters: &["info_time_ms", "app_time_ms"],
        flags: &[],
        replaced: &[],
    },
    entry: Schema {
        fields: &[
            Field::required("user_uuid", FieldType::String),
            Field::required("selected_locations", LAT_LON_ARRAY),
            Field::required("cloud_cover_selected_locations", LAT_LON_ARRAY),
            Field::optional("info_time_ms", FieldType::Integer),
            Field::optional("app_time_ms", FieldType::Integer),
        ],
    },
    update: Schema {
        fields: &[
            Field::optional("selected_locations", LAT_LON_ARRAY),
            Field::optional("cloud_cover_selected_locations", LAT_LON_ARRAY),
            Field::optional("delta_info_time_ms", FieldType::Integer),
            Field::optional("delta_app_time_ms", FieldType::Integer),
        ],
    },
    label: "solar eclipse 2024",
};

pub struct SolarEclipse2024;

#[axum::async_trait]
impl Story for SolarEclipse2024 {
    fn name(&self) -> &'static str {
        "solar-eclipse-2024"
    }

    fn display_name(&self) -> &'static str {
        "Solar Eclipse 2024"
    }

    fn router(&self) -> Router<AppState> {
        data_routes::<SolarEclipse2024Data>(&ROUTES)
    }

    async fn setup(&self, db: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS solar_eclipse_2024_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_uuid TEXT NOT NULL UNIQUE,
                selected_locations TEXT NOT NULL DEFAULT '[]',
                selected_locations_count INTEGER NOT NULL DEFAULT 0,
                cloud_cover_selected_locations TEXT NOT NULL DEFAULT '[]',
                cloud_cover_selected_locations_count INTEGER NOT NULL DEFAULT 0,
                info_time_ms INTEGER NOT NULL DEFAULT 0,
                app_time_ms INTEGER NOT NULL DEFAULT 0,
                last_updated TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(db)
        .await?;
        Ok(())
    }
}
