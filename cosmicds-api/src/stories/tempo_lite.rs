//! TEMPO Lite: air-quality explorer usage analytics

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use cosmicds_common::Result;
use serde::Serialize;
use serde_json::json;
use sqlx::types::Json as JsonColumn;
use sqlx::SqlitePool;
use tracing::error;

use super::accumulate::{data_routes, AccumulatingTable, ArrayColumn, DataRoutes};
use super::Story;
use crate::body::JsonBody;
use crate::schema::{Field, FieldType, Schema, INTEGER_ARRAY, STRING_ARRAY, STRING_PAIR_ARRAY};
use crate::AppState;

pub const STORY_NAME: &str = "tempo-lite";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TempoLiteData {
    pub id: i64,
    pub user_uuid: String,
    pub user_selected_calendar_dates: JsonColumn<Vec<i64>>,
    pub user_selected_calendar_dates_count: i64,
    pub user_selected_timezones: JsonColumn<Vec<String>>,
    pub user_selected_timezones_count: i64,
    pub user_selected_locations: JsonColumn<Vec<String>>,
    pub user_selected_locations_count: i64,
    pub user_selected_notable_events: JsonColumn<Vec<[String; 2]>>,
    pub user_selected_notable_events_count: i64,
    pub whats_new_opened_count: i64,
    pub whats_new_open_time_ms: i64,
    pub introduction_opened_count: i64,
    pub introduction_open_time_ms: i64,
    pub user_guide_opened_count: i64,
    pub user_guide_open_time_ms: i64,
    pub about_data_opened_count: i64,
    pub about_data_open_time_ms: i64,
    pub credits_opened_count: i64,
    pub credits_open_time_ms: i64,
    pub share_button_clicked_count: i64,
    pub last_updated: DateTime<Utc>,
}

const COUNTERS: &[&str] = &[
    "whats_new_opened_count",
    "whats_new_open_time_ms",
    "introduction_opened_count",
    "introduction_open_time_ms",
    "user_guide_opened_count",
    "user_guide_open_time_ms",
    "about_data_opened_count",
    "about_data_open_time_ms",
    "credits_opened_count",
    "credits_open_time_ms",
    "share_button_clicked_count",
];

static ROUTES: DataRoutes = DataRoutes {
    table: AccumulatingTable {
        table: "tempo_lite_data",
        arrays: &[
            ArrayColumn {
                column: "user_selected_calendar_dates",
                count: "user_selected_calendar_dates_count",
            },
            ArrayColumn {
                column: "user_selected_timezones",
                count: "user_selected_timezones_count",
            },
            ArrayColumn {
                column: "user_selected_locations",
                count: "user_selected_locations_count",
            },
            ArrayColumn {
                column: "user_selected_notable_events",
                count: "user_selected_notable_events_count",
            },
        ],
        counters: COUNTERS,
        flags: &[],
        replaced: &[],
    },
    entry: Schema {
        fields: &[
            Field::required("user_uuid", FieldType::String),
            Field::optional("user_selected_calendar_dates", INTEGER_ARRAY),
            Field::optional("user_selected_calendar_dates_count", FieldType::Integer),
            Field::optional("user_selected_timezones", STRING_ARRAY),
            Field::optional("user_selected_timezones_count", FieldType::Integer),
            Field::optional("user_selected_locations", STRING_ARRAY),
            Field::optional("user_selected_locations_count", FieldType::Integer),
            Field::optional("user_selected_notable_events", STRING_PAIR_ARRAY),
            Field::optional("user_selected_notable_events_count", FieldType::Integer),
            Field::optional("whats_new_opened_count", FieldType::Integer),
            Field::optional("whats_new_open_time_ms", FieldType::Integer),
            Field::optional("introduction_opened_count", FieldType::Integer),
            Field::optional("introduction_open_time_ms", FieldType::Integer),
            Field::optional("user_guide_opened_count", FieldType::Integer),
            Field::optional("user_guide_open_time_ms", FieldType::Integer),
            Field::optional("about_data_opened_count", FieldType::Integer),
            Field::optional("about_data_open_time_ms", FieldType::Integer),
            Field::optional("credits_opened_count", FieldType::Integer),
            Field::optional("credits_open_time_ms", FieldType::Integer),
            Field::optional("share_button_clicked_count", FieldType::Integer),
        ],
    },
    update: Schema {
        fields: &[
            Field::optional("user_selected_calendar_dates", INTEGER_ARRAY),
            Field::optional("user_selected_timezones", STRING_ARRAY),
            Field::optional("user_selected_locations", STRING_ARRAY),
            Field::optional("user_selected_notable_events", STRING_PAIR_ARRAY),
            Field::optional("delta_whats_new_opened_count", FieldType::Integer),
            Field::optional("delta_whats_new_open_time_ms", FieldType::Integer),
            Field::optional("delta_introduction_opened_count", FieldType::Integer),
            Field::optional("delta_introduction_open_time_ms", FieldType::Integer),
            Field::optional("delta_user_guide_opened_count", FieldType::Integer),
            Field::optional("delta_user_guide_open_time_ms", FieldType::Integer),
            Field::optional("delta_about_data_opened_count", FieldType::Integer),
            Field::optional("delta_about_data_open_time_ms", FieldType::Integer),
            Field::optional("delta_credits_opened_count", FieldType::Integer),
            Field::optional("delta_credits_open_time_ms", FieldType::Integer),
            Field::optional("delta_share_button_clicked_count", FieldType::Integer),
        ],
    },
    label: "TEMPO Lite",
};

const VISIT_SCHEMA: Schema = Schema {
    fields: &[Field::required("info", FieldType::Object)],
};

pub struct TempoLite;

#[axum::async_trait]
impl Story for TempoLite {
    fn name(&self) -> &'static str {
        STORY_NAME
    }

    fn display_name(&self) -> &'static str {
        "TEMPO Lite"
    }

    fn router(&self) -> Router<AppState> {
        data_routes::<TempoLiteData>(&ROUTES).route("/visit", post(add_visit))
    }

    async fn setup(&self, db: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tempo_lite_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_uuid TEXT NOT NULL UNIQUE,
                user_selected_calendar_dates TEXT NOT NULL DEFAULT '[]',
                user_selected_calendar_dates_count INTEGER NOT NULL DEFAULT 0,
                user_selected_timezones TEXT NOT NULL DEFAULT '[]',
                user_selected_timezones_count INTEGER NOT NULL DEFAULT 0,
                user_selected_locations TEXT NOT NULL DEFAULT '[]',
                user_selected_locations_count INTEGER NOT NULL DEFAULT 0,
                user_selected_notable_events TEXT NOT NULL DEFAULT '[]',
                user_selected_notable_events_count INTEGER NOT NULL DEFAULT 0,
                whats_new_opened_count INTEGER NOT NULL DEFAULT 0,
                whats_new_open_time_ms INTEGER NOT NULL DEFAULT 0,
                introduction_opened_count INTEGER NOT NULL DEFAULT 0,
                introduction_open_time_ms INTEGER NOT NULL DEFAULT 0,
                user_guide_opened_count INTEGER NOT NULL DEFAULT 0,
                user_guide_open_time_ms INTEGER NOT NULL DEFAULT 0,
                about_data_opened_count INTEGER NOT NULL DEFAULT 0,
                about_data_open_time_ms INTEGER NOT NULL DEFAULT 0,
                credits_opened_count INTEGER NOT NULL DEFAULT 0,
                credits_open_time_ms INTEGER NOT NULL DEFAULT 0,
                share_button_clicked_count INTEGER NOT NULL DEFAULT 0,
                last_updated TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(db)
        .await?;
        Ok(())
    }
}

/// POST /tempo-lite/visit
async fn add_visit(State(state): State<AppState>, JsonBody(body): JsonBody) -> Response {
    let Some(info) = VISIT_SCHEMA.validate(&body).ok().and_then(|b| b.get("info")) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Invalid request body; should have form { info: <object> }",
            })),
        )
            .into_response();
    };

    match crate::db::stories::add_visit(&state.db, STORY_NAME, info).await {
        Ok(_) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            error!("Failed to record {} visit: {}", STORY_NAME, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Error creating story visit info entry",
                })),
            )
                .into_response()
        }
    }
}
