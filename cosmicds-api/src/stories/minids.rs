//! Mini data stories: annular eclipse 2023 responses

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use cosmicds_common::Result;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::types::Json as JsonColumn;
use sqlx::SqlitePool;
use tracing::error;

use super::accumulate::{self, AccumulatingTable, ArrayColumn, KEY_COLUMN};
use super::Story;
use crate::body::JsonBody;
use crate::schema::{Field, FieldType, Schema, LAT_LON_ARRAY, STRING_ARRAY};
use crate::AppState;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EclipseMiniResponse {
    pub id: i64,
    pub user_uuid: String,
    pub mc_responses: JsonColumn<Vec<String>>,
    pub preset_locations: JsonColumn<Vec<String>>,
    pub preset_locations_count: i64,
    pub user_selected_locations: JsonColumn<Vec<[f64; 2]>>,
    pub user_selected_locations_count: i64,
    pub last_updated: DateTime<Utc>,
}

const TABLE: AccumulatingTable = AccumulatingTable {
    table: "annular_eclipse_2023_responses",
    arrays: &[
        ArrayColumn {
            column: "preset_locations",
            count: "preset_locations_count",
        },
        ArrayColumn {
            column: "user_selected_locations",
            count: "user_selected_locations_count",
        },
    ],
    counters: &[],
    flags: &[],
    replaced: &["mc_responses"],
};

const RESPONSE_SCHEMA: Schema = Schema {
    fields: &[
        Field::required("user_uuid", FieldType::String),
        Field::optional("mc_responses", STRING_ARRAY),
        Field::required("preset_locations", STRING_ARRAY),
        Field::required("user_selected_locations", LAT_LON_ARRAY),
    ],
};

pub struct Minids;

#[axum::async_trait]
impl Story for Minids {
    fn name(&self) -> &'static str {
        "minids"
    }

    fn display_name(&self) -> &'static str {
        "Mini Data Stories"
    }

    fn router(&self) -> Router<AppState> {
        Router::new()
            .route("/annular-eclipse-2023/response", put(submit_response))
            .route("/annular-eclipse-2023/responses", get(all_responses))
            .route("/annular-eclipse-2023/response/:uuid", get(get_response))
    }

    async fn setup(&self, db: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS annular_eclipse_2023_responses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_uuid TEXT NOT NULL UNIQUE,
                mc_responses TEXT NOT NULL DEFAULT '[]',
                preset_locations TEXT NOT NULL DEFAULT '[]',
                preset_locations_count INTEGER NOT NULL DEFAULT 0,
                user_selected_locations TEXT NOT NULL DEFAULT '[]',
                user_selected_locations_count INTEGER NOT NULL DEFAULT 0,
                last_updated TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(db)
        .await?;
        Ok(())
    }
}

async fn submit_response(State(state): State<AppState>, JsonBody(body): JsonBody) -> Response {
    let Ok(entry) = RESPONSE_SCHEMA.validate(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Malformed response submission" })),
        )
            .into_response();
    };
    let user_uuid = entry.get(KEY_COLUMN).and_then(Value::as_str).unwrap_or_default();

    match accumulate::submit::<EclipseMiniResponse>(&state.db, &TABLE, user_uuid, entry).await {
        Ok(response) => Json(json!({ "response": response })).into_response(),
        Err(e) => {
            error!("Failed to store eclipse response for {}: {}", user_uuid, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Error creating eclipse mini response" })),
            )
                .into_response()
        }
    }
}

async fn all_responses(State(state): State<AppState>) -> Response {
    match accumulate::fetch_all::<EclipseMiniResponse>(&state.db, &TABLE).await {
        Ok(responses) => Json(json!({ "responses": responses })).into_response(),
        Err(e) => {
            error!("Failed to list eclipse responses: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Error retrieving responses" })),
            )
                .into_response()
        }
    }
}

/// Unknown users get `{ response: null }`
async fn get_response(State(state): State<AppState>, Path(uuid): Path<String>) -> Response {
    match accumulate::fetch::<EclipseMiniResponse>(&state.db, &TABLE, &uuid).await {
        Ok(response) => Json(json!({ "response": response })).into_response(),
        Err(e) => {
            error!("Failed to read eclipse response for {}: {}", uuid, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Error retrieving response" })),
            )
                .into_response()
        }
    }
}
