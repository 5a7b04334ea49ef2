//! Routes every story gets: user-experience ratings

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use tracing::error;

use crate::body::JsonBody;
use crate::db::stories::{self as story_db, ExperienceInfo, RATINGS};
use crate::schema::{decode, Field, FieldType, Schema, Validated};
use crate::AppState;

impl Validated for ExperienceInfo {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::optional("comments", FieldType::String),
            Field::required("uuid", FieldType::String),
            Field::required("question", FieldType::String),
            Field::optional("rating", FieldType::Enum(&RATINGS)),
        ],
    };
}

/// User-experience routes bound to one story name
pub fn story_router(story_name: &'static str) -> Router<AppState> {
    Router::new()
        .route(
            "/user-experience",
            put(move |State(state): State<AppState>, JsonBody(body): JsonBody| {
                set_user_experience(state, story_name, body)
            }),
        )
        .route(
            "/user-experience/:uuid",
            get(move |State(state): State<AppState>, Path(uuid): Path<String>| {
                get_user_experience(state, story_name, uuid)
            }),
        )
}

async fn set_user_experience(
    state: AppState,
    story_name: &'static str,
    body: serde_json::Value,
) -> Response {
    let info: ExperienceInfo = match decode(body) {
        Ok(info) => info,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": format!(
                        "Invalid request body; should have the following schema: {}",
                        ExperienceInfo::SCHEMA.describe()
                    ),
                })),
            )
                .into_response();
        }
    };

    match story_db::set_experience(&state.db, story_name, &info).await {
        Ok(rating) => Json(json!({ "success": true, "rating": rating })).into_response(),
        Err(e) => {
            error!("Failed to store user experience for {}: {}", story_name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Error creating user experience info",
                })),
            )
                .into_response()
        }
    }
}

async fn get_user_experience(state: AppState, story_name: &'static str, uuid: String) -> Response {
    match story_db::get_experience(&state.db, story_name, &uuid).await {
        Ok(ratings) if ratings.is_empty() => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!(
                    "User {} does not have any user experience ratings for story {}",
                    uuid, story_name
                ),
            })),
        )
            .into_response(),
        Ok(ratings) => Json(json!({ "ratings": ratings })).into_response(),
        Err(e) => {
            error!("Failed to read user experience for {}: {}", story_name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": format!(
                        "There was an error retrieving user experience ratings for user {}, story {}",
                        uuid, story_name
                    ),
                })),
            )
                .into_response()
        }
    }
}
