//! Question catalogue endpoints

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::body::JsonBody;
use crate::db::questions::{self, QuestionInfo};
use crate::error::ApiResult;
use crate::schema::{decode, Field, FieldType, Schema, Validated, INTEGER_ARRAY, STRING_ARRAY};
use crate::AppState;

pub fn question_routes() -> Router<AppState> {
    Router::new()
        .route("/question/:tag", get(get_question).post(add_question))
        .route("/questions/:story_name", get(story_questions))
}

impl Validated for QuestionInfo {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("tag", FieldType::String),
            Field::required("text", FieldType::String),
            Field::required("shorthand", FieldType::String),
            Field::required("story_name", FieldType::String),
            Field::optional("answers_text", STRING_ARRAY),
            Field::optional("correct_answers", INTEGER_ARRAY),
            Field::optional("neutral_answers", INTEGER_ARRAY),
        ],
    };
}

async fn get_question(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let version = params.get("version").and_then(|v| v.parse::<i64>().ok());
    match questions::find(&state.db, &tag, version).await? {
        Some(question) => Ok(Json(json!({ "question": question })).into_response()),
        None => {
            let specified = if version.is_some() { "tag/version combination" } else { "tag" };
            Ok((
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": format!("Could not find question with specified {}", specified),
                })),
            )
                .into_response())
        }
    }
}

/// POST /question/:tag
///
/// Stores a new version of the question, one past the newest stored.
async fn add_question(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let mut body = match body {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    body.insert("tag".to_string(), Value::String(tag.clone()));

    let Ok(mut info) = decode::<QuestionInfo>(Value::Object(body)) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "One of your fields is missing or of the incorrect type" })),
        )
            .into_response());
    };

    let current = questions::current_version(&state.db, &tag).await?;
    info.version = Some(current.map_or(1, |version| version + 1));

    let question = questions::add(&state.db, &info).await?;
    Ok(Json(json!({ "question": question })).into_response())
}

async fn story_questions(
    State(state): State<AppState>,
    Path(story_name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let newest_only = params
        .get("newest_only")
        .map_or(true, |value| !value.eq_ignore_ascii_case("false"));
    let questions = questions::for_story(&state.db, &story_name, newest_only).await?;
    Ok(Json(json!({ "questions": questions })))
}
