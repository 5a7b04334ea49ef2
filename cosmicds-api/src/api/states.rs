//! Story and stage state endpoints

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::parse_id;
use crate::body::JsonBody;
use crate::db::states::{self, StageStateOwner};
use crate::db::{classes, students};
use crate::error::ApiResult;
use crate::AppState;

pub fn state_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/story-state/:student_id/:story_name",
            get(get_story_state).put(put_story_state).patch(patch_story_state),
        )
        .route("/stages/:story_name", get(get_stages))
        .route("/stage-states/:story_name", get(get_stage_states))
        .route(
            "/stage-state/:student_id/:story_name/:stage_name",
            get(get_stage_state).put(put_stage_state).delete(delete_stage_state),
        )
}

fn story_state_reply(student_id: i64, story_name: String, state: Option<Value>) -> Response {
    let status = if state.is_some() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (
        status,
        Json(json!({
            "student_id": student_id,
            "story_name": story_name,
            "state": state,
        })),
    )
        .into_response()
}

async fn get_story_state(
    State(state): State<AppState>,
    Path((student_id, story_name)): Path<(String, String)>,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    let stored = states::get_story_state(&state.db, student_id, &story_name).await?;
    Ok(story_state_reply(student_id, story_name, stored))
}

async fn put_story_state(
    State(state): State<AppState>,
    Path((student_id, story_name)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    let stored = states::update_story_state(&state.db, student_id, &story_name, &body).await?;
    Ok(story_state_reply(student_id, story_name, stored))
}

/// PATCH merges the body into the stored state instead of replacing it
async fn patch_story_state(
    State(state): State<AppState>,
    Path((student_id, story_name)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    let stored = states::patch_story_state(&state.db, student_id, &story_name, &body).await?;
    Ok(story_state_reply(student_id, story_name, stored))
}

fn no_such_story(story_name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("No story found with name {}", story_name) })),
    )
        .into_response()
}

async fn get_stages(State(state): State<AppState>, Path(story_name): Path<String>) -> ApiResult<Response> {
    if states::get_story(&state.db, &story_name).await?.is_none() {
        return Ok(no_such_story(&story_name));
    }
    let stages = states::get_stages(&state.db, &story_name).await?;
    Ok(Json(json!({ "stages": stages })).into_response())
}

/// GET /stage-states/:story_name?student_id|class_id&stage_name
///
/// A student ID wins over a class ID. Without `stage_name` the states come
/// back grouped by stage; with it, as that stage's array.
async fn get_stage_states(
    State(state): State<AppState>,
    Path(story_name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    if states::get_story(&state.db, &story_name).await?.is_none() {
        return Ok(no_such_story(&story_name));
    }

    let student_id = params.get("student_id").and_then(|v| v.parse::<i64>().ok());
    let class_id = params.get("class_id").and_then(|v| v.parse::<i64>().ok());

    let owner = match (student_id, class_id) {
        (Some(id), _) => {
            if students::find_by_id(&state.db, id).await?.is_none() {
                return Ok((
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": format!("No student found with ID {}", id) })),
                )
                    .into_response());
            }
            StageStateOwner::Student(id)
        }
        (None, Some(id)) => {
            if classes::find_by_id(&state.db, id).await?.is_none() {
                return Ok((
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": format!("No class found with ID {}", id) })),
                )
                    .into_response());
            }
            StageStateOwner::Class(id)
        }
        (None, None) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Must specify either a student or a class ID" })),
            )
                .into_response());
        }
    };

    let stage_name = params.get("stage_name").map(String::as_str);
    let mut grouped = states::get_stage_states(&state.db, &story_name, stage_name, owner).await?;
    match stage_name {
        Some(stage) => Ok(Json(grouped.remove(stage)).into_response()),
        None => Ok(Json(grouped).into_response()),
    }
}

fn stage_state_reply(
    student_id: i64,
    story_name: String,
    stage_name: String,
    state: Option<Value>,
) -> Response {
    let status = if state.is_some() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (
        status,
        Json(json!({
            "student_id": student_id,
            "story_name": story_name,
            "stage_name": stage_name,
            "state": state,
        })),
    )
        .into_response()
}

async fn get_stage_state(
    State(state): State<AppState>,
    Path((student_id, story_name, stage_name)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    let stored = states::get_stage_state(&state.db, student_id, &story_name, &stage_name).await?;
    Ok(stage_state_reply(student_id, story_name, stage_name, stored))
}

async fn put_stage_state(
    State(state): State<AppState>,
    Path((student_id, story_name, stage_name)): Path<(String, String, String)>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    let stored =
        states::update_stage_state(&state.db, student_id, &story_name, &stage_name, &body).await?;
    Ok(stage_state_reply(student_id, story_name, stage_name, stored))
}

async fn delete_stage_state(
    State(state): State<AppState>,
    Path((student_id, story_name, stage_name)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    if states::get_stage_state(&state.db, student_id, &story_name, &stage_name)
        .await?
        .is_none()
    {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No such (student, story, stage) combination found" })),
        )
            .into_response());
    }

    let success = states::delete_stage_state(&state.db, student_id, &story_name, &stage_name).await?;
    Ok(Json(json!({ "success": success })).into_response())
}
