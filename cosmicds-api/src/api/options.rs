//! Per-student presentation options

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::parse_id;
use crate::body::JsonBody;
use crate::db::options::{self, StudentOption};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn option_routes() -> Router<AppState> {
    Router::new().route("/options/:student_id", get(get_options).put(set_option))
}

async fn get_options(State(state): State<AppState>, Path(student_id): Path<String>) -> ApiResult<Response> {
    let options = options::get(&state.db, parse_id(&student_id)).await?;
    let status = if options.is_some() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    Ok((status, Json(options)).into_response())
}

/// PUT /options/:student_id with `{ option, value }`
async fn set_option(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let name = body.get("option").and_then(Value::as_str).unwrap_or_default();
    let Some(option) = StudentOption::parse(name) else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("{} is not a valid option", name) })),
        )
            .into_response());
    };

    let value = body.get("value").cloned().unwrap_or(Value::Null);
    match options::set(&state.db, parse_id(&student_id), option, &value).await {
        Ok(Some(options)) => Ok(Json(options).into_response()),
        Ok(None) => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Invalid student ID" })),
        )
            .into_response()),
        Err(cosmicds_common::Error::InvalidInput(message)) => Err(ApiError::BadRequest(message)),
        Err(e) => Err(e.into()),
    }
}
