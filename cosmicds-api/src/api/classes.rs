//! Classes, rosters and the class/story attachment

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tracing::error;

use super::parse_id;
use crate::body::JsonBody;
use crate::db::classes::{self, CreateClassOptions};
use crate::db::{educators, states, students};
use crate::error::ApiResult;
use crate::results::CreateClassResult;
use crate::schema::{decode, Field, FieldType, Schema, Validated};
use crate::AppState;

pub fn class_routes() -> Router<AppState> {
    Router::new()
        .route("/classes/join", post(join_class))
        .route("/classes/create", post(create_class))
        .route("/create-class", post(create_class))
        .route("/classes/size/:class_id", get(class_size))
        .route("/classes/expected-size/:class_id", get(class_expected_size))
        .route("/classes/roster/:class_id", get(class_roster))
        .route(
            "/classes/active/:class_id/:story_name",
            get(class_story_active).post(set_class_story_active),
        )
        .route("/classes/:identifier", get(get_class).delete(delete_class))
        .route("/educator-classes/:educator_id", get(educator_classes))
        .route("/student-classes/:student_id", get(student_classes))
        .route("/roster-info/:class_id", get(roster_info))
        .route("/roster-info/:class_id/:story_name", get(roster_info_for_story))
        .route(
            "/class-for-student-story/:student_id/:story_name",
            get(class_for_student_story),
        )
        .route("/dashboard-group-classes/:code", get(dashboard_group_classes))
        .route("/new-dummy-student", get(new_dummy_student).post(new_seeded_dummy_student))
}

impl Validated for CreateClassOptions {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("educator_id", FieldType::Integer),
            Field::required("name", FieldType::String),
            Field::required("expected_size", FieldType::Integer),
            Field::optional("asynchronous", FieldType::Boolean),
            Field::optional("story_name", FieldType::String),
        ],
    };
}

fn error_reply(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn no_such_class(class_id: i64) -> Response {
    error_reply(StatusCode::NOT_FOUND, format!("No class found with ID {}", class_id))
}

/// POST /classes/join
async fn join_class(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    let username = body.get("username").and_then(Value::as_str).unwrap_or_default();
    let class_code = body.get("class_code").and_then(Value::as_str).unwrap_or_default();

    let student = students::find_by_username(&state.db, username).await?;
    let class = classes::find_by_code(&state.db, class_code).await?;

    let (student, class) = match (student, class) {
        (Some(student), Some(class)) => (student, class),
        (student, class) => {
            let mut invalid = Vec::new();
            if student.is_none() {
                invalid.push("username");
            }
            if class.is_none() {
                invalid.push("class_code");
            }
            return Ok((
                StatusCode::NOT_FOUND,
                Json(json!({
                    "success": false,
                    "message": format!("The following were invalid: {}", invalid.join(", ")),
                })),
            )
                .into_response());
        }
    };

    let mut conn = state.db.acquire().await?;
    let created = students::add_to_class(&mut conn, student.id, class.id).await?;
    let message = if created {
        "Student added to class successfully"
    } else {
        "Student was already enrolled in class"
    };
    Ok(Json(json!({ "success": true, "message": message })).into_response())
}

/// POST /classes/create
async fn create_class(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    let (result, class) = match decode::<CreateClassOptions>(body) {
        Ok(options) => {
            let response = classes::create(&state.db, &state.stories, &options).await?;
            (response.result, response.class)
        }
        Err(_) => (CreateClassResult::BadRequest, None),
    };

    Ok((
        result.status_code(),
        Json(json!({
            "class_info": class,
            "status": result,
            "success": result.success(),
        })),
    )
        .into_response())
}

async fn get_class(State(state): State<AppState>, Path(identifier): Path<String>) -> ApiResult<Response> {
    let class = classes::find_by_identifier(&state.db, &identifier).await?;
    let status = if class.is_some() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    Ok((status, Json(json!({ "class": class }))).into_response())
}

async fn delete_class(State(state): State<AppState>, Path(identifier): Path<String>) -> ApiResult<Response> {
    let kind = if identifier.parse::<i64>().is_ok() { "ID" } else { "code" };
    let Some(class) = classes::find_by_identifier(&state.db, &identifier).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": format!("Could not find class with {} {}", kind, identifier),
            })),
        )
            .into_response());
    };

    match classes::delete(&state.db, class.id).await {
        Ok(_) => Ok(Json(json!({ "success": true, "message": "Class deleted" })).into_response()),
        Err(e) => {
            error!("Failed to delete class {}: {}", class.id, e);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": format!("Server error deleting class with {} {}", kind, identifier),
                })),
            )
                .into_response())
        }
    }
}

async fn class_size(State(state): State<AppState>, Path(class_id): Path<String>) -> ApiResult<Response> {
    let class_id = parse_id(&class_id);
    if classes::find_by_id(&state.db, class_id).await?.is_none() {
        return Ok(no_such_class(class_id));
    }
    let size = classes::size(&state.db, class_id).await?;
    Ok(Json(json!({ "class_id": class_id, "size": size })).into_response())
}

async fn class_expected_size(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> ApiResult<Response> {
    let class_id = parse_id(&class_id);
    match classes::find_by_id(&state.db, class_id).await? {
        Some(class) => Ok(Json(json!({
            "class_id": class_id,
            "expected_size": class.expected_size,
        }))
        .into_response()),
        None => Ok(no_such_class(class_id)),
    }
}

async fn class_roster(State(state): State<AppState>, Path(class_id): Path<String>) -> ApiResult<Response> {
    let class_id = parse_id(&class_id);
    if classes::find_by_id(&state.db, class_id).await?.is_none() {
        return Ok(no_such_class(class_id));
    }
    let students = classes::roster(&state.db, class_id).await?;
    Ok(Json(students).into_response())
}

/// Shared lookups of the active-status routes; the error is the reply to send
async fn class_story(state: &AppState, class_id: i64, story_name: &str) -> ApiResult<Result<(), Response>> {
    if classes::find_by_id(&state.db, class_id).await?.is_none() {
        return Ok(Err(no_such_class(class_id)));
    }
    if states::get_story(&state.db, story_name).await?.is_none() {
        return Ok(Err(error_reply(
            StatusCode::NOT_FOUND,
            format!("No story found with name {}", story_name),
        )));
    }
    Ok(Ok(()))
}

fn not_signed_up(class_id: i64, story_name: &str) -> Response {
    error_reply(
        StatusCode::NOT_FOUND,
        format!(
            "It seems that class {} is not signed up for story {}",
            class_id, story_name
        ),
    )
}

async fn class_story_active(
    State(state): State<AppState>,
    Path((class_id, story_name)): Path<(String, String)>,
) -> ApiResult<Response> {
    let class_id = parse_id(&class_id);
    if let Err(reply) = class_story(&state, class_id, &story_name).await? {
        return Ok(reply);
    }

    match classes::is_story_active(&state.db, class_id, &story_name).await? {
        Some(active) => Ok(Json(json!({ "active": active })).into_response()),
        None => Ok(not_signed_up(class_id, &story_name)),
    }
}

async fn set_class_story_active(
    State(state): State<AppState>,
    Path((class_id, story_name)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let class_id = parse_id(&class_id);
    if let Err(reply) = class_story(&state, class_id, &story_name).await? {
        return Ok(reply);
    }

    let Some(active) = body.get("active").and_then(Value::as_bool) else {
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            "Invalid request body; should have form { active: <boolean> }".to_string(),
        ));
    };

    match classes::set_story_active(&state.db, class_id, &story_name, active).await {
        Ok(true) => Ok(Json(json!({
            "class_id": class_id,
            "story_name": story_name,
            "active": active,
            "success": true,
        }))
        .into_response()),
        Ok(false) => Ok(not_signed_up(class_id, &story_name)),
        Err(e) => {
            error!("Failed to set active status for class {}: {}", class_id, e);
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "There was an error updating the active status for class ID {}, story {}",
                    class_id, story_name
                ),
            ))
        }
    }
}

async fn educator_classes(
    State(state): State<AppState>,
    Path(educator_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let educator_id = parse_id(&educator_id);
    let classes = educators::classes_for_educator(&state.db, educator_id).await?;
    Ok(Json(json!({ "educator_id": educator_id, "classes": classes })))
}

async fn student_classes(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let student_id = parse_id(&student_id);
    let classes = students::classes_for_student(&state.db, student_id).await?;
    Ok(Json(json!({ "student_id": student_id, "classes": classes })))
}

/// Story states of the class keyed by story display name
async fn roster_info(State(state): State<AppState>, Path(class_id): Path<String>) -> ApiResult<Json<Value>> {
    let info = classes::roster_info(&state.db, parse_id(&class_id)).await?;
    let mut keyed = Map::new();
    for (story, states) in info {
        keyed.insert(story, serde_json::to_value(states).unwrap_or_default());
    }
    Ok(Json(Value::Object(keyed)))
}

async fn roster_info_for_story(
    State(state): State<AppState>,
    Path((class_id, story_name)): Path<(String, String)>,
) -> ApiResult<Response> {
    let states = classes::roster_info_for_story(&state.db, parse_id(&class_id), &story_name).await?;
    Ok(Json(states).into_response())
}

async fn class_for_student_story(
    State(state): State<AppState>,
    Path((student_id, story_name)): Path<(String, String)>,
) -> ApiResult<Response> {
    let class = match student_id.parse::<i64>() {
        Ok(student_id) => classes::class_for_student_story(&state.db, student_id, &story_name).await?,
        Err(_) => None,
    };

    let (status, size) = match &class {
        Some(class) => (StatusCode::OK, classes::size(&state.db, class.id).await?),
        None => (StatusCode::NOT_FOUND, 0),
    };
    Ok((status, Json(json!({ "class": class, "size": size }))).into_response())
}

async fn dashboard_group_classes(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Response> {
    match classes::dashboard_group_classes(&state.db, &code).await? {
        Some(classes) => Ok(Json(json!({ "classes": classes })).into_response()),
        None => Ok(error_reply(
            StatusCode::NOT_FOUND,
            format!("Could not find a dashboard group for code {}", code),
        )),
    }
}

/// GET /new-dummy-student: an unseeded dummy student outside any class
async fn new_dummy_student(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let student = classes::new_dummy_student(&state.db, false, None, None).await?;
    Ok(Json(json!({ "student": student })))
}

async fn new_seeded_dummy_student(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<Value>> {
    let seed = body.get("seed").and_then(Value::as_bool).unwrap_or(false);
    let team_member = body.get("team_member").and_then(Value::as_str);
    let story_name = body.get("story_name").and_then(Value::as_str);
    let student = classes::new_dummy_student(&state.db, seed, team_member, story_name).await?;
    Ok(Json(json!({ "student": student })))
}
