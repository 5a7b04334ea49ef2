//! Hubble's law HTTP routes

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use cosmicds_common::db::Class;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::error;

use super::cohort::{self, AllDataFilter};
use super::db::{self as hubble_db, fits_name, GalaxyMark};
use super::merge;
use super::models::{
    GalaxyInfo, MeasurementValues, MinimalClassData, MinimalMeasurement, MinimalStudentData,
    MEASUREMENT_NUMBERS,
};
use super::STORY_NAME;
use crate::api::parse_id;
use crate::body::JsonBody;
use crate::db::{classes, students};
use crate::error::ApiResult;
use crate::results::{RemoveHubbleMeasurementResult, SubmitHubbleMeasurementResult};
use crate::schema::{decode, Field, FieldType, Schema, Validated};
use crate::AppState;

const SPECTRA_BASE_URL: &str = "https://cosmicds.s3.us-east-1.amazonaws.com/spectra";

/// Galaxy types handed to the data generation branch
const DATA_GENERATION_TYPES: [&str; 1] = ["Sp"];

const NO_CACHE: [(HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/submit-measurement", put(submit_measurement))
        .route("/sample-measurement", put(submit_sample_measurement))
        .route("/measurement/:student_id/:galaxy", delete(remove_measurement))
        .route(
            "/sample-measurement/:student_id/:measurement_number",
            delete(remove_sample_measurement),
        )
        .route("/measurements/:student_id", get(student_measurements))
        .route("/measurements/:student_id/:galaxy_id", get(student_measurement))
        .route("/sample-measurements", get(all_sample_measurements))
        .route("/sample-measurements/:key", get(sample_measurements))
        .route(
            "/sample-measurements/:key/:measurement_number",
            get(sample_measurement),
        )
        .route("/sample-galaxy", get(sample_galaxy))
        .route(
            "/class-measurements/size/:student_id/:class_id",
            get(class_measurement_count),
        )
        .route(
            "/class-measurements/students-completed/:student_id/:class_id",
            get(students_completed),
        )
        .route("/class-measurements/:student_id/:class_id", get(class_measurements))
        .route("/stage-3-data/:student_id/:class_id", get(class_measurements))
        .route("/class-measurements/:student_id", get(student_class_measurements))
        .route("/stage-3-measurements/:student_id", get(student_class_measurements))
        .route("/merged-classes/:class_id", get(merged_classes))
        .route("/merge-class", put(merge_class))
        .route("/all-data", get(all_data))
        .route("/galaxies", get(galaxies))
        .route("/mark-galaxy-bad", put(mark_galaxy_bad))
        .route("/mark-spectrum-bad", post(mark_spectrum_bad))
        .route("/mark-tileload-bad", post(mark_tileload_bad))
        .route("/spectra/:galaxy_type/:name", get(spectrum_redirect))
        .route(
            "/waiting-room-override",
            put(set_waiting_room_override).delete(remove_waiting_room_override),
        )
        .route("/unchecked-galaxies", get(unchecked_galaxies))
        .route("/set-spectrum-status", post(set_spectrum_status))
        .route("/new-galaxies", get(new_galaxies))
        .route("/data-generation-galaxies", get(data_generation_galaxies))
}

fn query_flag(params: &HashMap<String, String>, name: &str) -> bool {
    params
        .get(name)
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

fn query_int(params: &HashMap<String, String>, name: &str) -> Option<i64> {
    params.get(name).and_then(|value| value.parse().ok())
}

// ================================================================================
// Measurements
// ================================================================================

#[derive(Debug, Deserialize)]
struct MeasurementSubmission {
    student_id: i64,
    galaxy_id: Option<i64>,
    galaxy_name: Option<String>,
    measurement_number: Option<String>,
    #[serde(flatten)]
    values: MeasurementValues,
}

impl Validated for MeasurementSubmission {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("student_id", FieldType::Integer),
            Field::optional("galaxy_id", FieldType::Integer),
            Field::optional("galaxy_name", FieldType::String),
            Field::optional("measurement_number", FieldType::Enum(&MEASUREMENT_NUMBERS)),
            Field::optional("rest_wave_value", FieldType::Number),
            Field::optional("rest_wave_unit", FieldType::String),
            Field::optional("obs_wave_value", FieldType::Number),
            Field::optional("obs_wave_unit", FieldType::String),
            Field::optional("velocity_value", FieldType::Number),
            Field::optional("velocity_unit", FieldType::String),
            Field::optional("ang_size_value", FieldType::Number),
            Field::optional("ang_size_unit", FieldType::String),
            Field::optional("est_dist_value", FieldType::Number),
            Field::optional("est_dist_unit", FieldType::String),
            Field::optional("brightness", FieldType::Number),
        ],
    };
}

fn submission_response(
    measurement: Value,
    result: SubmitHubbleMeasurementResult,
) -> Response {
    (
        result.status_code(),
        Json(json!({
            "measurement": measurement,
            "status": result,
            "success": result.success(),
        })),
    )
        .into_response()
}

/// Decode a submission and resolve its galaxy. An unknown galaxy name
/// resolves to 0. The echoed measurement carries the resolved ID.
async fn prepare_submission(
    state: &AppState,
    body: Value,
) -> ApiResult<Result<(MeasurementSubmission, i64, Map<String, Value>), Value>> {
    let submission = match decode::<MeasurementSubmission>(body.clone()) {
        Ok(submission) => submission,
        Err(_) => return Ok(Err(body)),
    };

    let galaxy_id = match (submission.galaxy_id, submission.galaxy_name.as_deref()) {
        (Some(id), _) => id,
        (None, Some(name)) => hubble_db::galaxy_by_name(&state.db, &fits_name(name))
            .await?
            .map_or(0, |galaxy| galaxy.info.id),
        (None, None) => return Ok(Err(body)),
    };

    let mut echo = body.as_object().cloned().unwrap_or_default();
    echo.remove("galaxy_name");
    echo.insert("galaxy_id".into(), json!(galaxy_id));
    Ok(Ok((submission, galaxy_id, echo)))
}

async fn submit_measurement(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    let (submission, galaxy_id, echo) = match prepare_submission(&state, body).await? {
        Ok(prepared) => prepared,
        Err(body) => return Ok(submission_response(body, SubmitHubbleMeasurementResult::BadRequest)),
    };

    let result =
        hubble_db::submit_measurement(&state.db, submission.student_id, galaxy_id, &submission.values)
            .await?;
    Ok(submission_response(Value::Object(echo), result))
}

async fn submit_sample_measurement(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let (submission, galaxy_id, mut echo) = match prepare_submission(&state, body).await? {
        Ok(prepared) => prepared,
        Err(body) => return Ok(submission_response(body, SubmitHubbleMeasurementResult::BadRequest)),
    };

    let measurement_number = submission
        .measurement_number
        .as_deref()
        .unwrap_or(MEASUREMENT_NUMBERS[0]);
    echo.insert("measurement_number".into(), json!(measurement_number));

    let result = hubble_db::submit_sample_measurement(
        &state.db,
        submission.student_id,
        galaxy_id,
        measurement_number,
        &submission.values,
    )
    .await?;
    Ok(submission_response(Value::Object(echo), result))
}

async fn remove_measurement(
    State(state): State<AppState>,
    Path((student_id, galaxy)): Path<(String, String)>,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    let galaxy_id = match galaxy.parse::<i64>() {
        Ok(id) => id,
        Err(_) => hubble_db::galaxy_by_name(&state.db, &galaxy)
            .await?
            .map_or(0, |galaxy| galaxy.info.id),
    };

    let result = if student_id != 0 && galaxy_id != 0 {
        hubble_db::remove_measurement(&state.db, student_id, galaxy_id).await?
    } else {
        RemoveHubbleMeasurementResult::BadRequest
    };

    Ok((
        result.status_code(),
        Json(json!({
            "student_id": student_id,
            "galaxy_id": galaxy_id,
            "status": result,
            "success": result.success(),
        })),
    )
        .into_response())
}

async fn remove_sample_measurement(
    State(state): State<AppState>,
    Path((student_id, measurement_number)): Path<(String, String)>,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    let valid = student_id != 0 && MEASUREMENT_NUMBERS.contains(&measurement_number.as_str());

    let result = if valid {
        hubble_db::remove_sample_measurement(&state.db, student_id, &measurement_number).await?
    } else {
        RemoveHubbleMeasurementResult::BadRequest
    };

    Ok((
        result.status_code(),
        Json(json!({
            "student_id": student_id,
            "status": result,
            "success": result.success(),
        })),
    )
        .into_response())
}

async fn student_measurements(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    if students::find_by_id(&state.db, student_id).await?.is_none() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "student_id": student_id, "measurements": null })),
        )
            .into_response());
    }

    let measurements = hubble_db::student_measurements(&state.db, student_id).await?;
    Ok(Json(json!({ "student_id": student_id, "measurements": measurements })).into_response())
}

async fn student_measurement(
    State(state): State<AppState>,
    Path((student_id, galaxy_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    let galaxy_id = parse_id(&galaxy_id);
    let measurement = hubble_db::measurement(&state.db, student_id, galaxy_id).await?;
    let status = if measurement.is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };

    Ok((
        status,
        Json(json!({
            "student_id": student_id,
            "galaxy_id": galaxy_id,
            "measurement": measurement,
        })),
    )
        .into_response())
}

/// `filter_null` (default true) drops incomplete measurements
async fn all_sample_measurements(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let complete_only = params
        .get("filter_null")
        .map_or(true, |value| !value.eq_ignore_ascii_case("false"));
    let measurements = hubble_db::all_sample_measurements(&state.db, complete_only).await?;
    Ok(Json(measurements).into_response())
}

/// `first`/`second` lists that measurement for every student; anything
/// else is a student ID
async fn sample_measurements(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Response> {
    if MEASUREMENT_NUMBERS.contains(&key.as_str()) {
        let measurements = hubble_db::nth_sample_measurements(&state.db, &key).await?;
        return Ok(Json(measurements).into_response());
    }

    let Ok(student_id) = key.parse::<i64>() else {
        return Ok((StatusCode::BAD_REQUEST, Json(Value::Null)).into_response());
    };
    let measurements = hubble_db::sample_measurements(&state.db, student_id).await?;
    Ok(Json(json!({ "student_id": student_id, "measurements": measurements })).into_response())
}

async fn sample_measurement(
    State(state): State<AppState>,
    Path((student_id, measurement_number)): Path<(String, String)>,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    let measurement =
        hubble_db::sample_measurement(&state.db, student_id, &measurement_number).await?;
    let status = if measurement.is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((
        status,
        Json(json!({ "student_id": student_id, "measurement": measurement })),
    )
        .into_response())
}

async fn sample_galaxy(State(state): State<AppState>) -> ApiResult<Response> {
    let galaxy = hubble_db::sample_galaxy(&state.db).await?;
    Ok(Json(galaxy).into_response())
}

// ================================================================================
// Class measurements
// ================================================================================

/// Look up the student and class of a class-measurement request, or build
/// the 404 naming whichever is missing
async fn student_and_class(
    state: &AppState,
    student_id: i64,
    class_id: i64,
) -> ApiResult<Result<Class, Response>> {
    let student = students::find_by_id(&state.db, student_id).await?;
    let class = classes::find_by_id(&state.db, class_id).await?;

    let mut invalid = Vec::new();
    if student.is_none() {
        invalid.push("student");
    }
    match class {
        Some(class) if invalid.is_empty() => Ok(Ok(class)),
        class => {
            if class.is_none() {
                invalid.push("class");
            }
            let plural = if invalid.len() == 2 { "s" } else { "" };
            let message = format!("Invalid {} ID{}", invalid.join(" and "), plural);
            Ok(Err((
                StatusCode::NOT_FOUND,
                NO_CACHE,
                Json(json!({ "message": message })),
            )
                .into_response()))
        }
    }
}

async fn class_measurement_count(
    State(state): State<AppState>,
    Path((student_id, class_id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let (student_id, class_id) = (parse_id(&student_id), parse_id(&class_id));
    let class = match student_and_class(&state, student_id, class_id).await? {
        Ok(class) => class,
        Err(response) => return Ok(response),
    };

    let complete_only = query_flag(&params, "complete_only");
    let count =
        cohort::class_measurement_count(&state.db, student_id, Some(&class), complete_only).await?;
    Ok((
        NO_CACHE,
        Json(json!({
            "student_id": student_id,
            "class_id": class_id,
            "measurement_count": count,
        })),
    )
        .into_response())
}

async fn students_completed(
    State(state): State<AppState>,
    Path((student_id, class_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let (student_id, class_id) = (parse_id(&student_id), parse_id(&class_id));
    let class = match student_and_class(&state, student_id, class_id).await? {
        Ok(class) => class,
        Err(response) => return Ok(response),
    };

    let count = cohort::students_completed_count(&state.db, student_id, Some(&class)).await?;
    Ok((
        NO_CACHE,
        Json(json!({
            "student_id": student_id,
            "class_id": class_id,
            "students_completed_measurements": count,
        })),
    )
        .into_response())
}

async fn class_measurements(
    State(state): State<AppState>,
    Path((student_id, class_id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let (student_id, class_id) = (parse_id(&student_id), parse_id(&class_id));
    let class = match student_and_class(&state, student_id, class_id).await? {
        Ok(class) => class,
        Err(response) => return Ok(response),
    };

    let last_checked = query_int(&params, "last_checked");
    let complete_only = query_flag(&params, "complete_only");
    let measurements =
        cohort::class_measurements(&state.db, student_id, Some(&class), last_checked, complete_only)
            .await?;
    Ok((
        NO_CACHE,
        Json(json!({
            "student_id": student_id,
            "class_id": class_id,
            "measurements": measurements,
        })),
    )
        .into_response())
}

/// Class measurements for the class the student takes this story in
async fn student_class_measurements(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Response> {
    let student_id = parse_id(&student_id);
    if students::find_by_id(&state.db, student_id).await?.is_none() {
        return Ok((
            StatusCode::NOT_FOUND,
            NO_CACHE,
            Json(json!({ "message": "Invalid student ID" })),
        )
            .into_response());
    }

    let Some(class) = classes::class_for_student_story(&state.db, student_id, STORY_NAME).await? else {
        let message = format!(
            "Student {} is not in a class signed up for the Hubble's Law story",
            student_id
        );
        return Ok((StatusCode::NOT_FOUND, NO_CACHE, Json(json!({ "message": message }))).into_response());
    };

    let measurements =
        cohort::class_measurements(&state.db, student_id, Some(&class), None, false).await?;
    Ok((
        NO_CACHE,
        Json(json!({
            "student_id": student_id,
            "class_id": null,
            "measurements": measurements,
        })),
    )
        .into_response())
}

// ================================================================================
// Merge groups and all-data
// ================================================================================

async fn merged_classes(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let class_id = parse_id(&class_id);
    if classes::find_by_id(&state.db, class_id).await?.is_none() {
        let message = format!("No class found with ID {}", class_id);
        return Ok((StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response());
    }

    let ignore_merge_order = query_flag(&params, "ignore_merge_order");
    let mut conn = state.db.acquire().await?;
    let ids = merge::merged_ids_for_class(&mut conn, class_id, ignore_merge_order).await?;
    Ok(Json(json!({ "merged_class_ids": ids })).into_response())
}

#[derive(Debug, Deserialize)]
struct ClassReference {
    class_id: i64,
}

impl Validated for ClassReference {
    const SCHEMA: Schema = Schema {
        fields: &[Field::required("class_id", FieldType::Integer)],
    };
}

async fn merge_class(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    let class_id = match decode::<ClassReference>(body.clone()) {
        Ok(reference) => reference.class_id,
        Err(_) => {
            let given = body.get("class_id").map_or("undefined".to_string(), Value::to_string);
            let message = format!("Expected class ID to be an integer, got {}", given);
            return Ok((StatusCode::BAD_REQUEST, Json(json!({ "message": message }))).into_response());
        }
    };

    if classes::find_by_id(&state.db, class_id).await?.is_none() {
        let message = format!("No class found with ID {}", class_id);
        return Ok((StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response());
    }

    let mut conn = state.db.acquire().await?;
    match merge::add_class_to_merge_group(&mut conn, class_id).await {
        Ok(group_id) => Ok(Json(json!({ "class_id": class_id, "group_id": group_id })).into_response()),
        Err(e) => {
            error!("Failed to add class {} to a merge group: {}", class_id, e);
            let message = format!(
                "There was an error while adding class {} to a merge group",
                class_id
            );
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": message }))).into_response())
        }
    }
}

/// `before` is epoch milliseconds; `minimal` trims every row to the
/// fields the analysis notebooks use
async fn all_data(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let minimal = query_flag(&params, "minimal");
    let filter = AllDataFilter {
        before: query_int(&params, "before").and_then(DateTime::<Utc>::from_timestamp_millis),
        class_id: query_int(&params, "class_id"),
    };

    let (measurements, student_data, class_data) = tokio::try_join!(
        cohort::all_measurements(&state.db, filter),
        cohort::all_student_data(&state.db, filter),
        cohort::all_class_data(&state.db, filter),
    )?;

    let body = if minimal {
        json!({
            "measurements": measurements.into_iter().map(MinimalMeasurement::from).collect::<Vec<_>>(),
            "studentData": student_data.into_iter().map(MinimalStudentData::from).collect::<Vec<_>>(),
            "classData": class_data.into_iter().map(MinimalClassData::from).collect::<Vec<_>>(),
        })
    } else {
        json!({
            "measurements": measurements,
            "studentData": student_data,
            "classData": class_data,
        })
    };
    Ok(Json(body).into_response())
}

// ================================================================================
// Galaxies
// ================================================================================

/// `types` is a comma-separated list; `flags=true` includes the quality
/// counters
async fn galaxies(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let types: Option<Vec<String>> = params
        .get("types")
        .map(|types| types.split(',').map(str::to_string).collect());
    let galaxies = hubble_db::galaxies(&state.db, types.as_deref()).await?;

    if query_flag(&params, "flags") {
        Ok(Json(galaxies).into_response())
    } else {
        let info: Vec<GalaxyInfo> = galaxies.into_iter().map(|galaxy| galaxy.info).collect();
        Ok(Json(info).into_response())
    }
}

/// Shared body of the three reporting endpoints
async fn report_galaxy(state: &AppState, body: &Value, mark: GalaxyMark, failure: &str) -> ApiResult<Response> {
    let galaxy_id = body.get("galaxy_id").and_then(Value::as_i64);
    let galaxy_name = body.get("galaxy_name").and_then(Value::as_str);

    let galaxy = match (galaxy_id, galaxy_name) {
        (Some(id), _) => hubble_db::galaxy_by_id(&state.db, id).await?,
        (None, Some(name)) => hubble_db::galaxy_by_name(&state.db, name).await?,
        (None, None) => {
            return Ok((StatusCode::BAD_REQUEST, Json(json!({ "status": "missing_id_or_name" })))
                .into_response())
        }
    };
    let Some(galaxy) = galaxy else {
        return Ok((StatusCode::BAD_REQUEST, Json(json!({ "status": "no_such_galaxy" }))).into_response());
    };

    match hubble_db::mark_galaxy(&state.db, galaxy.info.id, mark).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => {
            error!("Failed to mark galaxy {} ({:?}): {}", galaxy.info.id, mark, e);
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": failure }))).into_response())
        }
    }
}

async fn mark_galaxy_bad(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    report_galaxy(&state, &body, GalaxyMark::Bad, "Error marking galaxy as bad").await
}

async fn mark_spectrum_bad(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    report_galaxy(&state, &body, GalaxyMark::SpectrumBad, "Error marking spectrum as bad").await
}

async fn mark_tileload_bad(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    report_galaxy(&state, &body, GalaxyMark::TileloadBad, "Error marking tileload as bad").await
}

async fn spectrum_redirect(Path((galaxy_type, name)): Path<(String, String)>) -> Response {
    let location = format!("{}/{}/{}", SPECTRA_BASE_URL, galaxy_type, name);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn unchecked_galaxies(State(state): State<AppState>) -> ApiResult<Response> {
    let galaxies = hubble_db::unchecked_spectra_galaxies(&state.db).await?;
    Ok(Json(galaxies).into_response())
}

async fn set_spectrum_status(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    let Some(name) = body.get("galaxy_name").and_then(Value::as_str) else {
        return Ok((StatusCode::BAD_REQUEST, Json(json!({ "status": "missing_id_or_name" }))).into_response());
    };
    let name = fits_name(name);

    let Some(galaxy) = hubble_db::galaxy_by_name(&state.db, &name).await? else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "no_such_galaxy", "galaxy": name })),
        )
            .into_response());
    };
    let Some(good) = body.get("good").and_then(Value::as_bool) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "invalid_status", "galaxy": name })),
        )
            .into_response());
    };

    if let Err(e) = hubble_db::set_spectrum_status(&state.db, galaxy.info.id, good).await {
        error!("Failed to set spectrum status of {}: {}", name, e);
        let message = format!(
            "Error setting galaxy spectrum status for {} to {}good",
            name,
            if good { "" } else { "not " }
        );
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response());
    }

    Ok(Json(json!({
        "status": "status_updated",
        "marked_good": good,
        "marked_bad": !good,
        "galaxy": name,
    }))
    .into_response())
}

async fn new_galaxies(State(state): State<AppState>) -> ApiResult<Response> {
    let galaxies = hubble_db::new_galaxies(&state.db).await?;
    Ok(Json(galaxies).into_response())
}

async fn data_generation_galaxies(State(state): State<AppState>) -> ApiResult<Response> {
    let galaxies = hubble_db::galaxies_for_data_generation(&state.db, &DATA_GENERATION_TYPES).await?;
    Ok(Json(galaxies).into_response())
}

// ================================================================================
// Waiting room
// ================================================================================

const WAITING_ROOM_FORMAT_ERROR: &str =
    "Invalid format. Request body should have the form { class_id: <integer> }";

async fn set_waiting_room_override(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Response {
    let Ok(ClassReference { class_id }) = decode::<ClassReference>(body) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": WAITING_ROOM_FORMAT_ERROR }))).into_response();
    };

    match hubble_db::set_waiting_room_override(&state.db, class_id).await {
        Ok(true) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "class_id": class_id,
                "message": format!("Successfully set waiting room override for class {}", class_id),
            })),
        )
            .into_response(),
        Ok(false) => Json(json!({
            "success": true,
            "class_id": class_id,
            "message": format!("The waiting room override for class {} was already set", class_id),
        }))
        .into_response(),
        Err(e) if e.is_foreign_key_violation() => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "class_id": class_id,
                "error": format!("No class found with ID {}", class_id),
            })),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to set waiting room override for class {}: {}", class_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "class_id": class_id,
                    "error": format!(
                        "An error occurred while setting the waiting room override for class {}",
                        class_id
                    ),
                })),
            )
                .into_response()
        }
    }
}

async fn remove_waiting_room_override(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Response {
    let Ok(ClassReference { class_id }) = decode::<ClassReference>(body) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": WAITING_ROOM_FORMAT_ERROR }))).into_response();
    };

    match hubble_db::remove_waiting_room_override(&state.db, class_id).await {
        Ok(_) => Json(json!({
            "success": true,
            "class_id": class_id,
            "message": format!(
                "The waiting room override for class {} was removed, if one existed.",
                class_id
            ),
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to remove waiting room override for class {}: {}", class_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "class_id": class_id,
                    "error": format!(
                        "An error occurred while removing the waiting room override for class {}",
                        class_id
                    ),
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_flag_is_case_insensitive() {
        let params = HashMap::from([("minimal".to_string(), "True".to_string())]);
        assert!(query_flag(&params, "minimal"));
        assert!(!query_flag(&params, "flags"));
    }

    #[test]
    fn test_submission_requires_student_id() {
        let body = json!({ "galaxy_id": 3 });
        assert!(decode::<MeasurementSubmission>(body).is_err());

        let body = json!({ "student_id": 1, "galaxy_name": "J1", "measurement_number": "third" });
        assert!(decode::<MeasurementSubmission>(body).is_err());

        let body = json!({ "student_id": 1, "galaxy_id": 3, "velocity_value": 7200.5 });
        let submission = decode::<MeasurementSubmission>(body).unwrap();
        assert_eq!(submission.values.velocity_value, Some(7200.5));
        assert_eq!(submission.values.est_dist_value, None);
    }
}
