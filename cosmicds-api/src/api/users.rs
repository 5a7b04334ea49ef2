//! Student and educator accounts: sign-up, login, verification and lookups

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use cosmicds_common::auth::hash_password;
use cosmicds_common::db::{Educator, Student};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::parse_id;
use crate::body::JsonBody;
use crate::db::classes;
use crate::db::educators::{self, SignUpEducator};
use crate::db::students::{self, SignUpStudent};
use crate::error::ApiResult;
use crate::results::{LoginResult, SignUpResult, VerificationResult};
use crate::schema::{decode, Field, FieldType, Schema, Validated};
use crate::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/educators/create", post(educator_sign_up))
        .route("/educator-sign-up", post(educator_sign_up))
        .route("/students/create", post(student_sign_up))
        .route("/student-sign-up", post(student_sign_up))
        .route("/login", put(login))
        .route("/student-login", put(student_login))
        .route("/educator-login", put(educator_login))
        .route("/verify-student/:code", post(verify_student))
        .route("/verify-educator/:code", post(verify_educator))
        .route("/validate-classroom-code/:code", get(validate_classroom_code))
        .route("/students", get(list_students))
        .route("/educators", get(list_educators))
        .route("/users", get(list_users))
        .route("/students/:identifier", get(get_student))
        .route("/student/:identifier", get(get_student))
        .route("/students/:identifier/classes", get(student_classes))
        .route(
            "/students/:identifier/classes/:class_id",
            delete(remove_student_from_class),
        )
        .route("/educators/:identifier", get(get_educator))
}

// ================================================================================
// Sign-up
// ================================================================================

impl Validated for SignUpEducator {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("first_name", FieldType::String),
            Field::required("last_name", FieldType::String),
            Field::required("password", FieldType::String),
            Field::required("email", FieldType::String),
            Field::required("username", FieldType::String),
            Field::optional("institution", FieldType::String),
            Field::optional("age", FieldType::Number),
            Field::optional("gender", FieldType::String),
        ],
    };
}

impl Validated for SignUpStudent {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field::required("username", FieldType::String),
            Field::required("password", FieldType::String),
            Field::optional("email", FieldType::String),
            Field::optional("age", FieldType::Number),
            Field::optional("gender", FieldType::String),
            Field::optional("institution", FieldType::String),
            Field::optional("classroom_code", FieldType::String),
        ],
    };
}

async fn educator_sign_up(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    let result = match decode::<SignUpEducator>(body.clone()) {
        Ok(options) => {
            let result = educators::sign_up(&state.db, &options).await?;
            if result.success() {
                info!(
                    "Educator account created: {} {} <{}>",
                    options.first_name, options.last_name, options.email
                );
            }
            result
        }
        Err(_) => SignUpResult::BadRequest,
    };

    Ok((
        result.status_code(),
        Json(json!({
            "educator_info": body,
            "status": result,
            "success": result.success(),
        })),
    )
        .into_response())
}

async fn student_sign_up(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    let result = match decode::<SignUpStudent>(body.clone()) {
        Ok(options) => students::sign_up(&state.db, &options).await?,
        Err(_) => SignUpResult::BadRequest,
    };

    Ok((
        result.status_code(),
        Json(json!({
            "student_info": body,
            "status": result,
            "success": result.success(),
        })),
    )
        .into_response())
}

// ================================================================================
// Login
// ================================================================================

/// What a login check needs from an account row
trait Account: Serialize {
    const KIND: &'static str;

    fn id(&self) -> i64;
    fn password(&self) -> &str;
    fn verified(&self) -> bool;
}

impl Account for Student {
    const KIND: &'static str = "student";

    fn id(&self) -> i64 {
        self.id
    }

    fn password(&self) -> &str {
        &self.password
    }

    fn verified(&self) -> bool {
        self.verified == 1
    }
}

impl Account for Educator {
    const KIND: &'static str = "educator";

    fn id(&self) -> i64 {
        self.id
    }

    fn password(&self) -> &str {
        &self.password
    }

    fn verified(&self) -> bool {
        self.verified == 1
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(rename = "type")]
    pub user_type: &'static str,
    pub result: LoginResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    pub id: i64,
    pub success: bool,
}

impl LoginResponse {
    fn bad_request() -> Self {
        LoginResponse {
            user_type: "none",
            result: LoginResult::BadRequest,
            user: None,
            id: 0,
            success: false,
        }
    }

    fn status_code(&self) -> StatusCode {
        if self.success {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        }
    }
}

const USERNAME_LOGIN: Schema = Schema {
    fields: &[
        Field::required("username", FieldType::String),
        Field::required("password", FieldType::String),
    ],
};

const EMAIL_LOGIN: Schema = Schema {
    fields: &[
        Field::required("email", FieldType::String),
        Field::required("password", FieldType::String),
    ],
};

/// Pull `(identifier, password)` out of a login body
fn credentials<'a>(schema: &Schema, body: &'a Value) -> Option<(&'a str, &'a str)> {
    let fields = schema.validate(body).ok()?;
    let identifier = fields.get(schema.fields[0].name)?.as_str()?;
    let password = fields.get("password")?.as_str()?;
    Some((identifier, password))
}

/// Compare a presented password against an account. A failure to record
/// the visit does not fail the login.
async fn check_login<T, F>(account: Option<T>, password: &str, record_visit: F) -> LoginResponse
where
    T: Account,
    F: std::future::Future<Output = cosmicds_common::Result<()>>,
{
    let Some(account) = account else {
        return LoginResponse {
            user_type: "none",
            result: LoginResult::EmailNotExist,
            user: None,
            id: 0,
            success: false,
        };
    };

    let result = if account.password() != hash_password(password) {
        LoginResult::IncorrectPassword
    } else if !account.verified() {
        LoginResult::NotVerified
    } else {
        if let Err(e) = record_visit.await {
            warn!("Failed to record visit for {} {}: {}", T::KIND, account.id(), e);
        }
        LoginResult::Ok
    };

    LoginResponse {
        user_type: T::KIND,
        result,
        id: account.id(),
        user: serde_json::to_value(&account).ok(),
        success: result.success(),
    }
}

async fn student_login_response(state: &AppState, username: &str, password: &str) -> ApiResult<LoginResponse> {
    let student = students::find_by_username(&state.db, username).await?;
    let id = student.as_ref().map_or(0, |s| s.id);
    Ok(check_login(student, password, students::record_visit(&state.db, id)).await)
}

async fn educator_login_response(
    state: &AppState,
    educator: Option<Educator>,
    password: &str,
) -> LoginResponse {
    let id = educator.as_ref().map_or(0, |e| e.id);
    check_login(educator, password, educators::record_visit(&state.db, id)).await
}

fn login_reply(response: LoginResponse) -> Response {
    (response.status_code(), Json(response)).into_response()
}

/// PUT /login
///
/// Tries the username as a student first, then as an educator.
async fn login(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    let Some((username, password)) = credentials(&USERNAME_LOGIN, &body) else {
        return Ok(login_reply(LoginResponse::bad_request()));
    };

    let mut response = student_login_response(&state, username, password).await?;
    if !response.success {
        let educator = educators::find_by_username(&state.db, username).await?;
        response = educator_login_response(&state, educator, password).await;
    }
    Ok(login_reply(response))
}

async fn student_login(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    let response = match credentials(&USERNAME_LOGIN, &body) {
        Some((username, password)) => student_login_response(&state, username, password).await?,
        None => LoginResponse::bad_request(),
    };
    Ok(login_reply(response))
}

async fn educator_login(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Response> {
    let response = match credentials(&EMAIL_LOGIN, &body) {
        Some((email, password)) => {
            let educator = educators::find_by_email(&state.db, email).await?;
            educator_login_response(&state, educator, password).await
        }
        None => LoginResponse::bad_request(),
    };
    Ok(login_reply(response))
}

// ================================================================================
// Verification
// ================================================================================

fn verification_reply(code: String, result: VerificationResult) -> Response {
    (
        result.status_code(),
        Json(json!({
            "code": code,
            "status": { "code": code, "status": result },
        })),
    )
        .into_response()
}

/// Storage failures are reported in the verification shape, not as a bare 500
fn verification_outcome(result: cosmicds_common::Result<VerificationResult>) -> VerificationResult {
    result.unwrap_or_else(|e| {
        error!("Verification failed: {}", e);
        VerificationResult::Error
    })
}

async fn verify_student(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    let result = verification_outcome(students::verify(&state.db, &code).await);
    verification_reply(code, result)
}

async fn verify_educator(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    let result = verification_outcome(educators::verify(&state.db, &code).await);
    verification_reply(code, result)
}

async fn validate_classroom_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Response> {
    let valid = classes::find_by_code(&state.db, &code).await?.is_some();
    let status = if valid { StatusCode::OK } else { StatusCode::NOT_FOUND };
    Ok((status, Json(json!({ "code": code, "valid": valid }))).into_response())
}

// ================================================================================
// Lookups
// ================================================================================

async fn list_students(State(state): State<AppState>) -> ApiResult<Json<Vec<Student>>> {
    Ok(Json(students::list(&state.db).await?))
}

async fn list_educators(State(state): State<AppState>) -> ApiResult<Json<Vec<Educator>>> {
    Ok(Json(educators::list(&state.db).await?))
}

async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let (students, educators) =
        tokio::try_join!(students::list(&state.db), educators::list(&state.db))?;
    Ok(Json(json!({ "students": students, "educators": educators })))
}

async fn get_student(State(state): State<AppState>, Path(identifier): Path<String>) -> ApiResult<Response> {
    let student = students::find_by_identifier(&state.db, &identifier).await?;
    let status = if student.is_some() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    Ok((status, Json(json!({ "student": student }))).into_response())
}

async fn get_educator(State(state): State<AppState>, Path(identifier): Path<String>) -> ApiResult<Response> {
    let educator = educators::find_by_identifier(&state.db, &identifier).await?;
    let status = if educator.is_some() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    Ok((status, Json(json!({ "educator": educator }))).into_response())
}

async fn student_classes(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Response> {
    let Some(student) = students::find_by_identifier(&state.db, &identifier).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "student_id": null, "classes": [] })),
        )
            .into_response());
    };

    let classes = students::classes_for_student(&state.db, student.id).await?;
    Ok(Json(json!({ "student_id": student.id, "classes": classes })).into_response())
}

fn removal_failure(message: String) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": message })),
    )
        .into_response()
}

async fn remove_student_from_class(
    State(state): State<AppState>,
    Path((identifier, class_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let Some(student) = students::find_by_identifier(&state.db, &identifier).await? else {
        return Ok(removal_failure(format!(
            "No student found for identifier {}",
            identifier
        )));
    };

    let class_id = parse_id(&class_id);
    if classes::find_by_id(&state.db, class_id).await?.is_none() {
        return Ok(removal_failure(format!("No class found with ID {}", class_id)));
    }

    if students::remove_from_class(&state.db, student.id, class_id).await? {
        info!("Removed student {} from class {}", student.id, class_id);
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(removal_failure(format!(
            "Student with identifier {} not found in class {}",
            identifier, class_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_use_schema_identifier() {
        let body = json!({ "email": "a@b.edu", "password": "pw" });
        assert_eq!(credentials(&EMAIL_LOGIN, &body), Some(("a@b.edu", "pw")));
        assert_eq!(credentials(&USERNAME_LOGIN, &body), None);
        assert_eq!(credentials(&USERNAME_LOGIN, &json!({ "username": 5, "password": "pw" })), None);
    }

    #[test]
    fn test_bad_request_login_is_unauthorized() {
        let response = LoginResponse::bad_request();
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["type"], "none");
        assert_eq!(value["result"], "bad_request");
        assert!(value.get("user").is_none());
    }
}
