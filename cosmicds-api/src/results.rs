//! Wire-visible request outcomes
//!
//! Each outcome serializes as a lowercase snake_case string and knows its
//! HTTP status and whether it counts as success.

use axum::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateClassResult {
    BadRequest,
    Ok,
    AlreadyExists,
    Error,
}

impl CreateClassResult {
    pub fn status_code(self) -> StatusCode {
        match self {
            CreateClassResult::BadRequest => StatusCode::BAD_REQUEST,
            CreateClassResult::Ok => StatusCode::CREATED,
            _ => StatusCode::OK,
        }
    }

    pub fn success(self) -> bool {
        self == CreateClassResult::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginResult {
    BadRequest,
    Ok,
    EmailNotExist,
    NotVerified,
    IncorrectPassword,
}

impl LoginResult {
    pub fn success(self) -> bool {
        self == LoginResult::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignUpResult {
    BadRequest,
    Ok,
    #[serde(rename = "email_already_exists")]
    EmailExists,
    Error,
}

impl SignUpResult {
    pub fn status_code(self) -> StatusCode {
        match self {
            SignUpResult::Ok => StatusCode::CREATED,
            SignUpResult::EmailExists => StatusCode::CONFLICT,
            SignUpResult::BadRequest | SignUpResult::Error => StatusCode::BAD_REQUEST,
        }
    }

    pub fn success(self) -> bool {
        self == SignUpResult::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationResult {
    BadRequest,
    Ok,
    AlreadyVerified,
    InvalidCode,
    #[serde(rename = "internal_server_error")]
    Error,
}

impl VerificationResult {
    pub fn status_code(self) -> StatusCode {
        match self {
            VerificationResult::Ok => StatusCode::OK,
            VerificationResult::BadRequest => StatusCode::BAD_REQUEST,
            VerificationResult::InvalidCode => StatusCode::UNAUTHORIZED,
            VerificationResult::AlreadyVerified => StatusCode::CONFLICT,
            VerificationResult::Error => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn success(self) -> bool {
        self == VerificationResult::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitHubbleMeasurementResult {
    BadRequest,
    MeasurementCreated,
    MeasurementUpdated,
    NoSuchStudent,
    NoSuchGalaxy,
}

impl SubmitHubbleMeasurementResult {
    pub fn status_code(self) -> StatusCode {
        match self {
            SubmitHubbleMeasurementResult::BadRequest => StatusCode::BAD_REQUEST,
            SubmitHubbleMeasurementResult::MeasurementCreated
            | SubmitHubbleMeasurementResult::MeasurementUpdated => StatusCode::OK,
            SubmitHubbleMeasurementResult::NoSuchStudent
            | SubmitHubbleMeasurementResult::NoSuchGalaxy => StatusCode::NOT_FOUND,
        }
    }

    pub fn success(self) -> bool {
        matches!(
            self,
            SubmitHubbleMeasurementResult::MeasurementCreated
                | SubmitHubbleMeasurementResult::MeasurementUpdated
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveHubbleMeasurementResult {
    BadRequest,
    MeasurementDeleted,
    NoSuchMeasurement,
}

impl RemoveHubbleMeasurementResult {
    pub fn status_code(self) -> StatusCode {
        match self {
            RemoveHubbleMeasurementResult::BadRequest => StatusCode::BAD_REQUEST,
            RemoveHubbleMeasurementResult::MeasurementDeleted => StatusCode::OK,
            RemoveHubbleMeasurementResult::NoSuchMeasurement => StatusCode::NOT_FOUND,
        }
    }

    pub fn success(self) -> bool {
        self == RemoveHubbleMeasurementResult::MeasurementDeleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_names() {
        assert_eq!(json!(CreateClassResult::AlreadyExists), json!("already_exists"));
        assert_eq!(json!(LoginResult::EmailNotExist), json!("email_not_exist"));
        assert_eq!(json!(SignUpResult::EmailExists), json!("email_already_exists"));
        assert_eq!(json!(VerificationResult::Error), json!("internal_server_error"));
        assert_eq!(json!(VerificationResult::InvalidCode), json!("invalid_code"));
        assert_eq!(
            json!(SubmitHubbleMeasurementResult::MeasurementCreated),
            json!("measurement_created")
        );
        assert_eq!(
            json!(RemoveHubbleMeasurementResult::NoSuchMeasurement),
            json!("no_such_measurement")
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(SignUpResult::Ok.status_code(), StatusCode::CREATED);
        assert_eq!(SignUpResult::EmailExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(SignUpResult::Error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(CreateClassResult::AlreadyExists.status_code(), StatusCode::OK);
        assert_eq!(VerificationResult::AlreadyVerified.status_code(), StatusCode::CONFLICT);
        assert!(!CreateClassResult::Error.success());
        assert!(SubmitHubbleMeasurementResult::MeasurementUpdated.success());
        assert_eq!(
            SubmitHubbleMeasurementResult::NoSuchGalaxy.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RemoveHubbleMeasurementResult::MeasurementDeleted.status_code(),
            StatusCode::OK
        );
    }
}
