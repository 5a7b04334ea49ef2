//! Sign-up, verification and login flow tests

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use serde_json::json;
use sqlx::SqlitePool;

async fn student_code(db: &SqlitePool, username: &str) -> String {
    sqlx::query_scalar("SELECT verification_code FROM students WHERE username = ?")
        .bind(username)
        .fetch_one(db)
        .await
        .unwrap()
}

// =============================================================================
// Students
// =============================================================================

#[tokio::test]
async fn test_student_sign_up() {
    let (app, _db) = setup_app().await;
    let body = json!({ "username": "ada", "password": "pw", "email": "ada@school.test" });

    let (status, reply) = send(&app, request("POST", "/students/create", Some(body.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["status"], "ok");
    assert_eq!(reply["success"], true);
    assert_eq!(reply["student_info"]["username"], "ada");

    let (status, reply) = send(&app, request("POST", "/student-sign-up", Some(body))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(reply["status"], "email_already_exists");
    assert_eq!(reply["success"], false);
}

#[tokio::test]
async fn test_student_sign_up_rejects_bad_body() {
    let (app, _db) = setup_app().await;

    let (status, reply) = send(
        &app,
        request("POST", "/students/create", Some(json!({ "username": "ada" }))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["status"], "bad_request");
}

#[tokio::test]
async fn test_student_sign_up_with_classroom_code_enrols() {
    let (app, db) = setup_app().await;
    let class_id = insert_class(&db, "astro", false, 30).await;

    let body = json!({ "username": "ada", "password": "pw", "classroom_code": "code-astro" });
    let (status, _) = send(&app, request("POST", "/students/create", Some(body))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, reply) = send(&app, request("GET", &format!("/classes/size/{}", class_id), None)).await;
    assert_eq!(reply["size"], 1);
}

#[tokio::test]
async fn test_student_login_requires_verification() {
    let (app, db) = setup_app().await;
    let body = json!({ "username": "ada", "password": "pw" });
    send(&app, request("POST", "/students/create", Some(body.clone()))).await;

    let (status, reply) = send(&app, request("PUT", "/student-login", Some(body.clone()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply["result"], "not_verified");

    let code = student_code(&db, "ada").await;
    let (status, reply) = send(&app, request("POST", &format!("/verify-student/{}", code), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["status"]["status"], "ok");

    let (status, reply) = send(&app, request("POST", &format!("/verify-student/{}", code), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(reply["status"]["status"], "already_verified");

    let (status, reply) = send(&app, request("PUT", "/student-login", Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["result"], "ok");
    assert_eq!(reply["type"], "student");
    assert!(reply["user"].get("password").is_none());

    let visits: i64 = sqlx::query_scalar("SELECT visits FROM students WHERE username = ?")
        .bind("ada")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(visits, 1);
}

#[tokio::test]
async fn test_login_failures() {
    let (app, db) = setup_app().await;
    insert_student(&db, "grace").await;

    let wrong = json!({ "username": "grace", "password": "nope" });
    let (status, reply) = send(&app, request("PUT", "/student-login", Some(wrong))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply["result"], "incorrect_password");

    let missing = json!({ "username": "nobody", "password": "password" });
    let (status, reply) = send(&app, request("PUT", "/login", Some(missing))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply["result"], "email_not_exist");

    let (status, reply) = send(&app, request("PUT", "/login", Some(json!({ "username": "grace" })))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply["result"], "bad_request");
}

#[tokio::test]
async fn test_verify_unknown_code() {
    let (app, _db) = setup_app().await;

    let (status, reply) = send(&app, request("POST", "/verify-student/does-not-exist", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply["status"]["status"], "invalid_code");
}

// =============================================================================
// Educators
// =============================================================================

#[tokio::test]
async fn test_educator_sign_up_and_login() {
    let (app, db) = setup_app().await;
    let body = json!({
        "first_name": "Henrietta",
        "last_name": "Leavitt",
        "username": "hleavitt",
        "email": "hl@school.test",
        "password": "cepheid",
    });

    let (status, reply) = send(&app, request("POST", "/educators/create", Some(body))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["educator_info"]["email"], "hl@school.test");

    let code: String = sqlx::query_scalar("SELECT verification_code FROM educators WHERE username = ?")
        .bind("hleavitt")
        .fetch_one(&db)
        .await
        .unwrap();
    let (status, _) = send(&app, request("POST", &format!("/verify-educator/{}", code), None)).await;
    assert_eq!(status, StatusCode::OK);

    let login = json!({ "email": "hl@school.test", "password": "cepheid" });
    let (status, reply) = send(&app, request("PUT", "/educator-login", Some(login))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["type"], "educator");

    // /login falls back to educators when no student has the username
    let login = json!({ "username": "hleavitt", "password": "cepheid" });
    let (status, reply) = send(&app, request("PUT", "/login", Some(login))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["type"], "educator");
}

// =============================================================================
// Lookups
// =============================================================================

#[tokio::test]
async fn test_student_lookup_by_id_and_username() {
    let (app, db) = setup_app().await;
    let id = insert_student(&db, "grace").await;

    let (status, reply) = send(&app, request("GET", &format!("/students/{}", id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["student"]["username"], "grace");

    let (status, reply) = send(&app, request("GET", "/student/grace", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["student"]["id"], id);

    let (status, _) = send(&app, request("GET", "/students/nobody", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validate_classroom_code() {
    let (app, db) = setup_app().await;
    insert_class(&db, "astro", false, 30).await;

    let (status, reply) = send(&app, request("GET", "/validate-classroom-code/code-astro", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["valid"], true);

    let (status, reply) = send(&app, request("GET", "/validate-classroom-code/bogus", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(reply["valid"], false);
}
