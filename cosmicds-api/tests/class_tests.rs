//! Class creation, enrolment and class-story tests

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use serde_json::{json, Value};

fn class_body(name: &str, expected_size: i64, story_name: Option<&str>) -> Value {
    let mut body = json!({
        "educator_id": 7,
        "name": name,
        "expected_size": expected_size,
    });
    if let Some(story_name) = story_name {
        body["story_name"] = json!(story_name);
    }
    body
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn test_create_class() {
    let (app, _db) = setup_app().await;

    let (status, reply) = send(&app, request("POST", "/classes/create", Some(class_body("Astro 101", 30, None)))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["status"], "ok");
    assert_eq!(reply["class_info"]["name"], "Astro 101");
    assert!(reply["class_info"]["code"].as_str().is_some_and(|code| !code.is_empty()));

    let (status, reply) = send(&app, request("POST", "/create-class", Some(class_body("Astro 101", 30, None)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["status"], "already_exists");
    assert_eq!(reply["success"], false);
}

#[tokio::test]
async fn test_create_class_rejects_bad_body() {
    let (app, _db) = setup_app().await;

    let body = json!({ "educator_id": "seven", "name": "Astro 101", "expected_size": 30 });
    let (status, reply) = send(&app, request("POST", "/classes/create", Some(body))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["status"], "bad_request");
}

#[tokio::test]
async fn test_small_hubble_class_joins_merge_group() {
    let (app, db) = setup_app().await;

    let (status, reply) = send(
        &app,
        request("POST", "/classes/create", Some(class_body("Small", 10, Some("hubbles_law")))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let class_id = reply["class_info"]["id"].as_i64().unwrap();

    let group: Option<i64> = sqlx::query_scalar("SELECT group_id FROM hubble_class_merge_groups WHERE class_id = ?")
        .bind(class_id)
        .fetch_optional(&db)
        .await
        .unwrap();
    assert_eq!(group, Some(1));
}

#[tokio::test]
async fn test_large_hubble_class_is_not_merged() {
    let (app, db) = setup_app().await;

    let (_, reply) = send(
        &app,
        request("POST", "/classes/create", Some(class_body("Large", 40, Some("hubbles_law")))),
    )
    .await;
    let class_id = reply["class_info"]["id"].as_i64().unwrap();

    let merged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hubble_class_merge_groups WHERE class_id = ?")
        .bind(class_id)
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(merged, 0);
}

// =============================================================================
// Enrolment
// =============================================================================

#[tokio::test]
async fn test_join_class() {
    let (app, db) = setup_app().await;
    let student_id = insert_student(&db, "ada").await;
    let class_id = insert_class(&db, "astro", false, 30).await;
    let join = json!({ "username": "ada", "class_code": "code-astro" });

    let (status, reply) = send(&app, request("POST", "/classes/join", Some(join.clone()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["message"], "Student added to class successfully");

    let (status, reply) = send(&app, request("POST", "/classes/join", Some(join))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["message"], "Student was already enrolled in class");

    let (_, reply) = send(&app, request("GET", &format!("/classes/size/{}", class_id), None)).await;
    assert_eq!(reply["size"], 1);

    let (status, reply) = send(&app, request("GET", &format!("/classes/roster/{}", class_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply[0]["id"], student_id);
}

#[tokio::test]
async fn test_join_class_names_invalid_fields() {
    let (app, _db) = setup_app().await;

    let join = json!({ "username": "nobody", "class_code": "nothing" });
    let (status, reply) = send(&app, request("POST", "/classes/join", Some(join))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(reply["message"], "The following were invalid: username, class_code");
}

#[tokio::test]
async fn test_remove_student_from_class() {
    let (app, db) = setup_app().await;
    let student_id = insert_student(&db, "ada").await;
    let class_id = insert_class(&db, "astro", false, 30).await;
    enroll(&db, student_id, class_id).await;
    let uri = format!("/students/{}/classes/{}", student_id, class_id);

    let (status, _) = send(&app, request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, reply) = send(&app, request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(reply["success"], false);
}

#[tokio::test]
async fn test_unknown_class_size() {
    let (app, _db) = setup_app().await;

    let (status, reply) = send(&app, request("GET", "/classes/size/999", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(reply["error"], "No class found with ID 999");
}

#[tokio::test]
async fn test_delete_class() {
    let (app, db) = setup_app().await;
    let class_id = insert_class(&db, "astro", false, 30).await;

    let (status, reply) = send(&app, request("DELETE", "/classes/code-astro", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["success"], true);

    let (status, _) = send(&app, request("GET", &format!("/classes/{}", class_id), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, reply) = send(&app, request("DELETE", "/classes/12345", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(reply["error"], "Could not find class with ID 12345");
}

// =============================================================================
// Class stories
// =============================================================================

#[tokio::test]
async fn test_class_story_active_status() {
    let (app, _db) = setup_app().await;

    let (_, reply) = send(
        &app,
        request("POST", "/classes/create", Some(class_body("Astro", 30, Some("hubbles_law")))),
    )
    .await;
    let class_id = reply["class_info"]["id"].as_i64().unwrap();
    let uri = format!("/classes/active/{}/hubbles_law", class_id);

    let (status, reply) = send(&app, request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["active"], true);

    let (status, reply) = send(&app, request("POST", &uri, Some(json!({ "active": false })))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["success"], true);

    let (_, reply) = send(&app, request("GET", &uri, None)).await;
    assert_eq!(reply["active"], false);

    let (status, _) = send(&app, request("POST", &uri, Some(json!({ "active": "yes" })))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_class_story_active_for_unsigned_story() {
    let (app, db) = setup_app().await;
    let class_id = insert_class(&db, "astro", false, 30).await;

    let uri = format!("/classes/active/{}/hubbles_law", class_id);
    let (status, reply) = send(&app, request("GET", &uri, None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        reply["error"],
        format!("It seems that class {} is not signed up for story hubbles_law", class_id)
    );
}
