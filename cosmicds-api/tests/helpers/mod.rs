//! Shared fixtures for cosmicds-api integration tests
//!
//! Every test gets its own in-memory database behind a single pooled
//! connection (each SQLite memory connection is a separate database).

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use cosmicds_api::stories::default_registry;
use cosmicds_api::{build_router, AppState};
use cosmicds_common::auth::hash_password;
use cosmicds_common::db::create_schema;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tower::ServiceExt;

/// Unrestricted key registered in every test database
pub const TEST_KEY: &str = "test-api-key";

/// Key limited to the Hubble's law routes
pub const HUBBLE_KEY: &str = "hubble-only-key";

pub const ALLOWED_ORIGIN: &str = "https://cosmicds.test";

pub async fn setup_db() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid sqlite url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("in-memory pool");

    create_schema(&pool).await.expect("core schema");
    pool
}

/// Router over a fresh database with every story set up
pub async fn setup_app() -> (Router, SqlitePool) {
    let db = setup_db().await;
    let stories = default_registry().expect("registry");
    stories.setup_all(&db).await.expect("story setup");

    cosmicds_api::db::api_keys::insert(&db, TEST_KEY, "tests", None)
        .await
        .expect("test key");
    cosmicds_api::db::api_keys::insert(&db, HUBBLE_KEY, "hubble tests", Some("/hubbles_law"))
        .await
        .expect("hubble key");

    let state = AppState::new(db.clone(), vec![ALLOWED_ORIGIN.to_string()], stories);
    (build_router(state), db)
}

/// Request carrying [`TEST_KEY`]
pub fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    request_with_key(method, uri, body, Some(TEST_KEY))
}

pub fn request_with_key(method: &str, uri: &str, body: Option<Value>, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, key);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request; empty bodies come back as `Value::Null`
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON response body")
    };
    (status, body)
}

pub async fn insert_student(db: &SqlitePool, username: &str) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO students (username, email, password, verified, verification_code, profile_created)
        VALUES (?, ?, ?, 1, ?, ?)
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(format!("{}@school.test", username))
    .bind(hash_password("password"))
    .bind(format!("code-{}", username))
    .bind(Utc::now())
    .fetch_one(db)
    .await
    .unwrap()
}

pub async fn insert_class(db: &SqlitePool, name: &str, asynchronous: bool, expected_size: i64) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO classes (name, educator_id, code, created, asynchronous, expected_size)
        VALUES (?, 1, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(format!("code-{}", name))
    .bind(Utc::now())
    .bind(asynchronous)
    .bind(expected_size)
    .fetch_one(db)
    .await
    .unwrap()
}

pub async fn enroll(db: &SqlitePool, student_id: i64, class_id: i64) {
    sqlx::query("INSERT INTO students_classes (student_id, class_id, joined) VALUES (?, ?, ?)")
        .bind(student_id)
        .bind(class_id)
        .bind(Utc::now())
        .execute(db)
        .await
        .unwrap();
}

pub async fn insert_galaxy(db: &SqlitePool, name: &str) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO galaxies (name, ra, decl, z, type, element)
        VALUES (?, 10.5, -3.25, 0.02, 'Sp', 'H-alpha')
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(db)
    .await
    .unwrap()
}
