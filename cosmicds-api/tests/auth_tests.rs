//! API key and origin gate tests

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use helpers::*;

// =============================================================================
// Key checks
// =============================================================================

#[tokio::test]
async fn test_missing_key_is_unauthorized() {
    let (app, _db) = setup_app().await;

    let (status, body) = send(&app, request_with_key("GET", "/students", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "You must provide a valid CosmicDS API key!");
}

#[tokio::test]
async fn test_unknown_key_is_unauthorized() {
    let (app, _db) = setup_app().await;

    let (status, _) = send(&app, request_with_key("GET", "/students", None, Some("not-a-key"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_restricted_key_outside_its_root_is_forbidden() {
    let (app, _db) = setup_app().await;

    let (status, body) = send(&app, request_with_key("GET", "/students", None, Some(HUBBLE_KEY))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "Your API key does not provide permission to access this endpoint!"
    );
}

#[tokio::test]
async fn test_restricted_key_inside_its_root_passes() {
    let (app, _db) = setup_app().await;

    let (status, body) = send(
        &app,
        request_with_key("GET", "/hubbles_law/galaxies", None, Some(HUBBLE_KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_array());
}

#[tokio::test]
async fn test_allowed_origin_needs_no_key() {
    let (app, _db) = setup_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/students")
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_other_origin_still_needs_key() {
    let (app, _db) = setup_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/students")
        .header(header::ORIGIN, "https://elsewhere.test")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn test_welcome_mentions_missing_key() {
    let (app, _db) = setup_app().await;

    let (status, body) = send(&app, request_with_key("GET", "/", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Welcome to the CosmicDS server!"));
    assert!(message.len() > "Welcome to the CosmicDS server!".len());

    let (status, body) = send(&app, request("GET", "/", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to the CosmicDS server!");
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _db) = setup_app().await;

    let (status, body) = send(&app, request_with_key("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "cosmicds-api");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_permission_reports_key_root() {
    let (app, _db) = setup_app().await;

    let (_, body) = send(&app, request_with_key("GET", "/permission", None, Some(HUBBLE_KEY))).await;
    assert_eq!(body["valid_key"], true);
    assert_eq!(body["permissions_root"], "/hubbles_law");

    let (_, body) = send(&app, request_with_key("GET", "/permission", None, None)).await;
    assert_eq!(body["valid_key"], false);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _db) = setup_app().await;

    let (status, body) = send(&app, request("GET", "/nope", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found: /nope");
}
