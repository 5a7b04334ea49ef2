//! Story registry, shared story routes and accumulating analytics tests

mod helpers;

use axum::http::StatusCode;
use cosmicds_api::stories::default_registry;
use helpers::*;
use serde_json::json;

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_default_registry_names() {
    let registry = default_registry().unwrap();
    let names = registry.names();

    assert!(names.contains(&"hubbles_law"));
    assert!(names.contains(&"tempo-lite"));
    assert!(registry.get("hubbles_law").is_some());
    assert!(registry.get("no_such_story").is_none());
}

#[tokio::test]
async fn test_setup_registers_stories() {
    let (app, _db) = setup_app().await;

    let (status, reply) = send(&app, request("GET", "/stages/hubbles_law", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply["stages"].is_array());
}

// =============================================================================
// User experience
// =============================================================================

#[tokio::test]
async fn test_user_experience_per_story() {
    let (app, _db) = setup_app().await;
    let rating = json!({ "uuid": "u-1", "question": "fun", "rating": "good" });

    let (status, reply) = send(&app, request("PUT", "/hubbles_law/user-experience", Some(rating))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["success"], true);

    let (status, reply) = send(&app, request("GET", "/hubbles_law/user-experience/u-1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["ratings"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, request("GET", "/tempo-lite/user-experience/u-1", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let bad = json!({ "uuid": "u-1", "question": "fun", "rating": "amazing" });
    let (status, _) = send(&app, request("PUT", "/hubbles_law/user-experience", Some(bad))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// TEMPO Lite accumulation
// =============================================================================

#[tokio::test]
async fn test_tempo_lite_accumulates() {
    let (app, _db) = setup_app().await;

    let entry = json!({
        "user_uuid": "abc",
        "user_selected_timezones": ["US/Eastern"],
        "whats_new_opened_count": 1,
    });
    let (status, reply) = send(&app, request("PUT", "/tempo-lite/data", Some(entry))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"]["user_selected_timezones_count"], 1);

    let update = json!({
        "user_selected_timezones": ["US/Pacific", "US/Central"],
        "delta_whats_new_opened_count": 2,
        "delta_credits_open_time_ms": 1500,
    });
    let (status, reply) = send(&app, request("PATCH", "/tempo-lite/data/abc", Some(update))).await;
    assert_eq!(status, StatusCode::OK);
    let row = &reply["response"];
    assert_eq!(
        row["user_selected_timezones"],
        json!(["US/Eastern", "US/Pacific", "US/Central"])
    );
    assert_eq!(row["user_selected_timezones_count"], 3);
    assert_eq!(row["whats_new_opened_count"], 3);
    assert_eq!(row["credits_open_time_ms"], 1500);

    let (status, reply) = send(&app, request("GET", "/tempo-lite/data/abc", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"]["whats_new_opened_count"], 3);
}

#[tokio::test]
async fn test_tempo_lite_empty_update_changes_nothing() {
    let (app, _db) = setup_app().await;
    let entry = json!({ "user_uuid": "abc", "share_button_clicked_count": 4 });
    let (_, created) = send(&app, request("PUT", "/tempo-lite/data", Some(entry))).await;

    let update = json!({ "delta_share_button_clicked_count": 0, "user_selected_locations": [] });
    let (status, reply) = send(&app, request("PATCH", "/tempo-lite/data/abc", Some(update))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"]["share_button_clicked_count"], 4);
    assert_eq!(reply["response"]["user_selected_locations_count"], 0);
    assert_eq!(reply["response"]["last_updated"], created["response"]["last_updated"]);
}

#[tokio::test]
async fn test_tempo_lite_successive_updates_add_up() {
    let (app, _db) = setup_app().await;
    let entry = json!({
        "user_uuid": "abc",
        "user_selected_locations": ["Boston"],
        "about_data_open_time_ms": 100,
    });
    send(&app, request("PUT", "/tempo-lite/data", Some(entry))).await;

    let first = json!({ "user_selected_locations": ["Denver", "Austin"], "delta_about_data_open_time_ms": 250 });
    send(&app, request("PATCH", "/tempo-lite/data/abc", Some(first))).await;
    let second = json!({ "user_selected_locations": ["Reno"], "delta_about_data_open_time_ms": 50 });
    let (status, reply) = send(&app, request("PATCH", "/tempo-lite/data/abc", Some(second))).await;

    assert_eq!(status, StatusCode::OK);
    let row = &reply["response"];
    assert_eq!(row["user_selected_locations"], json!(["Boston", "Denver", "Austin", "Reno"]));
    assert_eq!(row["user_selected_locations_count"], 4);
    assert_eq!(row["about_data_open_time_ms"], 400);
}

#[tokio::test]
async fn test_update_appends_to_loosely_formatted_array() {
    let (app, db) = setup_app().await;
    send(&app, request("PUT", "/tempo-lite/data", Some(json!({ "user_uuid": "abc" })))).await;
    sqlx::query("UPDATE tempo_lite_data SET user_selected_timezones = '[ \"US/Eastern\" ]  ' WHERE user_uuid = 'abc'")
        .execute(&db)
        .await
        .unwrap();

    let update = json!({ "user_selected_timezones": ["US/Pacific"] });
    let (status, reply) = send(&app, request("PATCH", "/tempo-lite/data/abc", Some(update))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"]["user_selected_timezones"], json!(["US/Eastern", "US/Pacific"]));
    assert_eq!(reply["response"]["user_selected_timezones_count"], 2);
}

#[tokio::test]
async fn test_tempo_lite_errors() {
    let (app, _db) = setup_app().await;

    let (status, reply) = send(&app, request("GET", "/tempo-lite/data/missing", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(reply["error"], "Specified user data does not exist");

    let (status, _) = send(&app, request("PATCH", "/tempo-lite/data/missing", Some(json!({ "delta_share_button_clicked_count": 1 })))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, request("PUT", "/tempo-lite/data", Some(json!({ "whats_new_opened_count": 1 })))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Other accumulating stories
// =============================================================================

#[tokio::test]
async fn test_planet_parade_video_flags_are_sticky() {
    let (app, _db) = setup_app().await;
    let entry = json!({
        "user_uuid": "pp",
        "user_selected_search_locations": [[40.5, -75.25]],
        "user_selected_map_locations": [],
        "video_opened": true,
    });
    let (status, reply) = send(&app, request("PUT", "/planet-parade/data", Some(entry))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"]["video_opened"], true);
    assert_eq!(reply["response"]["video_played"], false);

    let update = json!({ "video_opened": false, "video_played": true, "delta_video_time_ms": 1200 });
    let (_, reply) = send(&app, request("PATCH", "/planet-parade/data/pp", Some(update))).await;
    assert_eq!(reply["response"]["video_opened"], true);
    assert_eq!(reply["response"]["video_played"], true);
    assert_eq!(reply["response"]["video_time_ms"], 1200);

    let update = json!({ "video_played": false, "user_selected_map_locations": [[10.5, 20.5]] });
    let (_, reply) = send(&app, request("PATCH", "/planet-parade/data/pp", Some(update))).await;
    let row = &reply["response"];
    assert_eq!(row["video_opened"], true);
    assert_eq!(row["video_played"], true);
    assert_eq!(row["user_selected_map_locations"], json!([[10.5, 20.5]]));
    assert_eq!(row["user_selected_map_locations_count"], 1);
    assert_eq!(row["user_selected_search_locations_count"], 1);
}

#[tokio::test]
async fn test_seasons_appends_dates_and_replaces_response() {
    let (app, _db) = setup_app().await;
    let entry = json!({ "user_uuid": "s1", "user_selected_dates": [1, 2], "response": "summer" });
    let (status, reply) = send(&app, request("PUT", "/seasons/data", Some(entry))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"]["user_selected_dates_count"], 2);

    let update = json!({ "user_selected_dates": [3], "response": "winter" });
    let (status, reply) = send(&app, request("PATCH", "/seasons/data/s1", Some(update))).await;
    assert_eq!(status, StatusCode::OK);
    let row = &reply["response"];
    assert_eq!(row["user_selected_dates"], json!([1, 2, 3]));
    assert_eq!(row["user_selected_dates_count"], 3);
    assert_eq!(row["response"], "winter");

    let (status, reply) = send(&app, request("GET", "/seasons/data/s1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"]["user_selected_locations_count"], 0);
}

#[tokio::test]
async fn test_solar_eclipse_accumulates_locations_and_time() {
    let (app, _db) = setup_app().await;
    let entry = json!({
        "user_uuid": "se",
        "selected_locations": [[30.5, -97.75]],
        "cloud_cover_selected_locations": [],
        "app_time_ms": 1000,
    });
    let (status, _) = send(&app, request("PUT", "/solar-eclipse-2024/data", Some(entry))).await;
    assert_eq!(status, StatusCode::OK);

    let update = json!({
        "cloud_cover_selected_locations": [[44.5, -68.25]],
        "delta_app_time_ms": 500,
        "delta_info_time_ms": 250,
    });
    let (status, reply) = send(&app, request("PATCH", "/solar-eclipse-2024/data/se", Some(update))).await;
    assert_eq!(status, StatusCode::OK);
    let row = &reply["response"];
    assert_eq!(row["cloud_cover_selected_locations"], json!([[44.5, -68.25]]));
    assert_eq!(row["cloud_cover_selected_locations_count"], 1);
    assert_eq!(row["selected_locations_count"], 1);
    assert_eq!(row["app_time_ms"], 1500);
    assert_eq!(row["info_time_ms"], 250);

    let missing = json!({ "user_uuid": "se2", "selected_locations": [] });
    let (status, _) = send(&app, request("PUT", "/solar-eclipse-2024/data", Some(missing))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_minids_eclipse_responses() {
    let (app, _db) = setup_app().await;
    let response = json!({
        "user_uuid": "m1",
        "mc_responses": ["a"],
        "preset_locations": ["Albuquerque"],
        "user_selected_locations": [[35.25, -106.5]],
    });
    let (status, reply) = send(&app, request("PUT", "/minids/annular-eclipse-2023/response", Some(response))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"]["preset_locations_count"], 1);

    let resubmitted = json!({
        "user_uuid": "m1",
        "mc_responses": ["a", "c"],
        "preset_locations": ["Albuquerque", "Eugene"],
        "user_selected_locations": [],
    });
    send(&app, request("PUT", "/minids/annular-eclipse-2023/response", Some(resubmitted))).await;

    let (status, reply) = send(&app, request("GET", "/minids/annular-eclipse-2023/response/m1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["response"]["mc_responses"], json!(["a", "c"]));
    assert_eq!(reply["response"]["preset_locations_count"], 2);
    assert_eq!(reply["response"]["user_selected_locations_count"], 0);

    let (_, reply) = send(&app, request("GET", "/minids/annular-eclipse-2023/responses", None)).await;
    assert_eq!(reply["responses"].as_array().unwrap().len(), 1);

    let (status, reply) = send(&app, request("GET", "/minids/annular-eclipse-2023/response/nobody", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply["response"].is_null());

    let (status, _) = send(&app, request("PUT", "/minids/annular-eclipse-2023/response", Some(json!({ "user_uuid": "m2" })))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
