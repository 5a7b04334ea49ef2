//! Database initialization tests

use cosmicds_common::db::init_database;
use tempfile::TempDir;

const CORE_TABLES: &[&str] = &[
    "educators",
    "students",
    "classes",
    "students_classes",
    "stories",
    "class_stories",
    "stages",
    "story_states",
    "stage_states",
    "questions",
    "student_options",
    "api_keys",
    "user_experience_ratings",
    "story_visits",
    "dashboard_class_groups",
    "ignore_students",
    "dummy_classes",
];

#[tokio::test]
async fn test_database_created_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("cosmicds.db");

    let pool = init_database(&db_path).await;

    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_core_tables_exist() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("cosmicds.db")).await.unwrap();

    for table in CORE_TABLES {
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(&pool)
                .await
                .unwrap();
        assert!(found.is_some(), "Missing table {}", table);
    }
}

#[tokio::test]
async fn test_reopen_keeps_data() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cosmicds.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO stories (name, display_name) VALUES ('hubbles_law', 'Hubble''s Law')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stories")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("cosmicds.db")).await.unwrap();

    let result = sqlx::query("INSERT INTO students_classes (student_id, class_id) VALUES (41, 42)")
        .execute(&pool)
        .await;

    assert!(result.is_err());
}
