//! Database initialization
//!
//! Opens (creating if needed) the SQLite file and creates the core schema.
//! Story-specific tables are created by each story's setup callback.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every pooled connection
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every core table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_educators_table(pool).await?;
    create_students_table(pool).await?;
    create_classes_table(pool).await?;
    create_students_classes_table(pool).await?;
    create_stories_table(pool).await?;
    create_class_stories_table(pool).await?;
    create_stages_table(pool).await?;
    create_story_states_table(pool).await?;
    create_stage_states_table(pool).await?;
    create_questions_table(pool).await?;
    create_student_options_table(pool).await?;
    create_api_keys_table(pool).await?;
    create_user_experience_ratings_table(pool).await?;
    create_story_visits_table(pool).await?;
    create_dashboard_class_groups_table(pool).await?;
    create_ignore_students_table(pool).await?;
    create_dummy_classes_table(pool).await?;
    Ok(())
}

async fn create_educators_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS educators (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            institution TEXT,
            age INTEGER,
            gender TEXT,
            verified INTEGER NOT NULL DEFAULT 0,
            verification_code TEXT NOT NULL UNIQUE,
            visits INTEGER NOT NULL DEFAULT 0,
            last_visit TIMESTAMP,
            profile_created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_students_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            password TEXT NOT NULL,
            institution TEXT,
            age INTEGER,
            gender TEXT,
            verified INTEGER NOT NULL DEFAULT 0,
            verification_code TEXT NOT NULL UNIQUE,
            visits INTEGER NOT NULL DEFAULT 0,
            last_visit TIMESTAMP,
            profile_created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            seed INTEGER NOT NULL DEFAULT 0,
            dummy INTEGER NOT NULL DEFAULT 0,
            team_member TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_classes_table(pool: &SqlitePool) -> Result<()> {
    // educator_id carries no foreign key: dummy classes are owned by educator 0
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            educator_id INTEGER NOT NULL,
            code TEXT NOT NULL,
            created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated TIMESTAMP,
            active INTEGER NOT NULL DEFAULT 0,
            asynchronous INTEGER NOT NULL DEFAULT 0,
            test INTEGER NOT NULL DEFAULT 0,
            seed INTEGER NOT NULL DEFAULT 0,
            expected_size INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_classes_code ON classes(code)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_students_classes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students_classes (
            student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
            class_id INTEGER NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
            joined TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (student_id, class_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_students_classes_class ON students_classes(class_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_stories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stories (
            name TEXT PRIMARY KEY,
            display_name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_class_stories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS class_stories (
            class_id INTEGER NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
            story_name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (class_id, story_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_stages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stages (
            story_name TEXT NOT NULL,
            stage_name TEXT NOT NULL,
            stage_index INTEGER,
            PRIMARY KEY (story_name, stage_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_story_states_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_states (
            student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
            story_name TEXT NOT NULL,
            story_state TEXT NOT NULL,
            last_modified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (student_id, story_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_stage_states_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stage_states (
            student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
            story_name TEXT NOT NULL,
            stage_name TEXT NOT NULL,
            state TEXT NOT NULL,
            last_modified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (student_id, story_name, stage_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_questions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag TEXT NOT NULL,
            text TEXT NOT NULL,
            shorthand TEXT NOT NULL,
            story_name TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            answers_text TEXT,
            correct_answers TEXT,
            neutral_answers TEXT,
            UNIQUE (tag, story_name, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_student_options_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS student_options (
            student_id INTEGER PRIMARY KEY REFERENCES students(id) ON DELETE CASCADE,
            speech_autoread INTEGER NOT NULL DEFAULT 0,
            speech_rate REAL NOT NULL DEFAULT 1,
            speech_pitch REAL NOT NULL DEFAULT 1,
            speech_voice TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_api_keys_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS api_keys (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hashed_key TEXT NOT NULL UNIQUE,
            client TEXT NOT NULL,
            permissions_root TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_experience_ratings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_experience_ratings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            story_name TEXT NOT NULL,
            uuid TEXT NOT NULL,
            question TEXT NOT NULL,
            rating TEXT CHECK (rating IN ('very_bad', 'poor', 'good', 'excellent')),
            comments TEXT,
            UNIQUE (uuid, story_name, question)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_story_visits_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_visits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            story_name TEXT NOT NULL,
            info TEXT NOT NULL,
            timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_dashboard_class_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dashboard_class_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            code TEXT NOT NULL UNIQUE,
            class_ids TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_ignore_students_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ignore_students (
            student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
            story_name TEXT NOT NULL,
            PRIMARY KEY (student_id, story_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_dummy_classes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dummy_classes (
            story_name TEXT PRIMARY KEY,
            class_id INTEGER NOT NULL REFERENCES classes(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
