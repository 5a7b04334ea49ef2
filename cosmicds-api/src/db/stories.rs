//! Rows shared by every story: registration, visits and user-experience ratings

use chrono::Utc;
use cosmicds_common::db::{StoryVisit, UserExperienceRating};
use cosmicds_common::Result;
use serde::Deserialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::SqlitePool;

/// Allowed values of a user-experience rating
pub const RATINGS: [&str; 4] = ["very_bad", "poor", "good", "excellent"];

#[derive(Debug, Clone, Deserialize)]
pub struct ExperienceInfo {
    #[serde(default)]
    pub comments: Option<String>,
    pub uuid: String,
    pub question: String,
    #[serde(default)]
    pub rating: Option<String>,
}

/// Record a story in the `stories` table if it is not there yet
pub async fn register_story(db: &SqlitePool, name: &str, display_name: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO stories (name, display_name) VALUES (?, ?)")
        .bind(name)
        .bind(display_name)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn add_visit(db: &SqlitePool, story_name: &str, info: &Value) -> Result<StoryVisit> {
    let visit = sqlx::query_as::<_, StoryVisit>(
        "INSERT INTO story_visits (story_name, info, timestamp) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(story_name)
    .bind(Json(info))
    .bind(Utc::now())
    .fetch_one(db)
    .await?;
    Ok(visit)
}

/// Insert or replace the rating keyed by (uuid, story, question)
pub async fn set_experience(
    db: &SqlitePool,
    story_name: &str,
    info: &ExperienceInfo,
) -> Result<UserExperienceRating> {
    let rating = sqlx::query_as::<_, UserExperienceRating>(
        r#"
        INSERT INTO user_experience_ratings (story_name, uuid, question, rating, comments)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(uuid, story_name, question) DO UPDATE SET
            rating = excluded.rating,
            comments = excluded.comments
        RETURNING *
        "#,
    )
    .bind(story_name)
    .bind(&info.uuid)
    .bind(&info.question)
    .bind(&info.rating)
    .bind(&info.comments)
    .fetch_one(db)
    .await?;
    Ok(rating)
}

pub async fn get_experience(
    db: &SqlitePool,
    story_name: &str,
    uuid: &str,
) -> Result<Vec<UserExperienceRating>> {
    let ratings = sqlx::query_as::<_, UserExperienceRating>(
        "SELECT * FROM user_experience_ratings WHERE uuid = ? AND story_name = ? ORDER BY id",
    )
    .bind(uuid)
    .bind(story_name)
    .fetch_all(db)
    .await?;
    Ok(ratings)
}
