//! Question catalogue

use chrono::Utc;
use cosmicds_common::db::Question;
use cosmicds_common::Result;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInfo {
    pub tag: String,
    pub text: String,
    pub shorthand: String,
    pub story_name: String,
    #[serde(default)]
    pub answers_text: Option<Vec<String>>,
    #[serde(default)]
    pub correct_answers: Option<Vec<i64>>,
    #[serde(default)]
    pub neutral_answers: Option<Vec<i64>>,
    #[serde(default)]
    pub version: Option<i64>,
}

/// The requested version of a question, or its newest one
pub async fn find(db: &SqlitePool, tag: &str, version: Option<i64>) -> Result<Option<Question>> {
    let question = match version {
        Some(version) => {
            sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE tag = ? AND version = ?")
                .bind(tag)
                .bind(version)
                .fetch_optional(db)
                .await?
        }
        None => {
            sqlx::query_as::<_, Question>(
                "SELECT * FROM questions WHERE tag = ? ORDER BY version DESC LIMIT 1",
            )
            .bind(tag)
            .fetch_optional(db)
            .await?
        }
    };
    Ok(question)
}

pub async fn current_version(db: &SqlitePool, tag: &str) -> Result<Option<i64>> {
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM questions WHERE tag = ?")
        .bind(tag)
        .fetch_one(db)
        .await?;
    Ok(version)
}

/// Insert a question. Without an explicit version it gets the current version, or 1.
pub async fn add(db: &SqlitePool, info: &QuestionInfo) -> Result<Question> {
    let version = match info.version {
        Some(version) => version,
        None => current_version(db, &info.tag).await?.unwrap_or(1),
    };

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions (tag, text, shorthand, story_name, version, created,
                               answers_text, correct_answers, neutral_answers)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&info.tag)
    .bind(&info.text)
    .bind(&info.shorthand)
    .bind(&info.story_name)
    .bind(version)
    .bind(Utc::now())
    .bind(info.answers_text.as_ref().map(Json))
    .bind(info.correct_answers.as_ref().map(Json))
    .bind(info.neutral_answers.as_ref().map(Json))
    .fetch_one(db)
    .await?;
    Ok(question)
}

pub async fn for_story(db: &SqlitePool, story_name: &str, newest_only: bool) -> Result<Vec<Question>> {
    let sql = if newest_only {
        r#"
        SELECT q.* FROM questions q
        INNER JOIN (SELECT tag, MAX(version) AS version FROM questions GROUP BY tag) latest
            ON latest.tag = q.tag AND latest.version = q.version
        WHERE q.story_name = ?
        ORDER BY q.id
        "#
    } else {
        "SELECT * FROM questions WHERE story_name = ? ORDER BY id"
    };

    let questions = sqlx::query_as::<_, Question>(sql)
        .bind(story_name)
        .fetch_all(db)
        .await?;
    Ok(questions)
}
