//! Database models
//!
//! Row types for the core tables. Credentials (`password`,
//! `verification_code`) are never serialized into responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;

/// Classes with fewer expected students than this are "small"
pub const SMALL_CLASS_THRESHOLD: i64 = 15;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Student {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password: String,
    pub institution: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub verified: i64,
    #[serde(skip_serializing)]
    pub verification_code: String,
    pub visits: i64,
    pub last_visit: Option<DateTime<Utc>>,
    pub profile_created: DateTime<Utc>,
    pub seed: bool,
    pub dummy: bool,
    pub team_member: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Educator {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub institution: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub verified: i64,
    #[serde(skip_serializing)]
    pub verification_code: String,
    pub visits: i64,
    pub last_visit: Option<DateTime<Utc>>,
    pub profile_created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Class {
    pub id: i64,
    pub name: String,
    pub educator_id: i64,
    pub code: String,
    pub created: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
    pub active: bool,
    pub asynchronous: bool,
    pub test: bool,
    pub seed: bool,
    pub expected_size: i64,
}

impl Class {
    pub fn is_small(&self) -> bool {
        self.expected_size < SMALL_CLASS_THRESHOLD
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentClass {
    pub student_id: i64,
    pub class_id: i64,
    pub joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Story {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Stage {
    pub story_name: String,
    pub stage_name: String,
    pub stage_index: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoryState {
    pub student_id: i64,
    pub story_name: String,
    pub story_state: Json<Value>,
    pub last_modified: DateTime<Utc>,
}

/// Story state joined with the owning student's public identity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RosterStoryState {
    pub student_id: i64,
    pub story_name: String,
    pub story_state: Json<Value>,
    pub last_modified: DateTime<Utc>,
    #[sqlx(flatten)]
    pub student: RosterStudent,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RosterStudent {
    pub username: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StageState {
    pub student_id: i64,
    pub story_name: String,
    pub stage_name: String,
    pub state: Json<Value>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub tag: String,
    pub text: String,
    pub shorthand: String,
    pub story_name: String,
    pub version: i64,
    pub created: DateTime<Utc>,
    pub answers_text: Option<Json<Vec<String>>>,
    pub correct_answers: Option<Json<Vec<i64>>>,
    pub neutral_answers: Option<Json<Vec<i64>>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudentOptions {
    pub student_id: i64,
    pub speech_autoread: bool,
    pub speech_rate: f64,
    pub speech_pitch: f64,
    pub speech_voice: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: i64,
    pub hashed_key: String,
    pub client: String,
    pub permissions_root: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserExperienceRating {
    pub id: i64,
    pub story_name: String,
    pub uuid: String,
    pub question: String,
    pub rating: Option<String>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoryVisit {
    pub id: i64,
    pub story_name: String,
    pub info: Json<Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DashboardClassGroup {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub class_ids: Json<Vec<i64>>,
}
