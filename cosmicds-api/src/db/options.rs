//! Per-student presentation options

use cosmicds_common::db::StudentOptions;
use cosmicds_common::{Error, Result};
use serde_json::Value;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentOption {
    SpeechAutoread,
    SpeechRate,
    SpeechPitch,
    SpeechVoice,
}

impl StudentOption {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "speech_autoread" => Some(StudentOption::SpeechAutoread),
            "speech_rate" => Some(StudentOption::SpeechRate),
            "speech_pitch" => Some(StudentOption::SpeechPitch),
            "speech_voice" => Some(StudentOption::SpeechVoice),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            StudentOption::SpeechAutoread => "speech_autoread",
            StudentOption::SpeechRate => "speech_rate",
            StudentOption::SpeechPitch => "speech_pitch",
            StudentOption::SpeechVoice => "speech_voice",
        }
    }
}

pub async fn get(db: &SqlitePool, student_id: i64) -> Result<Option<StudentOptions>> {
    let options =
        sqlx::query_as::<_, StudentOptions>("SELECT * FROM student_options WHERE student_id = ?")
            .bind(student_id)
            .fetch_optional(db)
            .await?;
    Ok(options)
}

/// Set one option, creating the student's default options first if needed.
/// Returns `None` when the student does not exist.
pub async fn set(
    db: &SqlitePool,
    student_id: i64,
    option: StudentOption,
    value: &Value,
) -> Result<Option<StudentOptions>> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM students WHERE id = ?)")
        .bind(student_id)
        .fetch_one(db)
        .await?;
    if !exists {
        return Ok(None);
    }

    sqlx::query("INSERT OR IGNORE INTO student_options (student_id) VALUES (?)")
        .bind(student_id)
        .execute(db)
        .await?;

    let sql = format!(
        "UPDATE student_options SET {} = ? WHERE student_id = ?",
        option.column()
    );
    let query = sqlx::query(&sql);
    let query = match (option, value) {
        (StudentOption::SpeechAutoread, Value::Bool(b)) => query.bind(*b),
        (StudentOption::SpeechAutoread, Value::Number(n)) => {
            query.bind(n.as_f64().unwrap_or_default() != 0.0)
        }
        (StudentOption::SpeechRate | StudentOption::SpeechPitch, Value::Number(n)) => {
            query.bind(n.as_f64().unwrap_or_default())
        }
        (StudentOption::SpeechVoice, Value::String(s)) => query.bind(s.clone()),
        (StudentOption::SpeechVoice, Value::Null) => query.bind(None::<String>),
        _ => {
            return Err(Error::InvalidInput(format!(
                "Invalid value for {}",
                option.column()
            )))
        }
    };
    query.bind(student_id).execute(db).await?;

    get(db, student_id).await
}
