//! Story and stage state persistence

use std::collections::BTreeMap;

use chrono::Utc;
use cosmicds_common::db::{Stage, Story};
use cosmicds_common::Result;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::SqlitePool;

/// Which students a stage-state query covers
#[derive(Debug, Clone, Copy)]
pub enum StageStateOwner {
    Student(i64),
    Class(i64),
}

pub async fn get_story(db: &SqlitePool, story_name: &str) -> Result<Option<Story>> {
    let story = sqlx::query_as::<_, Story>("SELECT * FROM stories WHERE name = ?")
        .bind(story_name)
        .fetch_optional(db)
        .await?;
    Ok(story)
}

pub async fn get_stages(db: &SqlitePool, story_name: &str) -> Result<Vec<Stage>> {
    let stages = sqlx::query_as::<_, Stage>(
        "SELECT * FROM stages WHERE story_name = ? ORDER BY stage_index ASC",
    )
    .bind(story_name)
    .fetch_all(db)
    .await?;
    Ok(stages)
}

pub async fn get_story_state(db: &SqlitePool, student_id: i64, story_name: &str) -> Result<Option<Value>> {
    let state: Option<Json<Value>> = sqlx::query_scalar(
        "SELECT story_state FROM story_states WHERE student_id = ? AND story_name = ?",
    )
    .bind(student_id)
    .bind(story_name)
    .fetch_optional(db)
    .await?;
    Ok(state.map(|s| s.0))
}

/// Replace a student's story state. Returns `None` when the student does not exist.
pub async fn update_story_state(
    db: &SqlitePool,
    student_id: i64,
    story_name: &str,
    state: &Value,
) -> Result<Option<Value>> {
    let stored = sqlx::query_scalar::<_, Json<Value>>(
        r#"
        INSERT INTO story_states (student_id, story_name, story_state, last_modified)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(student_id, story_name) DO UPDATE SET
            story_state = excluded.story_state,
            last_modified = excluded.last_modified
        RETURNING story_state
        "#,
    )
    .bind(student_id)
    .bind(story_name)
    .bind(Json(state))
    .bind(Utc::now())
    .fetch_one(db)
    .await;

    match stored {
        Ok(state) => Ok(Some(state.0)),
        Err(e) => {
            let err = cosmicds_common::Error::from(e);
            if err.is_foreign_key_violation() {
                Ok(None)
            } else {
                Err(err)
            }
        }
    }
}

/// Deep-merge `patch` into the stored story state (creating it when absent)
pub async fn patch_story_state(
    db: &SqlitePool,
    student_id: i64,
    story_name: &str,
    patch: &Value,
) -> Result<Option<Value>> {
    let merged = match get_story_state(db, student_id, story_name).await? {
        Some(mut state) => {
            merge_patch(&mut state, patch);
            state
        }
        None => patch.clone(),
    };
    update_story_state(db, student_id, story_name, &merged).await
}

/// Objects merge key by key, every other value replaces what it patches
pub fn merge_patch(state: &mut Value, patch: &Value) {
    match (state, patch) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                let nested = value.is_object() && target.get(key).is_some_and(Value::is_object);
                match target.get_mut(key) {
                    Some(existing) if nested => merge_patch(existing, value),
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (state, patch) => *state = patch.clone(),
    }
}

pub async fn get_stage_state(
    db: &SqlitePool,
    student_id: i64,
    story_name: &str,
    stage_name: &str,
) -> Result<Option<Value>> {
    let state: Option<Json<Value>> = sqlx::query_scalar(
        "SELECT state FROM stage_states WHERE student_id = ? AND story_name = ? AND stage_name = ?",
    )
    .bind(student_id)
    .bind(story_name)
    .bind(stage_name)
    .fetch_optional(db)
    .await?;
    Ok(state.map(|s| s.0))
}

/// Stage states grouped by stage name
pub async fn get_stage_states(
    db: &SqlitePool,
    story_name: &str,
    stage_name: Option<&str>,
    owner: StageStateOwner,
) -> Result<BTreeMap<String, Vec<Value>>> {
    let owner_filter = match owner {
        StageStateOwner::Student(_) => "student_id = ?2",
        StageStateOwner::Class(_) => {
            "student_id IN (SELECT student_id FROM students_classes WHERE class_id = ?2)"
        }
    };
    let owner_id = match owner {
        StageStateOwner::Student(id) | StageStateOwner::Class(id) => id,
    };

    let query = format!(
        r#"
        SELECT stage_name, state FROM stage_states
        WHERE story_name = ?1 AND {} AND (?3 IS NULL OR stage_name = ?3)
        ORDER BY student_id
        "#,
        owner_filter
    );

    let rows: Vec<(String, Json<Value>)> = sqlx::query_as(&query)
        .bind(story_name)
        .bind(owner_id)
        .bind(stage_name)
        .fetch_all(db)
        .await?;

    let mut grouped: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (stage, state) in rows {
        grouped.entry(stage).or_default().push(state.0);
    }
    Ok(grouped)
}

pub async fn update_stage_state(
    db: &SqlitePool,
    student_id: i64,
    story_name: &str,
    stage_name: &str,
    state: &Value,
) -> Result<Option<Value>> {
    let stored = sqlx::query_scalar::<_, Json<Value>>(
        r#"
        INSERT INTO stage_states (student_id, story_name, stage_name, state, last_modified)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(student_id, story_name, stage_name) DO UPDATE SET
            state = excluded.state,
            last_modified = excluded.last_modified
        RETURNING state
        "#,
    )
    .bind(student_id)
    .bind(story_name)
    .bind(stage_name)
    .bind(Json(state))
    .bind(Utc::now())
    .fetch_one(db)
    .await;

    match stored {
        Ok(state) => Ok(Some(state.0)),
        Err(e) => {
            let err = cosmicds_common::Error::from(e);
            if err.is_foreign_key_violation() {
                Ok(None)
            } else {
                Err(err)
            }
        }
    }
}

pub async fn delete_stage_state(
    db: &SqlitePool,
    student_id: i64,
    story_name: &str,
    stage_name: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM stage_states WHERE student_id = ? AND story_name = ? AND stage_name = ?",
    )
    .bind(student_id)
    .bind(story_name)
    .bind(stage_name)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_nested_objects() {
        let mut state = json!({"a": {"b": 1, "c": 2}, "d": [1, 2]});
        merge_patch(&mut state, &json!({"a": {"c": 3, "e": 4}, "d": [3]}));
        assert_eq!(state, json!({"a": {"b": 1, "c": 3, "e": 4}, "d": [3]}));
    }

    #[test]
    fn test_merge_patch_replaces_non_objects() {
        let mut state = json!({"a": 1});
        merge_patch(&mut state, &json!({"a": {"b": 2}}));
        assert_eq!(state, json!({"a": {"b": 2}}));

        let mut scalar = json!(5);
        merge_patch(&mut scalar, &json!({"x": 1}));
        assert_eq!(scalar, json!({"x": 1}));
    }
}
