//! Class, roster and class-story operations

use chrono::Utc;
use cosmicds_common::auth::class_code;
use cosmicds_common::db::{Class, RosterStoryState, Student};
use cosmicds_common::Result;
use rand::Rng;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info};

use crate::results::CreateClassResult;
use crate::stories::StoryRegistry;

/// Code given to generated dummy classes
const DUMMY_CLASS_CODE: &str = "xxxxxx";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClassOptions {
    pub educator_id: i64,
    pub name: String,
    pub expected_size: i64,
    #[serde(default)]
    pub asynchronous: Option<bool>,
    #[serde(default)]
    pub story_name: Option<String>,
}

#[derive(Debug)]
pub struct CreateClassResponse {
    pub result: CreateClassResult,
    pub class: Option<Class>,
}

pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<Class>> {
    let class = sqlx::query_as::<_, Class>("SELECT * FROM classes WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(class)
}

pub async fn find_by_code(db: &SqlitePool, code: &str) -> Result<Option<Class>> {
    let class = sqlx::query_as::<_, Class>("SELECT * FROM classes WHERE code = ? ORDER BY id LIMIT 1")
        .bind(code)
        .fetch_optional(db)
        .await?;
    Ok(class)
}

/// Numeric identifiers are IDs, anything else is a class code
pub async fn find_by_identifier(db: &SqlitePool, identifier: &str) -> Result<Option<Class>> {
    match identifier.parse::<i64>() {
        Ok(id) => find_by_id(db, id).await,
        Err(_) => find_by_code(db, identifier).await,
    }
}

/// Create a class and, when a story is named, attach it and run the
/// story's class-setup hook in the same transaction
pub async fn create(
    db: &SqlitePool,
    stories: &StoryRegistry,
    options: &CreateClassOptions,
) -> Result<CreateClassResponse> {
    let code = class_code(options.educator_id, &options.name);

    if find_by_code(db, &code).await?.is_some() {
        return Ok(CreateClassResponse {
            result: CreateClassResult::AlreadyExists,
            class: None,
        });
    }

    match create_in_transaction(db, stories, options, &code).await {
        Ok(class) => {
            info!(
                "Educator {} created class \"{}\" ({})",
                class.educator_id, class.name, class.code
            );
            Ok(CreateClassResponse {
                result: CreateClassResult::Ok,
                class: Some(class),
            })
        }
        Err(e) if e.is_unique_violation() => Ok(CreateClassResponse {
            result: CreateClassResult::AlreadyExists,
            class: None,
        }),
        Err(e) => {
            error!("Failed to create class {}: {}", options.name, e);
            Ok(CreateClassResponse {
                result: CreateClassResult::Error,
                class: None,
            })
        }
    }
}

async fn create_in_transaction(
    db: &SqlitePool,
    stories: &StoryRegistry,
    options: &CreateClassOptions,
    code: &str,
) -> Result<Class> {
    let mut tx = db.begin().await?;

    let class = sqlx::query_as::<_, Class>(
        r#"
        INSERT INTO classes (name, educator_id, code, created, asynchronous, expected_size)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&options.name)
    .bind(options.educator_id)
    .bind(code)
    .bind(Utc::now())
    .bind(options.asynchronous.unwrap_or(false))
    .bind(options.expected_size)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(story_name) = options.story_name.as_deref() {
        sqlx::query("INSERT INTO class_stories (class_id, story_name) VALUES (?, ?)")
            .bind(class.id)
            .bind(story_name)
            .execute(&mut *tx)
            .await?;

        if let Some(story) = stories.get(story_name) {
            story.setup_class(&mut tx, &class).await?;
        }
    }

    tx.commit().await?;
    Ok(class)
}

/// Delete a class; memberships and class-story rows cascade
pub async fn delete(db: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM classes WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn size(db: &SqlitePool, class_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students_classes WHERE class_id = ?")
        .bind(class_id)
        .fetch_one(db)
        .await?;
    Ok(count)
}

pub async fn roster(db: &SqlitePool, class_id: i64) -> Result<Vec<Student>> {
    let students = sqlx::query_as::<_, Student>(
        r#"
        SELECT s.* FROM students s
        INNER JOIN students_classes sc ON sc.student_id = s.id
        WHERE sc.class_id = ?
        ORDER BY s.id
        "#,
    )
    .bind(class_id)
    .fetch_all(db)
    .await?;
    Ok(students)
}

/// Story states of every class member for one story
pub async fn roster_info_for_story(
    db: &SqlitePool,
    class_id: i64,
    story_name: &str,
) -> Result<Vec<RosterStoryState>> {
    let states = sqlx::query_as::<_, RosterStoryState>(
        r#"
        SELECT ss.student_id, ss.story_name, ss.story_state, ss.last_modified,
               s.username, s.email
        FROM story_states ss
        INNER JOIN students_classes sc ON sc.student_id = ss.student_id
        INNER JOIN students s ON s.id = ss.student_id
        WHERE sc.class_id = ? AND ss.story_name = ?
        ORDER BY ss.student_id
        "#,
    )
    .bind(class_id)
    .bind(story_name)
    .fetch_all(db)
    .await?;
    Ok(states)
}

/// Roster story states for every story attached to the class, keyed by the
/// story's display name (or its name when unregistered)
pub async fn roster_info(
    db: &SqlitePool,
    class_id: i64,
) -> Result<Vec<(String, Vec<RosterStoryState>)>> {
    let stories: Vec<(String, Option<String>)> = sqlx::query_as(
        r#"
        SELECT cs.story_name, st.display_name
        FROM class_stories cs
        LEFT JOIN stories st ON st.name = cs.story_name
        WHERE cs.class_id = ?
        ORDER BY cs.story_name
        "#,
    )
    .bind(class_id)
    .fetch_all(db)
    .await?;

    let mut info = Vec::with_capacity(stories.len());
    for (story_name, display_name) in stories {
        let states = roster_info_for_story(db, class_id, &story_name).await?;
        info.push((display_name.unwrap_or(story_name), states));
    }
    Ok(info)
}

/// The most recently joined class of the student that runs the story
pub async fn class_for_student_story(
    db: &SqlitePool,
    student_id: i64,
    story_name: &str,
) -> Result<Option<Class>> {
    let class = sqlx::query_as::<_, Class>(
        r#"
        SELECT c.* FROM classes c
        INNER JOIN class_stories cs ON cs.class_id = c.id AND cs.story_name = ?
        INNER JOIN students_classes sc ON sc.class_id = c.id AND sc.student_id = ?
        ORDER BY sc.joined DESC, c.id DESC
        LIMIT 1
        "#,
    )
    .bind(story_name)
    .bind(student_id)
    .fetch_optional(db)
    .await?;
    Ok(class)
}

pub async fn is_story_active(db: &SqlitePool, class_id: i64, story_name: &str) -> Result<Option<bool>> {
    let active: Option<bool> = sqlx::query_scalar(
        "SELECT active FROM class_stories WHERE class_id = ? AND story_name = ?",
    )
    .bind(class_id)
    .bind(story_name)
    .fetch_optional(db)
    .await?;
    Ok(active)
}

pub async fn set_story_active(
    db: &SqlitePool,
    class_id: i64,
    story_name: &str,
    active: bool,
) -> Result<bool> {
    let result =
        sqlx::query("UPDATE class_stories SET active = ? WHERE class_id = ? AND story_name = ?")
            .bind(active)
            .bind(class_id)
            .bind(story_name)
            .execute(db)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Classes of a dashboard group, or `None` for an unknown group code
pub async fn dashboard_group_classes(db: &SqlitePool, code: &str) -> Result<Option<Vec<Class>>> {
    let class_ids: Option<Json<Vec<i64>>> =
        sqlx::query_scalar("SELECT class_ids FROM dashboard_class_groups WHERE code = ?")
            .bind(code)
            .fetch_optional(db)
            .await?;

    let Some(class_ids) = class_ids else {
        return Ok(None);
    };

    let classes = sqlx::query_as::<_, Class>(
        "SELECT * FROM classes WHERE id IN (SELECT value FROM json_each(?)) ORDER BY id",
    )
    .bind(class_ids)
    .fetch_all(db)
    .await?;
    Ok(Some(classes))
}

/// Create the next dummy class for a story and make it the story's current one
pub async fn new_dummy_class(conn: &mut SqliteConnection, story_name: &str) -> Result<Class> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM classes WHERE educator_id = 0 AND name LIKE ?",
    )
    .bind(format!("DummyClass_{}_%", story_name))
    .fetch_one(&mut *conn)
    .await?;

    let class = sqlx::query_as::<_, Class>(
        r#"
        INSERT INTO classes (name, educator_id, code, created)
        VALUES (?, 0, ?, ?)
        RETURNING *
        "#,
    )
    .bind(format!("DummyClass_{}_{}", story_name, count + 1))
    .bind(DUMMY_CLASS_CODE)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO dummy_classes (story_name, class_id) VALUES (?, ?)
        ON CONFLICT(story_name) DO UPDATE SET class_id = excluded.class_id
        "#,
    )
    .bind(story_name)
    .bind(class.id)
    .execute(&mut *conn)
    .await?;

    Ok(class)
}

/// Create a dummy student. Seeded students with a story join that story's
/// current dummy class, which rolls over once it holds 20-30 members.
pub async fn new_dummy_student(
    db: &SqlitePool,
    seed: bool,
    team_member: Option<&str>,
    story_name: Option<&str>,
) -> Result<Student> {
    let rollover_size: i64 = rand::thread_rng().gen_range(20..=30);

    let mut tx = db.begin().await?;

    let next_id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) + 1 FROM students")
        .fetch_one(&mut *tx)
        .await?;

    let student = sqlx::query_as::<_, Student>(
        r#"
        INSERT INTO students (username, email, password, institution, verified,
                              verification_code, profile_created, seed, dummy, team_member)
        VALUES (?, ?, ?, 'Dummy', 1, ?, ?, ?, 1, ?)
        RETURNING *
        "#,
    )
    .bind(format!("dummy_student_{}", next_id))
    .bind(format!("dummy_student_{}@dummy.school", next_id))
    .bind(cosmicds_common::auth::hash_password("dummypass"))
    .bind(format!("verification_{}", next_id))
    .bind(Utc::now())
    .bind(seed)
    .bind(team_member)
    .fetch_one(&mut *tx)
    .await?;

    if let (true, Some(story_name)) = (seed, story_name) {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT class_id FROM dummy_classes WHERE story_name = ?")
                .bind(story_name)
                .fetch_optional(&mut *tx)
                .await?;

        let class_id = match current {
            None => new_dummy_class(&mut tx, story_name).await?.id,
            Some(class_id) => {
                let size: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM students_classes WHERE class_id = ?",
                )
                .bind(class_id)
                .fetch_one(&mut *tx)
                .await?;
                if size > rollover_size {
                    new_dummy_class(&mut tx, story_name).await?.id
                } else {
                    class_id
                }
            }
        };

        super::students::add_to_class(&mut tx, student.id, class_id).await?;
    }

    tx.commit().await?;
    Ok(student)
}
