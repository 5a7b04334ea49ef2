//! Student account operations

use chrono::Utc;
use cosmicds_common::auth::{create_verification_code, hash_password};
use cosmicds_common::db::{Class, Student};
use cosmicds_common::Result;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error};

use crate::results::{SignUpResult, VerificationResult};

/// Body accepted by student sign-up
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpStudent {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub classroom_code: Option<String>,
}

pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<Student>> {
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(student)
}

pub async fn find_by_username(db: &SqlitePool, username: &str) -> Result<Option<Student>> {
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE username = ?")
        .bind(username)
        .fetch_optional(db)
        .await?;
    Ok(student)
}

/// Numeric identifiers are IDs, anything else is a username
pub async fn find_by_identifier(db: &SqlitePool, identifier: &str) -> Result<Option<Student>> {
    match identifier.parse::<i64>() {
        Ok(id) => find_by_id(db, id).await,
        Err(_) => find_by_username(db, identifier).await,
    }
}

pub async fn list(db: &SqlitePool) -> Result<Vec<Student>> {
    let students = sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY id")
        .fetch_all(db)
        .await?;
    Ok(students)
}

/// True if any student or educator already uses this verification code
pub async fn verification_code_in_use(db: &SqlitePool, code: &str) -> Result<bool> {
    let in_use: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(SELECT 1 FROM students WHERE verification_code = ?1)
            OR EXISTS(SELECT 1 FROM educators WHERE verification_code = ?1)
        "#,
    )
    .bind(code)
    .fetch_one(db)
    .await?;
    Ok(in_use)
}

/// Generate a verification code not used by any account
pub async fn unused_verification_code(db: &SqlitePool) -> Result<String> {
    loop {
        let code = create_verification_code();
        if !verification_code_in_use(db, &code).await? {
            return Ok(code);
        }
        debug!("Verification code collision, retrying");
    }
}

/// Map an account-creation failure to its sign-up outcome
pub fn sign_up_result_from_error(err: &cosmicds_common::Error) -> SignUpResult {
    if err.is_unique_violation() {
        SignUpResult::EmailExists
    } else {
        error!("Sign-up failed: {}", err);
        SignUpResult::Error
    }
}

/// Create a student account, enrolling it in the class named by
/// `classroom_code` when that code is valid
pub async fn sign_up(db: &SqlitePool, options: &SignUpStudent) -> Result<SignUpResult> {
    let verification_code = unused_verification_code(db).await?;
    let password = hash_password(&options.password);

    let mut tx = db.begin().await?;

    let inserted = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO students (username, email, password, institution, age, gender,
                              verified, verification_code, profile_created)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&options.username)
    .bind(&options.email)
    .bind(&password)
    .bind(&options.institution)
    .bind(options.age.map(|a| a as i64))
    .bind(&options.gender)
    .bind(&verification_code)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await;

    let student_id = match inserted {
        Ok(id) => id,
        Err(e) => return Ok(sign_up_result_from_error(&e.into())),
    };

    if let Some(code) = options.classroom_code.as_deref() {
        let class = sqlx::query_as::<_, Class>("SELECT * FROM classes WHERE code = ?")
            .bind(code)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(class) = class {
            add_to_class(&mut tx, student_id, class.id).await?;
        }
    }

    tx.commit().await?;
    Ok(SignUpResult::Ok)
}

/// Enrol a student; returns false when the membership already existed
pub async fn add_to_class(conn: &mut SqliteConnection, student_id: i64, class_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO students_classes (student_id, class_id, joined)
        VALUES (?, ?, ?)
        ON CONFLICT(student_id, class_id) DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind(class_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove a student from a class; returns false when they were not enrolled
pub async fn remove_from_class(db: &SqlitePool, student_id: i64, class_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM students_classes WHERE student_id = ? AND class_id = ?")
        .bind(student_id)
        .bind(class_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn is_in_class(db: &SqlitePool, student_id: i64, class_id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM students_classes WHERE student_id = ? AND class_id = ?)",
    )
    .bind(student_id)
    .bind(class_id)
    .fetch_one(db)
    .await?;
    Ok(exists)
}

pub async fn verify(db: &SqlitePool, code: &str) -> Result<VerificationResult> {
    let verified: Option<i64> =
        sqlx::query_scalar("SELECT verified FROM students WHERE verification_code = ?")
            .bind(code)
            .fetch_optional(db)
            .await?;

    match verified {
        None => Ok(VerificationResult::InvalidCode),
        Some(1) => Ok(VerificationResult::AlreadyVerified),
        Some(_) => {
            sqlx::query("UPDATE students SET verified = 1 WHERE verification_code = ?")
                .bind(code)
                .execute(db)
                .await?;
            Ok(VerificationResult::Ok)
        }
    }
}

/// Bump the visit counter after a successful login
pub async fn record_visit(db: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE students SET visits = visits + 1, last_visit = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn classes_for_student(db: &SqlitePool, student_id: i64) -> Result<Vec<Class>> {
    let classes = sqlx::query_as::<_, Class>(
        r#"
        SELECT c.* FROM classes c
        INNER JOIN students_classes sc ON sc.class_id = c.id
        WHERE sc.student_id = ?
        ORDER BY c.id
        "#,
    )
    .bind(student_id)
    .fetch_all(db)
    .await?;
    Ok(classes)
}
