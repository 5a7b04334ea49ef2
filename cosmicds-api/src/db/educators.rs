//! Educator account operations

use chrono::Utc;
use cosmicds_common::auth::hash_password;
use cosmicds_common::db::{Class, Educator};
use cosmicds_common::Result;
use serde::Deserialize;
use sqlx::SqlitePool;

use super::students::{sign_up_result_from_error, unused_verification_code};
use crate::results::{SignUpResult, VerificationResult};

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpEducator {
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
}

pub async fn find_by_id(db: &SqlitePool, id: i64) -> Result<Option<Educator>> {
    let educator = sqlx::query_as::<_, Educator>("SELECT * FROM educators WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(educator)
}

pub async fn find_by_username(db: &SqlitePool, username: &str) -> Result<Option<Educator>> {
    let educator = sqlx::query_as::<_, Educator>("SELECT * FROM educators WHERE username = ?")
        .bind(username)
        .fetch_optional(db)
        .await?;
    Ok(educator)
}

pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<Educator>> {
    let educator = sqlx::query_as::<_, Educator>("SELECT * FROM educators WHERE email = ?")
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(educator)
}

pub async fn find_by_identifier(db: &SqlitePool, identifier: &str) -> Result<Option<Educator>> {
    match identifier.parse::<i64>() {
        Ok(id) => find_by_id(db, id).await,
        Err(_) => find_by_username(db, identifier).await,
    }
}

pub async fn list(db: &SqlitePool) -> Result<Vec<Educator>> {
    let educators = sqlx::query_as::<_, Educator>("SELECT * FROM educators ORDER BY id")
        .fetch_all(db)
        .await?;
    Ok(educators)
}

pub async fn sign_up(db: &SqlitePool, options: &SignUpEducator) -> Result<SignUpResult> {
    let verification_code = unused_verification_code(db).await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO educators (first_name, last_name, username, email, password, institution,
                               age, gender, verified, verification_code, profile_created)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&options.first_name)
    .bind(&options.last_name)
    .bind(&options.username)
    .bind(&options.email)
    .bind(hash_password(&options.password))
    .bind(&options.institution)
    .bind(options.age.map(|a| a as i64))
    .bind(&options.gender)
    .bind(&verification_code)
    .bind(Utc::now())
    .execute(db)
    .await;

    match inserted {
        Ok(_) => Ok(SignUpResult::Ok),
        Err(e) => Ok(sign_up_result_from_error(&e.into())),
    }
}

pub async fn verify(db: &SqlitePool, code: &str) -> Result<VerificationResult> {
    let verified: Option<i64> =
        sqlx::query_scalar("SELECT verified FROM educators WHERE verification_code = ?")
            .bind(code)
            .fetch_optional(db)
            .await?;

    match verified {
        None => Ok(VerificationResult::InvalidCode),
        Some(1) => Ok(VerificationResult::AlreadyVerified),
        Some(_) => {
            sqlx::query("UPDATE educators SET verified = 1 WHERE verification_code = ?")
                .bind(code)
                .execute(db)
                .await?;
            Ok(VerificationResult::Ok)
        }
    }
}

pub async fn record_visit(db: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE educators SET visits = visits + 1, last_visit = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn classes_for_educator(db: &SqlitePool, educator_id: i64) -> Result<Vec<Class>> {
    let classes =
        sqlx::query_as::<_, Class>("SELECT * FROM classes WHERE educator_id = ? ORDER BY id")
            .bind(educator_id)
            .fetch_all(db)
            .await?;
    Ok(classes)
}
