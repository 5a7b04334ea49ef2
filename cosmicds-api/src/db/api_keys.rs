//! API key lookup

use cosmicds_common::auth::hash_api_key;
use cosmicds_common::db::ApiKey;
use cosmicds_common::Result;
use sqlx::SqlitePool;

/// Find the stored key matching a presented plaintext key
pub async fn find_by_key(db: &SqlitePool, key: &str) -> Result<Option<ApiKey>> {
    let api_key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE hashed_key = ?")
        .bind(hash_api_key(key))
        .fetch_optional(db)
        .await?;
    Ok(api_key)
}

/// Register a key; only its hash is stored
pub async fn insert(
    db: &SqlitePool,
    key: &str,
    client: &str,
    permissions_root: Option<&str>,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO api_keys (hashed_key, client, permissions_root) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(hash_api_key(key))
    .bind(client)
    .bind(permissions_root)
    .fetch_one(db)
    .await?;
    Ok(id)
}
