//! Per-user analytics rows that accumulate over a session
//!
//! Several stories keep one row per anonymous user (`user_uuid`) holding
//! selection logs (JSON arrays with a companion `*_count` column), time and
//! click counters, and sticky booleans. A `PUT` submission upserts the whole
//! row; a `PATCH` carries deltas that are applied in a single `UPDATE`:
//!
//! - arrays are appended to with `json_insert` and their count recomputed
//! - counters are incremented by their `delta_<column>` value
//! - flags can only be raised, never cleared
//! - replaced columns are overwritten
//!
//! An update with nothing to apply performs no write.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use cosmicds_common::Result;
use serde::Serialize;
use serde_json::{json, Map, Value};
use sqlx::query::QueryAs;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite, SqlitePool};
use tracing::{debug, error};

use crate::body::JsonBody;
use crate::schema::Schema;
use crate::AppState;

/// Natural key of every accumulating table
pub const KEY_COLUMN: &str = "user_uuid";

/// A JSON array column and the column holding its length
#[derive(Debug, Clone, Copy)]
pub struct ArrayColumn {
    pub column: &'static str,
    pub count: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct AccumulatingTable {
    pub table: &'static str,
    pub arrays: &'static [ArrayColumn],
    pub counters: &'static [&'static str],
    pub flags: &'static [&'static str],
    pub replaced: &'static [&'static str],
}

impl AccumulatingTable {
    /// Columns a full submission may set, excluding the key
    fn submit_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.arrays
            .iter()
            .flat_map(|a| [a.column, a.count])
            .chain(self.counters.iter().copied())
            .chain(self.flags.iter().copied())
            .chain(self.replaced.iter().copied())
    }
}

type RowQuery<'q, T> = QueryAs<'q, Sqlite, T, SqliteArguments<'q>>;

fn bind_value<'q, T>(query: RowQuery<'q, T>, value: &Value) -> RowQuery<'q, T> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(sqlx::types::Json(other.clone())),
    }
}

fn delta(update: &Map<String, Value>, column: &str) -> Option<i64> {
    let value = update.get(&format!("delta_{}", column))?;
    let delta = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))?;
    (delta != 0).then_some(delta)
}

/// Insert or overwrite the user's row from a validated submission
pub async fn submit<T>(
    db: &SqlitePool,
    table: &AccumulatingTable,
    user_uuid: &str,
    entry: &Map<String, Value>,
) -> Result<T>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut columns = vec![KEY_COLUMN];
    let mut values = vec![Value::String(user_uuid.to_string())];

    for column in table.submit_columns() {
        if let Some(value) = entry.get(column).filter(|v| !v.is_null()) {
            columns.push(column);
            values.push(value.clone());
        }
    }

    // Counts default to the submitted array's length
    for array in table.arrays {
        if entry.get(array.count).map_or(true, Value::is_null) {
            if let Some(Value::Array(items)) = entry.get(array.column) {
                columns.push(array.count);
                values.push(Value::from(items.len()));
            }
        }
    }

    let placeholders = vec!["?"; columns.len() + 1].join(", ");
    let updates: Vec<String> = columns[1..]
        .iter()
        .map(|c| format!("{0} = excluded.{0}", c))
        .chain(std::iter::once("last_updated = excluded.last_updated".to_string()))
        .collect();

    let sql = format!(
        "INSERT INTO {table} ({columns}, last_updated) VALUES ({placeholders}) \
         ON CONFLICT({key}) DO UPDATE SET {updates} RETURNING *",
        table = table.table,
        columns = columns.join(", "),
        placeholders = placeholders,
        key = KEY_COLUMN,
        updates = updates.join(", "),
    );

    let mut query = sqlx::query_as::<_, T>(&sql);
    for value in &values {
        query = bind_value(query, value);
    }
    let row = query.bind(Utc::now()).fetch_one(db).await?;
    Ok(row)
}

pub async fn fetch<T>(db: &SqlitePool, table: &AccumulatingTable, user_uuid: &str) -> Result<Option<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let sql = format!("SELECT * FROM {} WHERE {} = ?", table.table, KEY_COLUMN);
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(user_uuid)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn fetch_all<T>(db: &SqlitePool, table: &AccumulatingTable) -> Result<Vec<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let sql = format!("SELECT * FROM {} ORDER BY id", table.table);
    let rows = sqlx::query_as::<_, T>(&sql).fetch_all(db).await?;
    Ok(rows)
}

/// Apply an update's deltas atomically. Returns `None` when the user has no row.
pub async fn accumulate<T>(
    db: &SqlitePool,
    table: &AccumulatingTable,
    user_uuid: &str,
    update: &Map<String, Value>,
) -> Result<Option<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    for array in table.arrays {
        if let Some(Value::Array(items)) = update.get(array.column) {
            if items.is_empty() {
                continue;
            }
            let mut appended = Vec::with_capacity(items.len());
            for item in items {
                values.push(Value::String(item.to_string()));
                appended.push(format!("'$[#]', json(?{})", values.len()));
            }
            sets.push(format!(
                "{col} = json_insert({col}, {appended})",
                col = array.column,
                appended = appended.join(", "),
            ));
            sets.push(format!(
                "{count} = json_array_length({col}) + {added}",
                count = array.count,
                col = array.column,
                added = items.len(),
            ));
        }
    }

    for column in table.counters {
        if let Some(delta) = delta(update, column) {
            values.push(Value::from(delta));
            sets.push(format!("{0} = {0} + ?{1}", column, values.len()));
        }
    }

    for column in table.flags {
        if update.get(*column) == Some(&Value::Bool(true)) {
            sets.push(format!("{} = 1", column));
        }
    }

    for column in table.replaced {
        if let Some(value) = update.get(*column).filter(|v| !v.is_null()) {
            values.push(value.clone());
            sets.push(format!("{} = ?{}", column, values.len()));
        }
    }

    if sets.is_empty() {
        debug!("Empty update for {} in {}", user_uuid, table.table);
        return fetch(db, table, user_uuid).await;
    }

    let sql = format!(
        "UPDATE {table} SET {sets}, last_updated = ?{now} WHERE {key} = ?{uuid} RETURNING *",
        table = table.table,
        sets = sets.join(", "),
        now = values.len() + 1,
        key = KEY_COLUMN,
        uuid = values.len() + 2,
    );

    let mut query = sqlx::query_as::<_, T>(&sql);
    for value in &values {
        query = bind_value(query, value);
    }
    let row = query
        .bind(Utc::now())
        .bind(user_uuid)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Everything needed to serve `/data` for one accumulating table
#[derive(Debug, Clone, Copy)]
pub struct DataRoutes {
    pub table: AccumulatingTable,
    pub entry: Schema,
    pub update: Schema,
    /// Human-readable name used in error messages
    pub label: &'static str,
}

/// `PUT /data`, `GET /data/:uuid` and `PATCH /data/:uuid`
pub fn data_routes<T>(routes: &'static DataRoutes) -> Router<AppState>
where
    T: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Unpin + 'static,
{
    Router::new()
        .route(
            "/data",
            put(move |State(state): State<AppState>, JsonBody(body): JsonBody| {
                submit_data::<T>(state, routes, body)
            }),
        )
        .route(
            "/data/:uuid",
            get(move |State(state): State<AppState>, Path(uuid): Path<String>| {
                get_data::<T>(state, routes, uuid)
            })
            .patch(
                move |State(state): State<AppState>,
                      Path(uuid): Path<String>,
                      JsonBody(body): JsonBody| {
                    update_data::<T>(state, routes, uuid, body)
                },
            ),
        )
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn submit_data<T>(state: AppState, routes: &'static DataRoutes, body: Value) -> Response
where
    T: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Unpin,
{
    let entry = match routes.entry.validate(&body) {
        Ok(entry) => entry,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Malformed data submission"),
    };
    let user_uuid = entry.get(KEY_COLUMN).and_then(Value::as_str).unwrap_or_default();

    match submit::<T>(&state.db, &routes.table, user_uuid, entry).await {
        Ok(row) => Json(json!({ "response": row })).into_response(),
        Err(e) => {
            error!("Failed to submit {} data for {}: {}", routes.label, user_uuid, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error creating {} entry", routes.label),
            )
        }
    }
}

async fn get_data<T>(state: AppState, routes: &'static DataRoutes, uuid: String) -> Response
where
    T: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Unpin,
{
    match fetch::<T>(&state.db, &routes.table, &uuid).await {
        Ok(Some(row)) => Json(json!({ "response": row })).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Specified user data does not exist"),
        Err(e) => {
            error!("Failed to read {} data for {}: {}", routes.label, uuid, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error retrieving user data")
        }
    }
}

async fn update_data<T>(
    state: AppState,
    routes: &'static DataRoutes,
    uuid: String,
    body: Value,
) -> Response
where
    T: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Unpin,
{
    let update = match routes.update.validate(&body) {
        Ok(update) => update,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Malformed update submission"),
    };

    match accumulate::<T>(&state.db, &routes.table, &uuid, update).await {
        Ok(Some(row)) => Json(json!({ "response": row })).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Specified user data does not exist"),
        Err(e) => {
            error!("Failed to update {} data for {}: {}", routes.label, uuid, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error updating user data")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_delta_is_ignored() {
        let update = json!({"delta_app_time_ms": 0, "delta_info_time_ms": 250});
        let update = update.as_object().unwrap();
        assert_eq!(delta(update, "app_time_ms"), None);
        assert_eq!(delta(update, "info_time_ms"), Some(250));
        assert_eq!(delta(update, "video_time_ms"), None);
    }
}
