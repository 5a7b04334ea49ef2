//! Measurement, galaxy and waiting-room queries

use chrono::Utc;
use cosmicds_common::Result;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use super::models::{Galaxy, HubbleMeasurement, MeasurementValues, SampleHubbleMeasurement};
use crate::db::students;
use crate::results::{RemoveHubbleMeasurementResult, SubmitHubbleMeasurementResult};

const MEASUREMENT_SELECT: &str = r#"
    SELECT m.*, g.id, g.ra, g.decl, g.z, g.type, g.name, g.element
    FROM hubble_measurements m
    INNER JOIN galaxies g ON g.id = m.galaxy_id
"#;

const SAMPLE_MEASUREMENT_SELECT: &str = r#"
    SELECT m.*, g.id, g.ra, g.decl, g.z, g.type, g.name, g.element
    FROM sample_hubble_measurements m
    INNER JOIN galaxies g ON g.id = m.galaxy_id
"#;

/// Values a submission may set. Each binds as (value, was-sent flag);
/// `brightness` follows them.
const VALUE_COLUMNS: [&str; 10] = [
    "rest_wave_value",
    "rest_wave_unit",
    "obs_wave_value",
    "obs_wave_unit",
    "velocity_value",
    "velocity_unit",
    "ang_size_value",
    "ang_size_unit",
    "est_dist_value",
    "est_dist_unit",
];

/// A complete measurement has every derived quantity filled in
pub const COMPLETE_CONDITION: &str = "m.obs_wave_value IS NOT NULL \
    AND m.velocity_value IS NOT NULL \
    AND m.ang_size_value IS NOT NULL \
    AND m.est_dist_value IS NOT NULL";

/// Galaxies that may be handed out to students
const USABLE_GALAXY: &str = "g.is_bad = 0 AND g.spec_is_bad = 0 AND g.is_sample = 0";

/// IDs of the galaxies added in the second catalogue batch
const NEW_GALAXY_IDS: (i64, i64) = (1388, 1788);

/// Upsert keyed on `key_columns`. Keys missing from the submission keep
/// what is stored; keys sent as `null` clear it.
fn upsert_sql(table: &str, key_columns: &[&str]) -> String {
    let offset = key_columns.len();
    let value_slot = |i: usize| offset + 2 * i + 1;
    let brightness = value_slot(VALUE_COLUMNS.len());
    let now = brightness + 1;

    let columns: Vec<&str> = key_columns
        .iter()
        .copied()
        .chain(VALUE_COLUMNS)
        .chain(["brightness", "last_modified"])
        .collect();
    let placeholders: Vec<String> = (1..=offset)
        .chain((0..VALUE_COLUMNS.len()).map(value_slot))
        .map(|i| format!("?{}", i))
        .chain([format!("COALESCE(?{}, 1)", brightness), format!("?{}", now)])
        .collect();
    let updates: Vec<String> = VALUE_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, column)| {
            format!(
                "{0} = CASE WHEN ?{2} THEN ?{1} ELSE {0} END",
                column,
                value_slot(i),
                value_slot(i) + 1
            )
        })
        .chain([
            format!("brightness = COALESCE(?{}, brightness)", brightness),
            format!("last_modified = ?{}", now),
        ])
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        key_columns.join(", "),
        updates.join(", ")
    )
}

fn bind_values<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: &'q MeasurementValues,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let number = |field: Option<Option<f64>>| (field.flatten(), field.is_some());
    let text = |field: &Option<Option<String>>| (field.clone().flatten(), field.is_some());

    [
        (number(values.rest_wave_value), text(&values.rest_wave_unit)),
        (number(values.obs_wave_value), text(&values.obs_wave_unit)),
        (number(values.velocity_value), text(&values.velocity_unit)),
        (number(values.ang_size_value), text(&values.ang_size_unit)),
        (number(values.est_dist_value), text(&values.est_dist_unit)),
    ]
    .into_iter()
    .fold(query, |query, ((value, value_sent), (unit, unit_sent))| {
        query.bind(value).bind(value_sent).bind(unit).bind(unit_sent)
    })
    .bind(values.brightness)
    .bind(Utc::now())
}

/// Checks shared by both submission kinds. `galaxy_id` 0 means the
/// submitted galaxy name matched nothing.
async fn check_submission(
    db: &SqlitePool,
    student_id: i64,
    galaxy_id: i64,
) -> Result<Option<SubmitHubbleMeasurementResult>> {
    if students::find_by_id(db, student_id).await?.is_none() {
        return Ok(Some(SubmitHubbleMeasurementResult::NoSuchStudent));
    }
    if galaxy_id == 0 || galaxy_by_id(db, galaxy_id).await?.is_none() {
        return Ok(Some(SubmitHubbleMeasurementResult::NoSuchGalaxy));
    }
    Ok(None)
}

pub async fn submit_measurement(
    db: &SqlitePool,
    student_id: i64,
    galaxy_id: i64,
    values: &MeasurementValues,
) -> Result<SubmitHubbleMeasurementResult> {
    debug!("Submitting measurement for student {}, galaxy {}", student_id, galaxy_id);

    if let Some(rejected) = check_submission(db, student_id, galaxy_id).await? {
        return Ok(rejected);
    }

    let mut tx = db.begin().await?;
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM hubble_measurements WHERE student_id = ? AND galaxy_id = ?)",
    )
    .bind(student_id)
    .bind(galaxy_id)
    .fetch_one(&mut *tx)
    .await?;

    let sql = upsert_sql("hubble_measurements", &["student_id", "galaxy_id"]);
    bind_values(sqlx::query(&sql).bind(student_id).bind(galaxy_id), values)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(if exists {
        SubmitHubbleMeasurementResult::MeasurementUpdated
    } else {
        SubmitHubbleMeasurementResult::MeasurementCreated
    })
}

pub async fn submit_sample_measurement(
    db: &SqlitePool,
    student_id: i64,
    galaxy_id: i64,
    measurement_number: &str,
    values: &MeasurementValues,
) -> Result<SubmitHubbleMeasurementResult> {
    if let Some(rejected) = check_submission(db, student_id, galaxy_id).await? {
        return Ok(rejected);
    }

    let mut tx = db.begin().await?;
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sample_hubble_measurements
            WHERE student_id = ? AND galaxy_id = ? AND measurement_number = ?
        )
        "#,
    )
    .bind(student_id)
    .bind(galaxy_id)
    .bind(measurement_number)
    .fetch_one(&mut *tx)
    .await?;

    let sql = upsert_sql(
        "sample_hubble_measurements",
        &["student_id", "galaxy_id", "measurement_number"],
    );
    let query = sqlx::query(&sql)
        .bind(student_id)
        .bind(galaxy_id)
        .bind(measurement_number);
    bind_values(query, values).execute(&mut *tx).await?;
    tx.commit().await?;

    Ok(if exists {
        SubmitHubbleMeasurementResult::MeasurementUpdated
    } else {
        SubmitHubbleMeasurementResult::MeasurementCreated
    })
}

pub async fn measurement(
    db: &SqlitePool,
    student_id: i64,
    galaxy_id: i64,
) -> Result<Option<HubbleMeasurement>> {
    let sql = format!("{} WHERE m.student_id = ? AND m.galaxy_id = ?", MEASUREMENT_SELECT);
    let measurement = sqlx::query_as::<_, HubbleMeasurement>(&sql)
        .bind(student_id)
        .bind(galaxy_id)
        .fetch_optional(db)
        .await?;
    Ok(measurement)
}

pub async fn student_measurements(db: &SqlitePool, student_id: i64) -> Result<Vec<HubbleMeasurement>> {
    let sql = format!("{} WHERE m.student_id = ? ORDER BY m.galaxy_id", MEASUREMENT_SELECT);
    let measurements = sqlx::query_as::<_, HubbleMeasurement>(&sql)
        .bind(student_id)
        .fetch_all(db)
        .await?;
    Ok(measurements)
}

pub async fn remove_measurement(
    db: &SqlitePool,
    student_id: i64,
    galaxy_id: i64,
) -> Result<RemoveHubbleMeasurementResult> {
    let result = sqlx::query("DELETE FROM hubble_measurements WHERE student_id = ? AND galaxy_id = ?")
        .bind(student_id)
        .bind(galaxy_id)
        .execute(db)
        .await?;
    Ok(removal_result(result.rows_affected()))
}

pub async fn sample_measurements(
    db: &SqlitePool,
    student_id: i64,
) -> Result<Vec<SampleHubbleMeasurement>> {
    let sql = format!(
        "{} WHERE m.student_id = ? ORDER BY m.measurement_number",
        SAMPLE_MEASUREMENT_SELECT
    );
    let measurements = sqlx::query_as::<_, SampleHubbleMeasurement>(&sql)
        .bind(student_id)
        .fetch_all(db)
        .await?;
    Ok(measurements)
}

pub async fn sample_measurement(
    db: &SqlitePool,
    student_id: i64,
    measurement_number: &str,
) -> Result<Option<SampleHubbleMeasurement>> {
    let sql = format!(
        "{} WHERE m.student_id = ? AND m.measurement_number = ?",
        SAMPLE_MEASUREMENT_SELECT
    );
    let measurement = sqlx::query_as::<_, SampleHubbleMeasurement>(&sql)
        .bind(student_id)
        .bind(measurement_number)
        .fetch_optional(db)
        .await?;
    Ok(measurement)
}

/// Every sample measurement, optionally only complete ones
pub async fn all_sample_measurements(
    db: &SqlitePool,
    complete_only: bool,
) -> Result<Vec<SampleHubbleMeasurement>> {
    let sql = if complete_only {
        format!(
            "{} WHERE {} ORDER BY m.student_id, m.measurement_number",
            SAMPLE_MEASUREMENT_SELECT, COMPLETE_CONDITION
        )
    } else {
        format!("{} ORDER BY m.student_id, m.measurement_number", SAMPLE_MEASUREMENT_SELECT)
    };
    let measurements = sqlx::query_as::<_, SampleHubbleMeasurement>(&sql)
        .fetch_all(db)
        .await?;
    Ok(measurements)
}

pub async fn nth_sample_measurements(
    db: &SqlitePool,
    measurement_number: &str,
) -> Result<Vec<SampleHubbleMeasurement>> {
    let sql = format!(
        "{} WHERE m.measurement_number = ? ORDER BY m.student_id",
        SAMPLE_MEASUREMENT_SELECT
    );
    let measurements = sqlx::query_as::<_, SampleHubbleMeasurement>(&sql)
        .bind(measurement_number)
        .fetch_all(db)
        .await?;
    Ok(measurements)
}

pub async fn remove_sample_measurement(
    db: &SqlitePool,
    student_id: i64,
    measurement_number: &str,
) -> Result<RemoveHubbleMeasurementResult> {
    let result = sqlx::query(
        "DELETE FROM sample_hubble_measurements WHERE student_id = ? AND measurement_number = ?",
    )
    .bind(student_id)
    .bind(measurement_number)
    .execute(db)
    .await?;
    Ok(removal_result(result.rows_affected()))
}

fn removal_result(rows_affected: u64) -> RemoveHubbleMeasurementResult {
    if rows_affected > 0 {
        RemoveHubbleMeasurementResult::MeasurementDeleted
    } else {
        RemoveHubbleMeasurementResult::NoSuchMeasurement
    }
}

// ================================================================================
// Galaxies
// ================================================================================

/// Usable galaxies, optionally restricted to the given morphological types
pub async fn galaxies(db: &SqlitePool, types: Option<&[String]>) -> Result<Vec<Galaxy>> {
    let galaxies = match types {
        Some(types) => {
            let sql = format!(
                "SELECT g.* FROM galaxies g WHERE {} AND g.type IN (SELECT value FROM json_each(?)) ORDER BY g.id",
                USABLE_GALAXY
            );
            sqlx::query_as::<_, Galaxy>(&sql)
                .bind(Json(types))
                .fetch_all(db)
                .await?
        }
        None => {
            let sql = format!("SELECT g.* FROM galaxies g WHERE {} ORDER BY g.id", USABLE_GALAXY);
            sqlx::query_as::<_, Galaxy>(&sql).fetch_all(db).await?
        }
    };
    Ok(galaxies)
}

pub async fn galaxy_by_id(db: &SqlitePool, id: i64) -> Result<Option<Galaxy>> {
    let galaxy = sqlx::query_as::<_, Galaxy>("SELECT * FROM galaxies WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(galaxy)
}

pub async fn galaxy_by_name(db: &SqlitePool, name: &str) -> Result<Option<Galaxy>> {
    let galaxy = sqlx::query_as::<_, Galaxy>("SELECT * FROM galaxies WHERE name = ?")
        .bind(name)
        .fetch_optional(db)
        .await?;
    Ok(galaxy)
}

/// Catalogue names carry a `.fits` suffix
pub fn fits_name(name: &str) -> String {
    if name.ends_with(".fits") {
        name.to_string()
    } else {
        format!("{}.fits", name)
    }
}

/// The galaxy used for the guided sample measurement
pub async fn sample_galaxy(db: &SqlitePool) -> Result<Option<Galaxy>> {
    let galaxy = sqlx::query_as::<_, Galaxy>("SELECT * FROM galaxies WHERE is_sample = 1 ORDER BY id LIMIT 1")
        .fetch_optional(db)
        .await?;
    Ok(galaxy)
}

/// Problems students can report about a galaxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalaxyMark {
    Bad,
    SpectrumBad,
    TileloadBad,
}

impl GalaxyMark {
    fn column(self) -> &'static str {
        match self {
            GalaxyMark::Bad => "marked_bad",
            GalaxyMark::SpectrumBad => "spec_marked_bad",
            GalaxyMark::TileloadBad => "tileload_marked_bad",
        }
    }
}

/// Increment the report counter; each report counts
pub async fn mark_galaxy(db: &SqlitePool, galaxy_id: i64, mark: GalaxyMark) -> Result<bool> {
    let sql = format!("UPDATE galaxies SET {0} = {0} + 1 WHERE id = ?", mark.column());
    let result = sqlx::query(&sql).bind(galaxy_id).execute(db).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_spectrum_status(db: &SqlitePool, galaxy_id: i64, good: bool) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE galaxies
        SET spec_is_good = ?1, spec_is_bad = 1 - ?1, spec_checked = spec_checked + 1
        WHERE id = ?2
        "#,
    )
    .bind(i64::from(good))
    .bind(galaxy_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn unchecked_spectra_galaxies(db: &SqlitePool) -> Result<Vec<Galaxy>> {
    let galaxies = sqlx::query_as::<_, Galaxy>("SELECT * FROM galaxies WHERE spec_checked = 0 ORDER BY id")
        .fetch_all(db)
        .await?;
    Ok(galaxies)
}

pub async fn new_galaxies(db: &SqlitePool) -> Result<Vec<Galaxy>> {
    let galaxies = sqlx::query_as::<_, Galaxy>(
        r#"
        SELECT * FROM galaxies
        WHERE is_bad = 0 AND spec_is_bad = 0 AND id BETWEEN ? AND ?
        ORDER BY id
        "#,
    )
    .bind(NEW_GALAXY_IDS.0)
    .bind(NEW_GALAXY_IDS.1)
    .fetch_all(db)
    .await?;
    Ok(galaxies)
}

/// Usable galaxies of the given types, least measured first: galaxies
/// nobody has measured, then measured ones by ascending measurement count.
/// Only seeded or real students' measurements count.
pub async fn galaxies_for_data_generation(db: &SqlitePool, types: &[&str]) -> Result<Vec<Galaxy>> {
    let counted_measurements = r#"
        SELECT m.galaxy_id FROM hubble_measurements m
        INNER JOIN students s ON s.id = m.student_id
        WHERE s.seed = 1 OR s.dummy = 0
    "#;

    let unmeasured_sql = format!(
        r#"
        SELECT g.* FROM galaxies g
        WHERE {} AND g.type IN (SELECT value FROM json_each(?))
          AND g.id NOT IN ({})
        ORDER BY g.id DESC
        "#,
        USABLE_GALAXY, counted_measurements
    );
    let measured_sql = format!(
        r#"
        SELECT g.* FROM galaxies g
        INNER JOIN ({}) counted ON counted.galaxy_id = g.id
        WHERE {} AND g.type IN (SELECT value FROM json_each(?))
        GROUP BY g.id
        ORDER BY COUNT(*), g.id DESC
        "#,
        counted_measurements, USABLE_GALAXY
    );

    let mut galaxies = sqlx::query_as::<_, Galaxy>(&unmeasured_sql)
        .bind(Json(types))
        .fetch_all(db)
        .await?;
    let measured = sqlx::query_as::<_, Galaxy>(&measured_sql)
        .bind(Json(types))
        .fetch_all(db)
        .await?;
    galaxies.extend(measured);
    Ok(galaxies)
}

// ================================================================================
// Waiting room
// ================================================================================

/// Let a class skip the waiting room. Returns false when the override was
/// already set; an unknown class surfaces as a foreign-key error.
pub async fn set_waiting_room_override(db: &SqlitePool, class_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO hubble_waiting_room_overrides (class_id, timestamp)
        VALUES (?, ?)
        ON CONFLICT (class_id) DO NOTHING
        "#,
    )
    .bind(class_id)
    .bind(Utc::now())
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove_waiting_room_override(db: &SqlitePool, class_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM hubble_waiting_room_overrides WHERE class_id = ?")
        .bind(class_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_sql_numbering() {
        let sql = upsert_sql("hubble_measurements", &["student_id", "galaxy_id"]);
        assert!(sql.starts_with("INSERT INTO hubble_measurements (student_id, galaxy_id, rest_wave_value"));
        assert!(sql.contains("VALUES (?1, ?2, ?3, ?5, ?7"));
        assert!(sql.contains("?21, COALESCE(?23, 1), ?24)"));
        assert!(sql.contains("ON CONFLICT (student_id, galaxy_id)"));
        assert!(sql.contains("rest_wave_value = CASE WHEN ?4 THEN ?3 ELSE rest_wave_value END"));
        assert!(sql.contains("est_dist_unit = CASE WHEN ?22 THEN ?21 ELSE est_dist_unit END"));
        assert!(sql.contains("last_modified = ?24"));
    }

    #[test]
    fn test_fits_name() {
        assert_eq!(fits_name("J1234"), "J1234.fits");
        assert_eq!(fits_name("J1234.fits"), "J1234.fits");
    }
}
