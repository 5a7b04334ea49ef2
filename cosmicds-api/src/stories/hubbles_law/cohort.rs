//! Class cohort aggregation
//!
//! A student sees the measurements of an *effective* class set: their own
//! class plus the class it was merged into. Asynchronous students are
//! merged individually, synchronous classes as a whole. Merge groups only
//! feed `/merged-classes` and never widen this set. Measurements are
//! selected by student membership in any class of the set, so a student
//! enrolled in more than one of those classes is still counted once.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use cosmicds_common::db::Class;
use cosmicds_common::Result;
use sqlx::types::Json;
use sqlx::SqlitePool;

use super::db::COMPLETE_CONDITION;
use super::models::{ClassTaggedMeasurement, ClassTaggedStudentData, HubbleClassData, HubbleMeasurement};
use super::STORY_NAME;

/// Class aggregates with fewer contributing students are withheld
pub const MIN_COHORT_SIZE: i64 = 15;

/// Complete measurements a student needs before counting as finished
pub const COMPLETE_MEASUREMENT_COUNT: usize = 5;

/// Class IDs whose measurements a student of `class` gets to see
pub async fn effective_class_ids(
    db: &SqlitePool,
    student_id: i64,
    class: Option<&Class>,
) -> Result<Vec<i64>> {
    let mut ids = Vec::new();

    let merged: Option<i64> = match class {
        None => {
            sqlx::query_scalar(
                "SELECT merged_class_id FROM async_merged_hubble_student_classes WHERE student_id = ? AND class_id IS NULL",
            )
            .bind(student_id)
            .fetch_optional(db)
            .await?
        }
        Some(class) if class.asynchronous => {
            ids.push(class.id);
            sqlx::query_scalar(
                "SELECT merged_class_id FROM async_merged_hubble_student_classes WHERE student_id = ? AND class_id = ?",
            )
            .bind(student_id)
            .bind(class.id)
            .fetch_optional(db)
            .await?
        }
        Some(class) => {
            ids.push(class.id);
            sqlx::query_scalar("SELECT merged_class_id FROM sync_merged_hubble_classes WHERE class_id = ?")
                .bind(class.id)
                .fetch_optional(db)
                .await?
        }
    };
    ids.extend(merged);

    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));
    Ok(ids)
}

/// Students a lesson pinned for this student's class view
/// (`class_data_students` in their story state). Empty means no restriction.
async fn class_data_students(db: &SqlitePool, student_id: i64) -> Result<Vec<i64>> {
    let listed: Option<Option<String>> = sqlx::query_scalar(
        r#"
        SELECT json_extract(story_state, '$.class_data_students')
        FROM story_states WHERE student_id = ? AND story_name = ?
        "#,
    )
    .bind(student_id)
    .bind(STORY_NAME)
    .fetch_optional(db)
    .await?;

    Ok(listed
        .flatten()
        .and_then(|text| serde_json::from_str::<Vec<i64>>(&text).ok())
        .unwrap_or_default())
}

async fn measurements_for_classes(
    db: &SqlitePool,
    student_id: i64,
    class_ids: &[i64],
    complete_only: bool,
) -> Result<Vec<HubbleMeasurement>> {
    let mut only_students = class_data_students(db, student_id).await?;
    if !only_students.is_empty() {
        only_students.push(student_id);
    }

    let sql = format!(
        r#"
        SELECT m.*, g.id, g.ra, g.decl, g.z, g.type, g.name, g.element
        FROM hubble_measurements m
        INNER JOIN galaxies g ON g.id = m.galaxy_id
        WHERE m.student_id IN (
            SELECT sc.student_id FROM students_classes sc
            WHERE sc.class_id IN (SELECT value FROM json_each(?1))
        )
        AND m.student_id NOT IN (SELECT student_id FROM ignore_students WHERE story_name = ?2)
        AND (json_array_length(?3) = 0 OR m.student_id IN (SELECT value FROM json_each(?3)))
        AND (?4 = 0 OR ({}))
        ORDER BY m.student_id, m.galaxy_id
        "#,
        COMPLETE_CONDITION
    );

    let measurements = sqlx::query_as::<_, HubbleMeasurement>(&sql)
        .bind(Json(class_ids))
        .bind(STORY_NAME)
        .bind(Json(&only_students))
        .bind(complete_only)
        .fetch_all(db)
        .await?;
    Ok(measurements)
}

/// Measurements of the student's effective class set. With `last_checked`
/// (epoch milliseconds), nothing is returned unless something changed
/// after that instant.
pub async fn class_measurements(
    db: &SqlitePool,
    student_id: i64,
    class: Option<&Class>,
    last_checked: Option<i64>,
    complete_only: bool,
) -> Result<Vec<HubbleMeasurement>> {
    let class_ids = effective_class_ids(db, student_id, class).await?;
    let measurements = measurements_for_classes(db, student_id, &class_ids, complete_only).await?;

    if let Some(last_checked) = last_checked {
        let newest = measurements
            .iter()
            .map(|m| m.last_modified.timestamp_millis())
            .max();
        if newest.map_or(true, |newest| newest <= last_checked) {
            return Ok(Vec::new());
        }
    }
    Ok(measurements)
}

pub async fn class_measurement_count(
    db: &SqlitePool,
    student_id: i64,
    class: Option<&Class>,
    complete_only: bool,
) -> Result<usize> {
    let class_ids = effective_class_ids(db, student_id, class).await?;
    let measurements = measurements_for_classes(db, student_id, &class_ids, complete_only).await?;
    Ok(measurements.len())
}

/// Students of the effective class set with enough complete measurements
pub async fn students_completed_count(
    db: &SqlitePool,
    student_id: i64,
    class: Option<&Class>,
) -> Result<usize> {
    let class_ids = effective_class_ids(db, student_id, class).await?;
    let measurements = measurements_for_classes(db, student_id, &class_ids, true).await?;
    Ok(completed_students(&measurements))
}

fn completed_students(measurements: &[HubbleMeasurement]) -> usize {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for measurement in measurements {
        *counts.entry(measurement.student_id).or_default() += 1;
    }
    counts
        .values()
        .filter(|&&count| count >= COMPLETE_MEASUREMENT_COUNT)
        .count()
}

// ================================================================================
// All-data dump
// ================================================================================

/// Filters of the all-data dump
#[derive(Debug, Clone, Copy, Default)]
pub struct AllDataFilter {
    /// Only rows last changed before this instant
    pub before: Option<DateTime<Utc>>,
    pub class_id: Option<i64>,
}

/// The class a row is reported under: the filtered class, otherwise the
/// student's most recently joined one
const STUDENT_CLASS: &str = r#"
    COALESCE(?3, (
        SELECT sc.class_id FROM students_classes sc
        WHERE sc.student_id = s.id
        ORDER BY sc.joined DESC, sc.class_id DESC
        LIMIT 1
    ))
"#;

/// Measurements of seeded or real (non-dummy) students that are not ignored
pub async fn all_measurements(
    db: &SqlitePool,
    filter: AllDataFilter,
) -> Result<Vec<ClassTaggedMeasurement>> {
    let sql = format!(
        r#"
        SELECT m.*, {} AS class_id
        FROM hubble_measurements m
        INNER JOIN students s ON s.id = m.student_id
        WHERE (s.seed = 1 OR s.dummy = 0)
        AND s.id NOT IN (SELECT student_id FROM ignore_students WHERE story_name = ?1)
        AND (?2 IS NULL OR m.last_modified < ?2)
        AND (?3 IS NULL OR s.id IN (SELECT student_id FROM students_classes WHERE class_id = ?3))
        ORDER BY m.student_id, m.galaxy_id
        "#,
        STUDENT_CLASS
    );

    let rows = sqlx::query_as::<_, ClassTaggedMeasurement>(&sql)
        .bind(STORY_NAME)
        .bind(filter.before)
        .bind(filter.class_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn all_student_data(
    db: &SqlitePool,
    filter: AllDataFilter,
) -> Result<Vec<ClassTaggedStudentData>> {
    let sql = format!(
        r#"
        SELECT d.*, {} AS class_id, s.seed, s.dummy
        FROM hubble_student_data d
        INNER JOIN students s ON s.id = d.student_id
        WHERE (s.seed = 1 OR s.dummy = 0)
        AND s.id NOT IN (SELECT student_id FROM ignore_students WHERE story_name = ?1)
        AND (?2 IS NULL OR d.last_data_update < ?2)
        AND (?3 IS NULL OR s.id IN (SELECT student_id FROM students_classes WHERE class_id = ?3))
        ORDER BY d.student_id
        "#,
        STUDENT_CLASS
    );

    let rows = sqlx::query_as::<_, ClassTaggedStudentData>(&sql)
        .bind(STORY_NAME)
        .bind(filter.before)
        .bind(filter.class_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Class fit results, only for classes with at least [`MIN_COHORT_SIZE`]
/// enrolled, non-ignored students who have measured something
pub async fn all_class_data(db: &SqlitePool, filter: AllDataFilter) -> Result<Vec<HubbleClassData>> {
    let rows = sqlx::query_as::<_, HubbleClassData>(
        r#"
        SELECT d.* FROM hubble_class_data d
        WHERE (?2 IS NULL OR d.last_data_update < ?2)
        AND (?3 IS NULL OR d.class_id = ?3)
        AND (
            SELECT COUNT(DISTINCT sc.student_id)
            FROM students_classes sc
            INNER JOIN hubble_measurements m ON m.student_id = sc.student_id
            WHERE sc.class_id = d.class_id
            AND sc.student_id NOT IN (SELECT student_id FROM ignore_students WHERE story_name = ?1)
        ) >= ?4
        ORDER BY d.class_id
        "#,
    )
    .bind(STORY_NAME)
    .bind(filter.before)
    .bind(filter.class_id)
    .bind(MIN_COHORT_SIZE)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stories::hubbles_law::models::GalaxyInfo;

    fn measurement(student_id: i64, galaxy_id: i64) -> HubbleMeasurement {
        HubbleMeasurement {
            student_id,
            galaxy_id,
            rest_wave_value: Some(6563.0),
            rest_wave_unit: Some("angstrom".into()),
            obs_wave_value: Some(6700.0),
            obs_wave_unit: Some("angstrom".into()),
            velocity_value: Some(6000.0),
            velocity_unit: Some("km / s".into()),
            ang_size_value: Some(40.0),
            ang_size_unit: Some("arcsecond".into()),
            est_dist_value: Some(100.0),
            est_dist_unit: Some("Mpc".into()),
            brightness: 1.0,
            last_modified: Utc::now(),
            galaxy: GalaxyInfo {
                id: galaxy_id,
                ra: 0.0,
                decl: 0.0,
                z: 0.02,
                galaxy_type: "Sp".into(),
                name: format!("galaxy{}.fits", galaxy_id),
                element: "H-alpha".into(),
            },
        }
    }

    #[test]
    fn test_completed_students_threshold() {
        let mut measurements: Vec<_> = (1..=5).map(|g| measurement(1, g)).collect();
        measurements.extend((1..=4).map(|g| measurement(2, g)));
        assert_eq!(completed_students(&measurements), 1);

        measurements.push(measurement(2, 5));
        assert_eq!(completed_students(&measurements), 2);
    }
}
