//! Hubble's law row models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Catalogue attributes of a galaxy, without the quality flags
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GalaxyInfo {
    pub id: i64,
    pub ra: f64,
    pub decl: f64,
    pub z: f64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub galaxy_type: String,
    pub name: String,
    pub element: String,
}

/// Full galaxy row including quality-marking counters
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Galaxy {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub info: GalaxyInfo,
    pub marked_bad: i64,
    pub is_bad: i64,
    pub spec_marked_bad: i64,
    pub spec_is_bad: i64,
    pub spec_is_good: i64,
    pub spec_checked: i64,
    pub tileload_marked_bad: i64,
    pub is_sample: i64,
}

/// A student's measurement of one galaxy, with the galaxy attached
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HubbleMeasurement {
    pub student_id: i64,
    pub galaxy_id: i64,
    pub rest_wave_value: Option<f64>,
    pub rest_wave_unit: Option<String>,
    pub obs_wave_value: Option<f64>,
    pub obs_wave_unit: Option<String>,
    pub velocity_value: Option<f64>,
    pub velocity_unit: Option<String>,
    pub ang_size_value: Option<f64>,
    pub ang_size_unit: Option<String>,
    pub est_dist_value: Option<f64>,
    pub est_dist_unit: Option<String>,
    pub brightness: f64,
    pub last_modified: DateTime<Utc>,
    #[sqlx(flatten)]
    pub galaxy: GalaxyInfo,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SampleHubbleMeasurement {
    pub student_id: i64,
    pub galaxy_id: i64,
    pub measurement_number: String,
    pub rest_wave_value: Option<f64>,
    pub rest_wave_unit: Option<String>,
    pub obs_wave_value: Option<f64>,
    pub obs_wave_unit: Option<String>,
    pub velocity_value: Option<f64>,
    pub velocity_unit: Option<String>,
    pub ang_size_value: Option<f64>,
    pub ang_size_unit: Option<String>,
    pub est_dist_value: Option<f64>,
    pub est_dist_unit: Option<String>,
    pub brightness: f64,
    pub last_modified: DateTime<Utc>,
    #[sqlx(flatten)]
    pub galaxy: GalaxyInfo,
}

/// Measured quantities of a submission. The outer `Option` records whether
/// the key was sent at all; an explicit `null` is `Some(None)`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasurementValues {
    #[serde(default, deserialize_with = "present")]
    pub rest_wave_value: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub rest_wave_unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub obs_wave_value: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub obs_wave_unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub velocity_value: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub velocity_unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub ang_size_value: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub ang_size_unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub est_dist_value: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub est_dist_unit: Option<Option<String>>,
    /// Not nullable in storage, so `null` counts as absent
    pub brightness: Option<f64>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Sample measurements are taken twice
pub const MEASUREMENT_NUMBERS: [&str; 2] = ["first", "second"];

/// Fit result for one student, written by offline analysis
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HubbleStudentData {
    pub student_id: i64,
    pub hubble_fit_value: Option<f64>,
    pub hubble_fit_unit: Option<String>,
    pub age_value: Option<f64>,
    pub age_unit: Option<String>,
    pub last_data_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HubbleClassData {
    pub class_id: i64,
    pub hubble_fit_value: Option<f64>,
    pub hubble_fit_unit: Option<String>,
    pub age_value: Option<f64>,
    pub age_unit: Option<String>,
    pub last_data_update: DateTime<Utc>,
}

/// Measurement row of the all-data dump, tagged with the student's class
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClassTaggedMeasurement {
    pub student_id: i64,
    pub galaxy_id: i64,
    pub rest_wave_value: Option<f64>,
    pub rest_wave_unit: Option<String>,
    pub obs_wave_value: Option<f64>,
    pub obs_wave_unit: Option<String>,
    pub velocity_value: Option<f64>,
    pub velocity_unit: Option<String>,
    pub ang_size_value: Option<f64>,
    pub ang_size_unit: Option<String>,
    pub est_dist_value: Option<f64>,
    pub est_dist_unit: Option<String>,
    pub brightness: f64,
    pub last_modified: DateTime<Utc>,
    pub class_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinimalMeasurement {
    pub student_id: i64,
    pub galaxy_id: i64,
    pub velocity_value: Option<f64>,
    pub est_dist_value: Option<f64>,
    pub class_id: Option<i64>,
}

impl From<ClassTaggedMeasurement> for MinimalMeasurement {
    fn from(m: ClassTaggedMeasurement) -> Self {
        Self {
            student_id: m.student_id,
            galaxy_id: m.galaxy_id,
            velocity_value: m.velocity_value,
            est_dist_value: m.est_dist_value,
            class_id: m.class_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClassTaggedStudentData {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub data: HubbleStudentData,
    pub class_id: Option<i64>,
    pub seed: bool,
    pub dummy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinimalStudentData {
    pub student_id: i64,
    pub age_value: Option<f64>,
}

impl From<ClassTaggedStudentData> for MinimalStudentData {
    fn from(row: ClassTaggedStudentData) -> Self {
        Self {
            student_id: row.data.student_id,
            age_value: row.data.age_value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MinimalClassData {
    pub class_id: i64,
    pub age_value: Option<f64>,
}

impl From<HubbleClassData> for MinimalClassData {
    fn from(row: HubbleClassData) -> Self {
        Self {
            class_id: row.class_id,
            age_value: row.age_value,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MergeGroupMember {
    pub group_id: i64,
    pub class_id: i64,
    pub merge_order: i64,
}
