//! Hubble's law story
//!
//! Students measure galaxy spectra and sizes, derive velocities and
//! distances, and fit the Hubble constant against their class's combined
//! data. Owns the galaxy catalogue, the measurement tables and the class
//! merging that gives small classes enough data.

pub mod cohort;
pub mod db;
pub mod merge;
pub mod models;
pub mod routes;

use axum::Router;
use cosmicds_common::db::Class;
use cosmicds_common::Result;
use sqlx::{SqliteConnection, SqlitePool};

use super::Story;
use crate::AppState;

pub const STORY_NAME: &str = "hubbles_law";

pub struct HubblesLaw;

#[axum::async_trait]
impl Story for HubblesLaw {
    fn name(&self) -> &'static str {
        STORY_NAME
    }

    fn display_name(&self) -> &'static str {
        "Hubble's Law"
    }

    fn router(&self) -> Router<AppState> {
        routes::router()
    }

    async fn setup(&self, db: &SqlitePool) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(db).await?;
        }
        Ok(())
    }

    /// Asynchronous and small classes start out in a merge group
    async fn setup_class(&self, conn: &mut SqliteConnection, class: &Class) -> Result<()> {
        if class.asynchronous || class.is_small() {
            merge::add_class_to_merge_group(conn, class.id).await?;
        }
        Ok(())
    }
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS galaxies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        ra REAL NOT NULL,
        decl REAL NOT NULL,
        z REAL NOT NULL,
        type TEXT NOT NULL,
        element TEXT NOT NULL,
        marked_bad INTEGER NOT NULL DEFAULT 0,
        is_bad INTEGER NOT NULL DEFAULT 0,
        spec_marked_bad INTEGER NOT NULL DEFAULT 0,
        spec_is_bad INTEGER NOT NULL DEFAULT 0,
        spec_is_good INTEGER NOT NULL DEFAULT 0,
        spec_checked INTEGER NOT NULL DEFAULT 0,
        tileload_marked_bad INTEGER NOT NULL DEFAULT 0,
        is_sample INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS hubble_measurements (
        student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
        galaxy_id INTEGER NOT NULL REFERENCES galaxies(id),
        rest_wave_value REAL,
        rest_wave_unit TEXT,
        obs_wave_value REAL,
        obs_wave_unit TEXT,
        velocity_value REAL,
        velocity_unit TEXT,
        ang_size_value REAL,
        ang_size_unit TEXT,
        est_dist_value REAL,
        est_dist_unit TEXT,
        brightness REAL NOT NULL DEFAULT 1,
        last_modified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (student_id, galaxy_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sample_hubble_measurements (
        student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
        galaxy_id INTEGER NOT NULL REFERENCES galaxies(id),
        measurement_number TEXT NOT NULL DEFAULT 'first'
            CHECK (measurement_number IN ('first', 'second')),
        rest_wave_value REAL,
        rest_wave_unit TEXT,
        obs_wave_value REAL,
        obs_wave_unit TEXT,
        velocity_value REAL,
        velocity_unit TEXT,
        ang_size_value REAL,
        ang_size_unit TEXT,
        est_dist_value REAL,
        est_dist_unit TEXT,
        brightness REAL NOT NULL DEFAULT 1,
        last_modified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (student_id, galaxy_id, measurement_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS async_merged_hubble_student_classes (
        student_id INTEGER PRIMARY KEY REFERENCES students(id) ON DELETE CASCADE,
        class_id INTEGER REFERENCES classes(id) ON DELETE CASCADE,
        merged_class_id INTEGER NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
        merged TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_merged_hubble_classes (
        class_id INTEGER PRIMARY KEY REFERENCES classes(id) ON DELETE CASCADE,
        merged_class_id INTEGER NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
        merged TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS hubble_student_data (
        student_id INTEGER PRIMARY KEY REFERENCES students(id) ON DELETE CASCADE,
        hubble_fit_value REAL,
        hubble_fit_unit TEXT,
        age_value REAL,
        age_unit TEXT,
        last_data_update TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS hubble_class_data (
        class_id INTEGER PRIMARY KEY REFERENCES classes(id) ON DELETE CASCADE,
        hubble_fit_value REAL,
        hubble_fit_unit TEXT,
        age_value REAL,
        age_unit TEXT,
        last_data_update TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS hubble_class_merge_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id INTEGER NOT NULL,
        class_id INTEGER NOT NULL UNIQUE REFERENCES classes(id) ON DELETE CASCADE,
        merge_order INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_hubble_merge_groups_group ON hubble_class_merge_groups(group_id)",
    r#"
    CREATE TABLE IF NOT EXISTS hubble_waiting_room_overrides (
        class_id INTEGER PRIMARY KEY REFERENCES classes(id) ON DELETE CASCADE,
        timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
];
