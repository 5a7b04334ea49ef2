//! Query functions for the core tables
//!
//! Story-specific tables are queried from their story modules.

pub mod api_keys;
pub mod classes;
pub mod educators;
pub mod options;
pub mod questions;
pub mod states;
pub mod stories;
pub mod students;
