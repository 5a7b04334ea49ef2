//! # CosmicDS Common Library
//!
//! Shared code for the CosmicDS API service:
//! - Database bootstrap and core row models
//! - Configuration loading
//! - Credential hashing and code generation

pub mod auth;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
