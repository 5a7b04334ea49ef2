//! Configuration loading and database path resolution
//!
//! Values resolve in priority order:
//! 1. Command-line argument or environment variable (clap merges these)
//! 2. TOML config file
//! 3. Compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Port the API listens on when nothing else is configured
pub const DEFAULT_PORT: u16 = 8081;

/// Log level used when nothing else is configured
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Origins accepted without an API key when none are configured
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://cosmicds.cfa.harvard.edu",
    "https://projects.cosmicds.cfa.harvard.edu",
    "https://www.cosmicds.cfa.harvard.edu",
    "https://cosmicds.github.io",
];

/// Contents of the optional `config.toml`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Load a TOML config file
    ///
    /// A missing file is not an error: a warning is logged and defaults are
    /// returned. A file that exists but does not parse is a config error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load from the platform config location if a file exists there
    pub fn load_default() -> Self {
        match default_config_file() {
            Some(path) if path.exists() => Self::load(&path).unwrap_or_else(|e| {
                warn!("{}", e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }
}

/// Fully resolved service settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
}

impl ServerConfig {
    /// Merge CLI/env values over TOML values over compiled defaults
    pub fn resolve(
        cli_port: Option<u16>,
        cli_database: Option<PathBuf>,
        cli_origins: Vec<String>,
        cli_log_level: Option<String>,
        toml: TomlConfig,
    ) -> Self {
        let database_path = cli_database
            .or(toml.database_path)
            .unwrap_or_else(default_database_path);

        let mut allowed_origins: Vec<String> = cli_origins
            .into_iter()
            .chain(toml.allowed_origins)
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        let mut seen = HashSet::new();
        allowed_origins.retain(|o| seen.insert(o.clone()));
        if allowed_origins.is_empty() {
            allowed_origins = DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect();
        }

        Self {
            port: cli_port.or(toml.port).unwrap_or(DEFAULT_PORT),
            database_path,
            allowed_origins,
            log_level: cli_log_level
                .or(toml.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}

/// Platform config file location (`~/.config/cosmicds/config.toml` on Linux)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cosmicds").join("config.toml"))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cosmicds"))
        .unwrap_or_else(|| PathBuf::from("./cosmicds_data"))
        .join("cosmicds.db")
}
