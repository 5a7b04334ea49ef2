//! Common error types for CosmicDS

use thiserror::Error;

/// Common result type for CosmicDS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the CosmicDS crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying database error is a UNIQUE or PRIMARY KEY clash
    pub fn is_unique_violation(&self) -> bool {
        match self {
            #[cfg(feature = "sqlx")]
            Error::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// True when the underlying database error is a FOREIGN KEY failure
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            #[cfg(feature = "sqlx")]
            Error::Database(sqlx::Error::Database(db)) => db.is_foreign_key_violation(),
            _ => false,
        }
    }
}
