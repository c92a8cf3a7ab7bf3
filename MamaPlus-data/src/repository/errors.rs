use thiserror::Error;

use crate::database::DatabaseError;
use crate::models::UnknownVariant;

/// Error type for repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique constraint violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Not found error
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// CSV encoding or decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored label that no longer maps to a known variant
    #[error("Corrupt record: {0}")]
    Corrupt(#[from] UnknownVariant),
}

impl RepositoryError {
    pub fn not_found(kind: &str, id: i64) -> Self {
        RepositoryError::NotFound(format!("{} {}", kind, id))
    }
}
