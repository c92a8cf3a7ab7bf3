//! SQLite connection management for the relational storage backend
//!
//! The pool is created once at startup and handed to the storage layer
//! explicitly. Failing to open it is fatal: there is no silent fallback.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;
use tracing::{debug, error, info};

/// Shared SQLite connection pool
pub type DatabasePool = Arc<r2d2::Pool<SqliteConnectionManager>>;

/// Database error
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// SQLite connection pool error
    #[error("SQLite connection pool error: {0}")]
    SqlitePoolError(#[from] r2d2::Error),

    /// Filesystem error while preparing the database location
    #[error("Failed to prepare database directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Migration error
    #[error("Database migration error: {0}")]
    MigrationError(String),
}

/// Where the SQLite database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    /// A database file on disk
    File(PathBuf),
    /// A private in-memory database, used by tests
    Memory,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Location of the SQLite database
    pub location: SqliteLocation,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            location: SqliteLocation::File(PathBuf::from("data/mama_plus.db")),
            max_connections: 10,
            timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration from environment variables
    ///
    /// `DB_SQLITE_PATH` overrides `default_path`; `DB_MAX_CONNECTIONS` and
    /// `DB_TIMEOUT_SECONDS` must be numbers when present.
    pub fn from_env(default_path: impl Into<PathBuf>) -> Result<Self, DatabaseError> {
        let path = env::var("DB_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_path.into());

        let max_connections = parse_env("DB_MAX_CONNECTIONS", 10u32)?;
        let timeout_seconds = parse_env("DB_TIMEOUT_SECONDS", 30u64)?;

        if max_connections == 0 {
            return Err(DatabaseError::ConfigError(
                "DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }

        info!(
            "Database configuration: path={}, max_connections={}, timeout={}s",
            path.display(),
            max_connections,
            timeout_seconds
        );

        Ok(Self {
            location: SqliteLocation::File(path),
            max_connections,
            timeout_seconds,
        })
    }

    /// Configuration for a single-connection in-memory database
    pub fn in_memory() -> Self {
        Self {
            location: SqliteLocation::Memory,
            max_connections: 1,
            timeout_seconds: 5,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, DatabaseError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| DatabaseError::ConfigError(format!("{} must be a number, got {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

/// Open the SQLite connection pool and check that a connection can be made
pub fn open_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    let manager = match &config.location {
        SqliteLocation::File(path) => {
            info!("Initializing SQLite database at: {}", path.display());
            ensure_parent_dir(path)?;
            SqliteConnectionManager::file(path)
                .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
        }
        SqliteLocation::Memory => {
            info!("Initializing in-memory SQLite database");
            SqliteConnectionManager::memory()
        }
    }
    .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

    let mut builder = r2d2::Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(config.timeout_seconds));

    // Every in-memory connection is its own database, so the single
    // connection must never be recycled.
    if config.location == SqliteLocation::Memory {
        builder = builder.idle_timeout(None).max_lifetime(None);
    }

    let pool = builder.build(manager).map_err(|e| {
        error!("Failed to create SQLite connection pool: {}", e);
        DatabaseError::SqlitePoolError(e)
    })?;

    // Test connection to make sure it works
    let conn = pool.get()?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    drop(conn);

    debug!("SQLite connection pool created successfully");
    Ok(Arc::new(pool))
}

fn ensure_parent_dir(path: &Path) -> Result<(), DatabaseError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            info!("Creating parent directory: {}", parent.display());
            fs::create_dir_all(parent).map_err(|source| DatabaseError::Io {
                path: parent.display().to_string(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Describe the pool for startup logs
pub fn connection_info(pool: &DatabasePool) -> String {
    let state = pool.state();
    let location = pool
        .get()
        .ok()
        .and_then(|conn| {
            conn.query_row("PRAGMA database_list", [], |row| row.get::<_, String>(2))
                .ok()
        })
        .map(|path| {
            if path.is_empty() {
                "SQLite in-memory database".to_string()
            } else {
                format!("SQLite database at {}", path)
            }
        })
        .unwrap_or_else(|| "SQLite database (path unknown)".to_string());

    format!(
        "{} (connections: active={}, idle={})",
        location, state.connections, state.idle_connections
    )
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(
            config.location,
            SqliteLocation::File(PathBuf::from("data/mama_plus.db"))
        );
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_open_in_memory_pool() {
        let pool = open_pool(&DatabaseConfig::in_memory()).unwrap();
        assert!(connection_info(&pool).contains("in-memory"));
    }

    #[test]
    fn test_open_pool_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mama.db");
        let config = DatabaseConfig {
            location: SqliteLocation::File(path.clone()),
            ..DatabaseConfig::default()
        };

        open_pool(&config).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_pool_fails_when_directory_cannot_be_created() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot act as a parent directory.
        let path = file.path().join("sub").join("mama.db");
        let config = DatabaseConfig {
            location: SqliteLocation::File(path),
            ..DatabaseConfig::default()
        };

        assert!(open_pool(&config).is_err());
    }
}
