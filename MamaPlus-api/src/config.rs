//! Runtime configuration read from the environment

use std::path::PathBuf;

use thiserror::Error;

use mama_plus_data::database::{DatabaseConfig, DatabaseError};
use mama_plus_domain::auth::{SecurityError, TokenConfig};
use mama_plus_domain::scheduler::{SchedulerConfig, SchedulerError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Which storage the application runs on
#[derive(Debug, Clone)]
pub enum StorageKind {
    Sqlite(DatabaseConfig),
    Csv { dir: PathBuf },
}

/// Service flavour, decided by the storage in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppVariant {
    Database,
    Csv,
}

impl AppVariant {
    pub fn title(&self) -> &'static str {
        match self {
            AppVariant::Database => "MAMA+ API",
            AppVariant::Csv => "MAMA+ API (CSV Storage)",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            AppVariant::Database => "1.0.0",
            AppVariant::Csv => "2.0.0",
        }
    }

    pub fn welcome(&self) -> &'static str {
        match self {
            AppVariant::Database => "Bienvenue sur l'API MAMA+",
            AppVariant::Csv => "Bienvenue sur l'API MAMA+ (Version CSV)",
        }
    }
}

impl StorageKind {
    pub fn variant(&self) -> AppVariant {
        match self {
            StorageKind::Sqlite(_) => AppVariant::Database,
            StorageKind::Csv { .. } => AppVariant::Csv,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageKind,
    pub scheduler: SchedulerConfig,
    pub tokens: TokenConfig,
}

impl AppConfig {
    /// Build the configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match std::env::var("PORT") {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value })?,
            Err(_) => 8000,
        };

        let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());
        let storage = match backend.trim().to_lowercase().as_str() {
            "sqlite" => StorageKind::Sqlite(DatabaseConfig::from_env(data_dir.join("mama_plus.db"))?),
            "csv" => StorageKind::Csv {
                dir: std::env::var("CSV_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data_dir.join("csv")),
            },
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "STORAGE_BACKEND",
                    value: backend,
                })
            }
        };

        Ok(Self {
            host,
            port,
            storage,
            scheduler: SchedulerConfig::from_env()?,
            tokens: TokenConfig::from_env()?,
        })
    }

    pub fn variant(&self) -> AppVariant {
        self.storage.variant()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
