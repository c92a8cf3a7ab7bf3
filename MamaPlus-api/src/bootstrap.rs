//! Storage and state construction, run before the listener is bound

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use mama_plus_data::database::{connection_info, open_pool, DatabaseError};
use mama_plus_data::repository::{CsvStorage, RepositoryError, SqliteStorage};
use mama_plus_domain::scheduler::{IntervalReminderScheduler, NoopReminderScheduler, ReminderScheduler};
use mama_plus_domain::SharedStorage;

use crate::config::{AppConfig, StorageKind};
use crate::state::AppState;

/// Startup failure that prevents the service from serving
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Failed to open the database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to prepare storage: {0}")]
    Storage(#[from] RepositoryError),
}

/// Open the configured storage and make sure its schema exists
pub async fn init_storage(kind: &StorageKind) -> Result<SharedStorage, BootstrapError> {
    let storage: SharedStorage = match kind {
        StorageKind::Sqlite(config) => {
            let pool = open_pool(config).map_err(|e| {
                error!("Failed to initialize database pool: {}", e);
                e
            })?;
            info!("Database pool ready: {}", connection_info(&pool));
            Arc::new(SqliteStorage::new(pool))
        }
        StorageKind::Csv { dir } => {
            info!("Using CSV storage in {}", dir.display());
            Arc::new(CsvStorage::new(dir.clone()))
        }
    };

    storage.ensure_schema().await.map_err(|e| {
        error!("Failed to initialize {} schema: {}", storage.backend().as_str(), e);
        e
    })?;
    info!("{} storage initialized", storage.backend().as_str());
    Ok(storage)
}

/// Build the application state from the configuration
pub async fn build_state(config: &AppConfig) -> Result<AppState, BootstrapError> {
    let storage = init_storage(&config.storage).await?;

    let scheduler: Arc<dyn ReminderScheduler> = if config.scheduler.enabled {
        Arc::new(IntervalReminderScheduler::new(storage.clone(), config.scheduler.clone()))
    } else {
        info!("Reminder scheduler disabled");
        Arc::new(NoopReminderScheduler)
    };

    Ok(AppState::new(
        config.variant(),
        storage,
        config.tokens.clone(),
        scheduler,
    ))
}
