// Testing utilities for the domain layer
// This module is only available when the "mock" feature is enabled

use std::sync::Arc;

use chrono::Utc;

use mama_plus_data::database::{open_pool, DatabaseConfig};
use mama_plus_data::repository::{SqliteStorage, Storage};

pub use crate::scheduler::MockReminderScheduler;
use crate::scheduler::{RunSummary, SchedulerError, SchedulerStatus};
use crate::SharedStorage;

/// Fresh in-memory SQLite storage with its schema in place
pub async fn in_memory_storage() -> Result<SharedStorage, mama_plus_data::repository::RepositoryError> {
    let storage = SqliteStorage::new(open_pool(&DatabaseConfig::in_memory())?);
    storage.ensure_schema().await?;
    Ok(Arc::new(storage))
}

fn idle_status() -> SchedulerStatus {
    SchedulerStatus {
        running: false,
        interval_secs: 0,
        last_run: None,
        run_count: 0,
        last_summary: None,
        jobs: Vec::new(),
    }
}

/// Mock scheduler whose every call succeeds
pub fn healthy_scheduler() -> MockReminderScheduler {
    let mut mock = MockReminderScheduler::new();
    mock.expect_start().returning(|| Ok(()));
    mock.expect_stop().returning(|| Ok(()));
    mock.expect_status().returning(idle_status);
    mock.expect_run_once().returning(|| {
        Ok(RunSummary {
            started_at: Utc::now(),
            ..RunSummary::default()
        })
    });
    mock
}

/// Mock scheduler whose `start` and `stop` return errors
pub fn failing_scheduler() -> MockReminderScheduler {
    let mut mock = MockReminderScheduler::new();
    mock.expect_start()
        .returning(|| Err(SchedulerError::Task("scheduler backend unavailable".to_string())));
    mock.expect_stop()
        .returning(|| Err(SchedulerError::Task("scheduler backend unavailable".to_string())));
    mock.expect_status().returning(idle_status);
    mock
}

/// Mock scheduler whose `start` and `stop` panic
pub fn panicking_scheduler() -> MockReminderScheduler {
    let mut mock = MockReminderScheduler::new();
    mock.expect_start().returning(|| panic!("scheduler start panicked"));
    mock.expect_stop().returning(|| panic!("scheduler stop panicked"));
    mock.expect_status().returning(idle_status);
    mock
}
