//! Automatic CPN reminders
//!
//! A [`ReminderScheduler`] periodically sends reminders for upcoming
//! appointments and flags the ones that were missed. The application owns a
//! single scheduler handle and only starts and stops it from its lifecycle
//! hooks.

mod interval;
mod jobs;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use crate::error::DomainError;

pub use interval::IntervalReminderScheduler;
pub use jobs::{run_jobs, JOB_NAMES};

/// Default delay between two passes
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Default look-ahead for reminders
pub const DEFAULT_LEAD_HOURS: i64 = 48;

/// Largest accepted look-ahead, 30 days
pub const MAX_LEAD_HOURS: i64 = 720;

/// Planned appointments older than this are considered missed
pub const MISSED_AFTER_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler configuration error: {0}")]
    Config(String),

    #[error("Scheduler task failed: {0}")]
    Task(String),

    #[error("Reminder job failed: {0}")]
    Job(#[from] DomainError),
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// Appointments starting within this many hours get a reminder
    pub lead_hours: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            lead_hours: DEFAULT_LEAD_HOURS,
        }
    }
}

impl SchedulerConfig {
    /// Read `SCHEDULER_ENABLED`, `REMINDER_INTERVAL_SECS` and `REMINDER_LEAD_HOURS`
    pub fn from_env() -> Result<Self, SchedulerError> {
        let defaults = Self::default();

        let enabled = match std::env::var("SCHEDULER_ENABLED") {
            Ok(value) => match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(SchedulerError::Config(format!(
                        "SCHEDULER_ENABLED must be a boolean, got '{}'",
                        other
                    )))
                }
            },
            Err(_) => defaults.enabled,
        };

        let interval = match std::env::var("REMINDER_INTERVAL_SECS") {
            Ok(value) => {
                let secs: u64 = value.trim().parse().map_err(|_| {
                    SchedulerError::Config(format!("REMINDER_INTERVAL_SECS must be a number, got '{}'", value))
                })?;
                if secs == 0 {
                    return Err(SchedulerError::Config(
                        "REMINDER_INTERVAL_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            Err(_) => defaults.interval,
        };

        let lead_hours = match std::env::var("REMINDER_LEAD_HOURS") {
            Ok(value) => parse_lead_hours(&value)?,
            Err(_) => defaults.lead_hours,
        };

        Ok(Self {
            enabled,
            interval,
            lead_hours,
        })
    }
}

/// Parse a look-ahead in hours, 1 to [`MAX_LEAD_HOURS`]
fn parse_lead_hours(value: &str) -> Result<i64, SchedulerError> {
    let hours: i64 = value.trim().parse().map_err(|_| {
        SchedulerError::Config(format!("REMINDER_LEAD_HOURS must be a number, got '{}'", value))
    })?;
    if !(1..=MAX_LEAD_HOURS).contains(&hours) {
        return Err(SchedulerError::Config(format!(
            "REMINDER_LEAD_HOURS must be between 1 and {}, got {}",
            MAX_LEAD_HOURS, hours
        )));
    }
    Ok(hours)
}

/// Outcome of one pass over the jobs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub rappels_envoyes: usize,
    pub cpn_manquees: usize,
}

/// Snapshot of the scheduler state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub last_summary: Option<RunSummary>,
    pub jobs: Vec<String>,
}

/// Background reminder runner owned by the application
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    /// Spawn the periodic task; a no-op when already running
    async fn start(&self) -> Result<(), SchedulerError>;

    /// Stop the periodic task and wait for it; a no-op when not running
    async fn stop(&self) -> Result<(), SchedulerError>;

    async fn status(&self) -> SchedulerStatus;

    /// Run the jobs immediately
    async fn run_once(&self) -> Result<RunSummary, SchedulerError>;
}

/// Scheduler used when reminders are disabled
#[derive(Debug, Default)]
pub struct NoopReminderScheduler;

#[async_trait]
impl ReminderScheduler for NoopReminderScheduler {
    async fn start(&self) -> Result<(), SchedulerError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), SchedulerError> {
        Ok(())
    }

    async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: false,
            interval_secs: 0,
            last_run: None,
            run_count: 0,
            last_summary: None,
            jobs: Vec::new(),
        }
    }

    async fn run_once(&self) -> Result<RunSummary, SchedulerError> {
        Ok(RunSummary {
            started_at: Utc::now(),
            ..RunSummary::default()
        })
    }
}
