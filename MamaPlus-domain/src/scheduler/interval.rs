use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::SharedStorage;

use super::jobs::{run_jobs, JOB_NAMES};
use super::{ReminderScheduler, RunSummary, SchedulerConfig, SchedulerError, SchedulerStatus};

#[derive(Debug, Default)]
struct RunState {
    last_run: Option<DateTime<Utc>>,
    run_count: u64,
    last_summary: Option<RunSummary>,
}

struct Worker {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs the reminder jobs on a tokio interval
pub struct IntervalReminderScheduler {
    storage: SharedStorage,
    config: SchedulerConfig,
    state: Arc<Mutex<RunState>>,
    /// Held for a whole pass so timer ticks and manual runs never overlap
    pass_lock: Arc<Mutex<()>>,
    worker: Mutex<Option<Worker>>,
}

impl IntervalReminderScheduler {
    pub fn new(storage: SharedStorage, config: SchedulerConfig) -> Self {
        Self {
            storage,
            config,
            state: Arc::new(Mutex::new(RunState::default())),
            pass_lock: Arc::new(Mutex::new(())),
            worker: Mutex::new(None),
        }
    }

    async fn pass(
        storage: &SharedStorage,
        state: &Mutex<RunState>,
        pass_lock: &Mutex<()>,
        lead_hours: i64,
    ) -> Result<RunSummary, SchedulerError> {
        let _pass = pass_lock.lock().await;
        let summary = run_jobs(storage, Utc::now(), lead_hours).await?;
        let mut state = state.lock().await;
        state.last_run = Some(summary.started_at);
        state.run_count += 1;
        state.last_summary = Some(summary.clone());
        Ok(summary)
    }
}

#[async_trait]
impl ReminderScheduler for IntervalReminderScheduler {
    async fn start(&self) -> Result<(), SchedulerError> {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().map_or(false, |w| !w.handle.is_finished()) {
            return Ok(());
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let storage = self.storage.clone();
        let state = self.state.clone();
        let pass_lock = self.pass_lock.clone();
        let period = self.config.interval;
        let lead_hours = self.config.lead_hours;

        let handle = tokio::spawn(async move {
            info!(interval_secs = period.as_secs(), "Reminder scheduler started");
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = Self::pass(&storage, &state, &pass_lock, lead_hours).await {
                            error!(error = %e, "Reminder pass failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Reminder scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        *worker = Some(Worker { shutdown_tx, handle });
        Ok(())
    }

    async fn stop(&self) -> Result<(), SchedulerError> {
        let Some(worker) = self.worker.lock().await.take() else {
            return Ok(());
        };

        if worker.shutdown_tx.send(true).is_err() {
            warn!("Reminder scheduler task already exited");
        }
        worker
            .handle
            .await
            .map_err(|e| SchedulerError::Task(e.to_string()))
    }

    async fn status(&self) -> SchedulerStatus {
        let running = self
            .worker
            .lock()
            .await
            .as_ref()
            .map_or(false, |w| !w.handle.is_finished());
        let state = self.state.lock().await;

        SchedulerStatus {
            running,
            interval_secs: self.config.interval.as_secs(),
            last_run: state.last_run,
            run_count: state.run_count,
            last_summary: state.last_summary.clone(),
            jobs: JOB_NAMES.iter().map(|name| name.to_string()).collect(),
        }
    }

    async fn run_once(&self) -> Result<RunSummary, SchedulerError> {
        Self::pass(&self.storage, &self.state, &self.pass_lock, self.config.lead_hours).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;

    use mama_plus_data::database::{open_pool, DatabaseConfig};
    use mama_plus_data::models::{Cpn, Patiente};
    use mama_plus_data::repository::{CsvStorage, SqliteStorage, Storage};

    use super::*;

    async fn scheduler(interval: Duration) -> IntervalReminderScheduler {
        let storage = SqliteStorage::new(open_pool(&DatabaseConfig::in_memory()).unwrap());
        storage.ensure_schema().await.unwrap();
        IntervalReminderScheduler::new(
            Arc::new(storage),
            SchedulerConfig {
                enabled: true,
                interval,
                lead_hours: 48,
            },
        )
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let scheduler = scheduler(Duration::from_secs(3600)).await;
        scheduler.stop().await.unwrap();
        assert!(!scheduler.status().await.running);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_joins() {
        let scheduler = scheduler(Duration::from_secs(3600)).await;
        scheduler.start().await.unwrap();
        scheduler.start().await.unwrap();
        assert!(scheduler.status().await.running);

        scheduler.stop().await.unwrap();
        scheduler.stop().await.unwrap();
        assert!(!scheduler.status().await.running);
    }

    #[tokio::test]
    async fn test_ticks_run_passes() {
        let scheduler = scheduler(Duration::from_millis(20)).await;
        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop().await.unwrap();

        let status = scheduler.status().await;
        assert!(status.run_count >= 1);
        assert!(status.last_run.is_some());
        assert_eq!(status.jobs, vec!["rappels_cpn", "cpn_manquees"]);
    }

    #[tokio::test]
    async fn test_run_once_updates_status() {
        let scheduler = scheduler(Duration::from_secs(3600)).await;
        let summary = scheduler.run_once().await.unwrap();
        let status = scheduler.status().await;
        assert_eq!(status.run_count, 1);
        assert_eq!(status.last_summary, Some(summary));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_send_each_reminder_once() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CsvStorage::new(dir.path());
        storage.ensure_schema().await.unwrap();
        let storage: SharedStorage = Arc::new(storage);

        let now = Utc::now();
        let patiente = storage
            .create_patiente(Patiente {
                age: 30,
                gestite: 2,
                parite: 1,
                langue_preferee: "fr".to_string(),
                created_at: now,
                updated_at: now,
                ..Patiente::default()
            })
            .await
            .unwrap();
        for n in 0..10 {
            storage
                .create_cpn(Cpn {
                    patiente_id: patiente.id,
                    numero_cpn: n % 8 + 1,
                    date_rdv: now + ChronoDuration::hours(2 + i64::from(n)),
                    created_at: now,
                    ..Cpn::default()
                })
                .await
                .unwrap();
        }

        let scheduler = Arc::new(IntervalReminderScheduler::new(
            storage.clone(),
            SchedulerConfig {
                enabled: true,
                interval: Duration::from_secs(3600),
                lead_hours: 48,
            },
        ));
        let runs: Vec<_> = (0..3)
            .map(|_| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move { scheduler.run_once().await.unwrap() })
            })
            .collect();

        let mut sent = 0;
        for run in runs {
            sent += run.await.unwrap().rappels_envoyes;
        }
        assert_eq!(sent, 10);
        assert_eq!(storage.list_rappels(None).await.unwrap().len(), 10);
        assert_eq!(scheduler.status().await.run_count, 3);
    }
}
