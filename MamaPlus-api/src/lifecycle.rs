//! Startup and shutdown hooks
//!
//! Scheduler failures never stop the service: errors and panics are logged
//! and swallowed.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{info, warn};

use mama_plus_domain::scheduler::ReminderScheduler;

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Start the reminder scheduler; returns whether it started
pub async fn on_startup(scheduler: &dyn ReminderScheduler) -> bool {
    match AssertUnwindSafe(async { scheduler.start().await }).catch_unwind().await {
        Ok(Ok(())) => {
            info!("✅ Scheduler de rappels automatiques démarré");
            true
        }
        Ok(Err(e)) => {
            warn!("⚠️ Erreur lors du démarrage du scheduler: {}", e);
            false
        }
        Err(payload) => {
            warn!("⚠️ Erreur lors du démarrage du scheduler: {}", panic_message(payload.as_ref()));
            false
        }
    }
}

/// Stop the reminder scheduler; returns whether it stopped cleanly
pub async fn on_shutdown(scheduler: &dyn ReminderScheduler) -> bool {
    match AssertUnwindSafe(async { scheduler.stop().await }).catch_unwind().await {
        Ok(Ok(())) => {
            info!("✅ Scheduler arrêté");
            true
        }
        Ok(Err(e)) => {
            warn!("⚠️ Erreur lors de l'arrêt du scheduler: {}", e);
            false
        }
        Err(payload) => {
            warn!("⚠️ Erreur lors de l'arrêt du scheduler: {}", panic_message(payload.as_ref()));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use mama_plus_domain::scheduler::NoopReminderScheduler;
    use mama_plus_domain::testing::{failing_scheduler, panicking_scheduler};

    use super::*;

    #[tokio::test]
    async fn test_noop_scheduler_starts_and_stops() {
        let scheduler = NoopReminderScheduler;
        assert!(on_shutdown(&scheduler).await);
        assert!(on_startup(&scheduler).await);
        assert!(on_shutdown(&scheduler).await);
    }

    #[tokio::test]
    async fn test_errors_are_swallowed() {
        let scheduler = failing_scheduler();
        assert!(!on_startup(&scheduler).await);
        assert!(!on_shutdown(&scheduler).await);
    }

    #[tokio::test]
    async fn test_panics_are_swallowed() {
        let scheduler = panicking_scheduler();
        assert!(!on_startup(&scheduler).await);
        assert!(!on_shutdown(&scheduler).await);
    }
}
