use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use mama_plus_data::models::{Cpn, CpnStatut, Rappel, RappelCanal, RappelStatut};
use mama_plus_data::repository::CpnFilter;

use crate::error::DomainError;
use crate::services::cpn::reminder_message;
use crate::SharedStorage;

use super::{RunSummary, MAX_LEAD_HOURS, MISSED_AFTER_HOURS};

/// Jobs executed by every pass, in order
pub const JOB_NAMES: [&str; 2] = ["rappels_cpn", "cpn_manquees"];

/// Run both jobs against `now`
pub async fn run_jobs(
    storage: &SharedStorage,
    now: DateTime<Utc>,
    lead_hours: i64,
) -> Result<RunSummary, DomainError> {
    let rappels_envoyes = send_due_reminders(storage, now, lead_hours).await?;
    let cpn_manquees = mark_missed(storage, now).await?;

    if rappels_envoyes > 0 || cpn_manquees > 0 {
        info!(
            "Reminder pass: {} reminder(s) sent, {} CPN marked missed",
            rappels_envoyes, cpn_manquees
        );
    } else {
        debug!("Reminder pass: nothing to do");
    }

    Ok(RunSummary {
        started_at: now,
        rappels_envoyes,
        cpn_manquees,
    })
}

async fn send_due_reminders(
    storage: &SharedStorage,
    now: DateTime<Utc>,
    lead_hours: i64,
) -> Result<usize, DomainError> {
    let horizon = now + Duration::hours(lead_hours.clamp(0, MAX_LEAD_HOURS));
    let due = storage
        .list_cpn(&CpnFilter::with_statut(CpnStatut::Planifie))
        .await?
        .into_iter()
        .filter(|cpn| !cpn.rappel_envoye && cpn.date_rdv >= now && cpn.date_rdv <= horizon)
        .collect();
    remind(storage, now, due).await
}

/// Record one SMS reminder for each CPN this call manages to claim
async fn remind(storage: &SharedStorage, now: DateTime<Utc>, due: Vec<Cpn>) -> Result<usize, DomainError> {
    let mut sent = 0;
    for cpn in due {
        // Another pass or a staff action may have handled it since the listing.
        if !storage.claim_cpn_reminder(cpn.id).await? {
            debug!("CPN {} already reminded or no longer planned", cpn.id);
            continue;
        }

        let patiente = storage.get_patiente(cpn.patiente_id).await?;
        storage
            .create_rappel(Rappel {
                id: 0,
                cpn_id: cpn.id,
                patiente_id: cpn.patiente_id,
                canal: RappelCanal::Sms,
                message: reminder_message(&cpn, patiente.as_ref()),
                statut: RappelStatut::Envoye,
                date_programmee: now,
                date_envoi: Some(now),
                created_at: now,
            })
            .await?;
        sent += 1;
    }
    Ok(sent)
}

async fn mark_missed(storage: &SharedStorage, now: DateTime<Utc>) -> Result<usize, DomainError> {
    let cutoff = now - Duration::hours(MISSED_AFTER_HOURS);
    let overdue = storage
        .list_cpn(&CpnFilter::with_statut(CpnStatut::Planifie))
        .await?
        .into_iter()
        .filter(|cpn| cpn.date_rdv < cutoff);

    let mut marked = 0;
    for cpn in overdue {
        if storage.mark_cpn_missed(cpn.id, cutoff).await? {
            marked += 1;
        }
    }
    Ok(marked)
}
