use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use mama_plus_data::models::{Cpn, CpnStatut, Patiente, RappelStatut};
use mama_plus_data::repository::CpnFilter;

use crate::error::DomainError;
use crate::SharedStorage;

/// Aggregate counters shown on the staff dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct DashboardStats {
    pub total_patientes: usize,
    pub cpn_planifiees: usize,
    pub cpn_aujourd_hui: usize,
    pub cpn_manquees: usize,
    pub consultations_ce_mois: usize,
    pub vaccinations_total: usize,
    pub rappels_envoyes: usize,
}

/// Patient with her next planned appointment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct PatienteOverview {
    #[serde(flatten)]
    pub patiente: Patiente,
    pub prochaine_cpn: Option<Cpn>,
}

#[derive(Clone)]
pub struct DashboardService {
    storage: SharedStorage,
}

impl DashboardService {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    pub async fn stats(&self) -> Result<DashboardStats, DomainError> {
        self.stats_at(Utc::now()).await
    }

    /// Counters relative to `now`
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<DashboardStats, DomainError> {
        let today = now.date_naive();
        let cpn = self.storage.list_cpn(&CpnFilter::default()).await?;
        let planned = || cpn.iter().filter(|c| c.statut == CpnStatut::Planifie);

        let consultations_ce_mois = self
            .storage
            .list_consultations(None)
            .await?
            .iter()
            .filter(|c| {
                c.date_consultation.year() == now.year() && c.date_consultation.month() == now.month()
            })
            .count();

        let rappels_envoyes = self
            .storage
            .list_rappels(None)
            .await?
            .iter()
            .filter(|r| r.statut == RappelStatut::Envoye)
            .count();

        Ok(DashboardStats {
            total_patientes: self.storage.list_patientes().await?.len(),
            cpn_planifiees: planned().count(),
            cpn_aujourd_hui: planned().filter(|c| c.date_rdv.date_naive() == today).count(),
            cpn_manquees: cpn.iter().filter(|c| c.statut == CpnStatut::Manquee).count(),
            consultations_ce_mois,
            vaccinations_total: self.storage.list_vaccinations(None).await?.len(),
            rappels_envoyes,
        })
    }

    pub async fn patientes(&self) -> Result<Vec<PatienteOverview>, DomainError> {
        self.patientes_at(Utc::now()).await
    }

    /// Patients with the earliest `planifie` appointment after `now`
    pub async fn patientes_at(&self, now: DateTime<Utc>) -> Result<Vec<PatienteOverview>, DomainError> {
        // Listed by appointment date, so the first match is the next one.
        let upcoming: Vec<Cpn> = self
            .storage
            .list_cpn(&CpnFilter::with_statut(CpnStatut::Planifie))
            .await?
            .into_iter()
            .filter(|c| c.date_rdv >= now)
            .collect();

        Ok(self
            .storage
            .list_patientes()
            .await?
            .into_iter()
            .map(|patiente| PatienteOverview {
                prochaine_cpn: upcoming.iter().find(|c| c.patiente_id == patiente.id).cloned(),
                patiente,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    use mama_plus_data::models::{Consultation, Rappel, Vaccination};
    use mama_plus_data::repository::{CsvStorage, Storage};

    use super::*;

    #[tokio::test]
    async fn test_stats_and_overview() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CsvStorage::new(dir.path());
        storage.ensure_schema().await.unwrap();
        let storage: SharedStorage = Arc::new(storage);
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();

        let mut ids = Vec::new();
        for age in [20, 31] {
            let patiente = storage
                .create_patiente(Patiente {
                    age,
                    gestite: 1,
                    langue_preferee: "fr".to_string(),
                    created_at: now,
                    updated_at: now,
                    ..Patiente::default()
                })
                .await
                .unwrap();
            ids.push(patiente.id);
        }

        let cpn = |patiente_id, numero_cpn, date_rdv, statut| Cpn {
            patiente_id,
            numero_cpn,
            date_rdv,
            statut,
            created_at: now,
            ..Cpn::default()
        };
        storage.create_cpn(cpn(ids[0], 1, now - Duration::days(30), CpnStatut::Manquee)).await.unwrap();
        storage.create_cpn(cpn(ids[0], 2, now + Duration::hours(4), CpnStatut::Planifie)).await.unwrap();
        storage.create_cpn(cpn(ids[0], 3, now + Duration::days(28), CpnStatut::Planifie)).await.unwrap();
        let reminded = storage
            .create_cpn(cpn(ids[1], 1, now + Duration::days(2), CpnStatut::Complete))
            .await
            .unwrap();

        storage
            .create_consultation(Consultation {
                patiente_id: ids[1],
                date_consultation: now - Duration::days(3),
                created_at: now,
                ..Consultation::default()
            })
            .await
            .unwrap();
        storage
            .create_consultation(Consultation {
                patiente_id: ids[1],
                date_consultation: now - Duration::days(40),
                created_at: now,
                ..Consultation::default()
            })
            .await
            .unwrap();
        storage
            .create_vaccination(Vaccination {
                patiente_id: ids[1],
                type_vaccin: "VAT1".to_string(),
                date_vaccination: now.date_naive(),
                created_at: now,
                ..Vaccination::default()
            })
            .await
            .unwrap();
        storage
            .create_rappel(Rappel {
                cpn_id: reminded.id,
                patiente_id: ids[1],
                message: "rappel".to_string(),
                statut: RappelStatut::Envoye,
                date_programmee: now,
                created_at: now,
                ..Rappel::default()
            })
            .await
            .unwrap();

        let service = DashboardService::new(storage);
        let stats = service.stats_at(now).await.unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                total_patientes: 2,
                cpn_planifiees: 2,
                cpn_aujourd_hui: 1,
                cpn_manquees: 1,
                consultations_ce_mois: 1,
                vaccinations_total: 1,
                rappels_envoyes: 1,
            }
        );

        let overview = service.patientes_at(now).await.unwrap();
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].prochaine_cpn.as_ref().map(|c| c.numero_cpn), Some(2));
        assert!(overview[1].prochaine_cpn.is_none());
    }
}
