use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
#[cfg(feature = "with-api")]
use utoipa::ToSchema;
use validator::Validate;

use mama_plus_data::models::{Consultation, CpnStatut};

use crate::error::DomainError;
use crate::SharedStorage;

/// Consultation creation payload
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateConsultationRequest {
    pub patiente_id: i64,

    /// Appointment fulfilled by this consultation
    pub cpn_id: Option<i64>,

    /// Defaults to now
    pub date_consultation: Option<DateTime<Utc>>,

    #[validate(range(min = 20.0, max = 300.0, message = "poids must be between 20 and 300 kg"))]
    pub poids: Option<f64>,

    #[validate(range(min = 50, max = 260, message = "tension_arterielle_systolique must be between 50 and 260"))]
    pub tension_arterielle_systolique: Option<u32>,

    #[validate(range(min = 30, max = 180, message = "tension_arterielle_diastolique must be between 30 and 180"))]
    pub tension_arterielle_diastolique: Option<u32>,

    #[validate(range(min = 0.0, max = 60.0, message = "hauteur_uterine must be between 0 and 60 cm"))]
    pub hauteur_uterine: Option<f64>,

    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct ConsultationService {
    storage: SharedStorage,
}

impl ConsultationService {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    pub async fn list(&self, patiente_id: Option<i64>) -> Result<Vec<Consultation>, DomainError> {
        Ok(self.storage.list_consultations(patiente_id).await?)
    }

    pub async fn get(&self, id: i64) -> Result<Consultation, DomainError> {
        self.storage
            .get_consultation(id)
            .await?
            .ok_or_else(|| DomainError::not_found("consultation", id))
    }

    /// Record a consultation; a linked appointment becomes `complete`
    #[instrument(skip(self, request), fields(patiente_id = request.patiente_id))]
    pub async fn create(&self, request: CreateConsultationRequest) -> Result<Consultation, DomainError> {
        request.validate()?;
        if let (Some(sys), Some(dia)) = (
            request.tension_arterielle_systolique,
            request.tension_arterielle_diastolique,
        ) {
            if dia >= sys {
                return Err(DomainError::Validation(
                    "tension_arterielle_diastolique: diastolic must be lower than systolic".to_string(),
                ));
            }
        }

        self.storage
            .get_patiente(request.patiente_id)
            .await?
            .ok_or_else(|| DomainError::not_found("patiente", request.patiente_id))?;

        let cpn = match request.cpn_id {
            Some(cpn_id) => {
                let cpn = self
                    .storage
                    .get_cpn(cpn_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("cpn", cpn_id))?;
                if cpn.patiente_id != request.patiente_id {
                    return Err(DomainError::Validation(format!(
                        "cpn_id: cpn {} belongs to another patiente",
                        cpn_id
                    )));
                }
                Some(cpn)
            }
            None => None,
        };

        let now = Utc::now();
        let consultation = self
            .storage
            .create_consultation(Consultation {
                id: 0,
                patiente_id: request.patiente_id,
                cpn_id: request.cpn_id,
                date_consultation: request.date_consultation.unwrap_or(now),
                poids: request.poids,
                tension_arterielle_systolique: request.tension_arterielle_systolique,
                tension_arterielle_diastolique: request.tension_arterielle_diastolique,
                hauteur_uterine: request.hauteur_uterine,
                notes: request.notes,
                created_at: now,
            })
            .await?;

        if let Some(mut cpn) = cpn {
            cpn.statut = CpnStatut::Complete;
            self.storage.update_cpn(cpn).await?;
        }

        info!("Recorded consultation {}", consultation.id);
        Ok(consultation)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use mama_plus_data::database::{open_pool, DatabaseConfig};
    use mama_plus_data::models::{Cpn, Patiente};
    use mama_plus_data::repository::{SqliteStorage, Storage};

    use super::*;

    async fn setup() -> (ConsultationService, SharedStorage, Patiente) {
        let storage = SqliteStorage::new(open_pool(&DatabaseConfig::in_memory()).unwrap());
        storage.ensure_schema().await.unwrap();
        let storage: SharedStorage = Arc::new(storage);
        let patiente = storage
            .create_patiente(Patiente {
                age: 30,
                gestite: 2,
                parite: 1,
                langue_preferee: "fr".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                ..Patiente::default()
            })
            .await
            .unwrap();
        (ConsultationService::new(storage.clone()), storage, patiente)
    }

    #[tokio::test]
    async fn test_consultation_completes_cpn() {
        let (service, storage, patiente) = setup().await;
        let cpn = storage
            .create_cpn(Cpn {
                patiente_id: patiente.id,
                numero_cpn: 1,
                date_rdv: Utc::now() - Duration::hours(1),
                created_at: Utc::now(),
                ..Cpn::default()
            })
            .await
            .unwrap();

        let consultation = service
            .create(CreateConsultationRequest {
                patiente_id: patiente.id,
                cpn_id: Some(cpn.id),
                poids: Some(64.5),
                tension_arterielle_systolique: Some(120),
                tension_arterielle_diastolique: Some(80),
                ..CreateConsultationRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(service.get(consultation.id).await.unwrap(), consultation);
        assert_eq!(storage.get_cpn(cpn.id).await.unwrap().unwrap().statut, CpnStatut::Complete);
        assert_eq!(service.list(Some(patiente.id)).await.unwrap().len(), 1);
        assert!(service.list(Some(patiente.id + 1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_measurement_ranges() {
        let (service, _, patiente) = setup().await;
        for request in [
            CreateConsultationRequest {
                poids: Some(12.0),
                ..CreateConsultationRequest::default()
            },
            CreateConsultationRequest {
                tension_arterielle_systolique: Some(300),
                ..CreateConsultationRequest::default()
            },
            CreateConsultationRequest {
                tension_arterielle_systolique: Some(110),
                tension_arterielle_diastolique: Some(120),
                ..CreateConsultationRequest::default()
            },
        ] {
            let request = CreateConsultationRequest {
                patiente_id: patiente.id,
                ..request
            };
            assert!(matches!(service.create(request).await, Err(DomainError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_unknown_references() {
        let (service, _, patiente) = setup().await;
        let unknown_patiente = service
            .create(CreateConsultationRequest {
                patiente_id: 42,
                ..CreateConsultationRequest::default()
            })
            .await;
        assert!(matches!(unknown_patiente, Err(DomainError::NotFound(_))));

        let unknown_cpn = service
            .create(CreateConsultationRequest {
                patiente_id: patiente.id,
                cpn_id: Some(42),
                ..CreateConsultationRequest::default()
            })
            .await;
        assert!(matches!(unknown_cpn, Err(DomainError::NotFound(_))));
    }
}
