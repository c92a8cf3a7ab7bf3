use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
#[cfg(feature = "with-api")]
use utoipa::ToSchema;
use validator::Validate;

use mama_plus_data::models::Vaccination;

use crate::error::DomainError;
use crate::SharedStorage;

/// Vaccination record payload
#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateVaccinationRequest {
    pub patiente_id: i64,

    #[validate(length(min = 1, max = 100, message = "type_vaccin is required"))]
    pub type_vaccin: String,

    pub date_vaccination: NaiveDate,
    pub dose: Option<String>,
    pub site_injection: Option<String>,
    pub lot: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct VaccinationService {
    storage: SharedStorage,
}

impl VaccinationService {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    pub async fn list(&self, patiente_id: Option<i64>) -> Result<Vec<Vaccination>, DomainError> {
        Ok(self.storage.list_vaccinations(patiente_id).await?)
    }

    pub async fn get(&self, id: i64) -> Result<Vaccination, DomainError> {
        self.storage
            .get_vaccination(id)
            .await?
            .ok_or_else(|| DomainError::not_found("vaccination", id))
    }

    #[instrument(skip(self, request), fields(patiente_id = request.patiente_id))]
    pub async fn create(&self, request: CreateVaccinationRequest) -> Result<Vaccination, DomainError> {
        request.validate()?;
        let type_vaccin = request.type_vaccin.trim().to_string();
        if type_vaccin.is_empty() {
            return Err(DomainError::Validation("type_vaccin: type_vaccin is required".to_string()));
        }

        self.storage
            .get_patiente(request.patiente_id)
            .await?
            .ok_or_else(|| DomainError::not_found("patiente", request.patiente_id))?;

        let vaccination = self
            .storage
            .create_vaccination(Vaccination {
                id: 0,
                patiente_id: request.patiente_id,
                type_vaccin,
                date_vaccination: request.date_vaccination,
                dose: request.dose,
                site_injection: request.site_injection,
                lot: request.lot,
                notes: request.notes,
                created_at: Utc::now(),
            })
            .await?;
        info!("Recorded vaccination {} ({})", vaccination.id, vaccination.type_vaccin);
        Ok(vaccination)
    }
}
