use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
#[cfg(feature = "with-api")]
use utoipa::ToSchema;
use validator::Validate;

use mama_plus_data::models::{Cpn, CpnStatut, Patiente, Rappel, RappelCanal, RappelStatut};
use mama_plus_data::repository::CpnFilter;

use crate::error::DomainError;
use crate::services::calendar::{plan_calendar, MAX_CPN};
use crate::SharedStorage;

/// Hour (UTC) given to appointments created from a calendar
const APPOINTMENT_HOUR: u32 = 8;

fn appointment_time(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::from_hms_opt(APPOINTMENT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN))
        .and_utc()
}

/// French reminder text for an appointment
pub fn reminder_message(cpn: &Cpn, patiente: Option<&Patiente>) -> String {
    let greeting = patiente
        .map(|p| format!("Bonjour {}", p.display_name()))
        .unwrap_or_else(|| "Bonjour".to_string());
    let lieu = cpn
        .lieu
        .as_deref()
        .map(|lieu| format!(" à {}", lieu))
        .unwrap_or_default();
    format!(
        "{}, rappel de votre CPN{} le {}{}. MAMA+ vous souhaite une bonne santé.",
        greeting,
        cpn.numero_cpn,
        cpn.date_rdv.format("%d/%m/%Y à %Hh%M"),
        lieu
    )
}

/// Appointment creation payload
#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateCpnRequest {
    pub patiente_id: i64,

    #[validate(range(min = 1, max = 8, message = "numero_cpn must be between 1 and 8"))]
    pub numero_cpn: u32,

    pub date_rdv: DateTime<Utc>,

    #[validate(range(min = 1, max = 42, message = "semaine_grossesse must be between 1 and 42"))]
    pub semaine_grossesse: Option<u32>,

    pub lieu: Option<String>,
    pub notes: Option<String>,
}

/// Partial appointment update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UpdateCpnRequest {
    pub statut: Option<CpnStatut>,
    pub date_rdv: Option<DateTime<Utc>>,
    pub lieu: Option<String>,
    pub notes: Option<String>,
}

fn default_nombre_cpn() -> u32 {
    MAX_CPN
}

/// Calendar generation payload
#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct GenerateCalendarRequest {
    pub patiente_id: i64,

    /// Day of the first appointment
    pub date_premiere_cpn: NaiveDate,

    /// Pregnancy week at the first appointment
    #[validate(range(min = 1, max = 42, message = "semaine_grossesse must be between 1 and 42"))]
    pub semaine_grossesse: u32,

    /// 4 or 8
    #[serde(default = "default_nombre_cpn")]
    pub nombre_cpn: u32,

    pub lieu: Option<String>,
}

fn default_canaux() -> Vec<RappelCanal> {
    vec![RappelCanal::Sms]
}

/// Manual reminder request
#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SendRappelsRequest {
    #[serde(default = "default_canaux")]
    #[validate(length(min = 1, message = "types must name at least one channel"))]
    pub types: Vec<RappelCanal>,
}

impl Default for SendRappelsRequest {
    fn default() -> Self {
        Self {
            types: default_canaux(),
        }
    }
}

/// Name fields of the patient an appointment belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct PatienteSummary {
    pub id: i64,
    pub nom: Option<String>,
    pub prenom: Option<String>,
}

impl From<&Patiente> for PatienteSummary {
    fn from(patiente: &Patiente) -> Self {
        Self {
            id: patiente.id,
            nom: patiente.nom.clone(),
            prenom: patiente.prenom.clone(),
        }
    }
}

/// Appointment listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CpnWithPatiente {
    #[serde(flatten)]
    pub cpn: Cpn,
    pub patiente: Option<PatienteSummary>,
}

/// Antenatal appointment management
#[derive(Clone)]
pub struct CpnService {
    storage: SharedStorage,
}

impl CpnService {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    async fn require_patiente(&self, patiente_id: i64) -> Result<Patiente, DomainError> {
        self.storage
            .get_patiente(patiente_id)
            .await?
            .ok_or_else(|| DomainError::not_found("patiente", patiente_id))
    }

    pub async fn list(&self, filter: &CpnFilter) -> Result<Vec<CpnWithPatiente>, DomainError> {
        let patientes: HashMap<i64, PatienteSummary> = self
            .storage
            .list_patientes()
            .await?
            .iter()
            .map(|p| (p.id, PatienteSummary::from(p)))
            .collect();

        Ok(self
            .storage
            .list_cpn(filter)
            .await?
            .into_iter()
            .map(|cpn| CpnWithPatiente {
                patiente: patientes.get(&cpn.patiente_id).cloned(),
                cpn,
            })
            .collect())
    }

    pub async fn get(&self, id: i64) -> Result<Cpn, DomainError> {
        self.storage
            .get_cpn(id)
            .await?
            .ok_or_else(|| DomainError::not_found("cpn", id))
    }

    #[instrument(skip(self, request), fields(patiente_id = request.patiente_id))]
    pub async fn create(&self, request: CreateCpnRequest) -> Result<Cpn, DomainError> {
        request.validate()?;
        self.require_patiente(request.patiente_id).await?;

        let cpn = self
            .storage
            .create_cpn(Cpn {
                id: 0,
                patiente_id: request.patiente_id,
                numero_cpn: request.numero_cpn,
                date_rdv: request.date_rdv,
                semaine_grossesse: request.semaine_grossesse,
                statut: CpnStatut::Planifie,
                lieu: request.lieu,
                notes: request.notes,
                rappel_envoye: false,
                created_at: Utc::now(),
            })
            .await?;
        info!("Created CPN{} ({}) for patiente {}", cpn.numero_cpn, cpn.id, cpn.patiente_id);
        Ok(cpn)
    }

    #[instrument(skip(self, request))]
    pub async fn update(&self, id: i64, request: UpdateCpnRequest) -> Result<Cpn, DomainError> {
        request.validate()?;
        let mut cpn = self.get(id).await?;

        if let Some(date_rdv) = request.date_rdv {
            if date_rdv != cpn.date_rdv {
                // A moved appointment gets a fresh reminder.
                cpn.rappel_envoye = false;
            }
            cpn.date_rdv = date_rdv;
        }
        if let Some(statut) = request.statut {
            cpn.statut = statut;
        }
        if request.lieu.is_some() {
            cpn.lieu = request.lieu;
        }
        if request.notes.is_some() {
            cpn.notes = request.notes;
        }

        Ok(self.storage.update_cpn(cpn).await?)
    }

    /// Create the standard calendar, skipping appointment numbers the
    /// patient already has
    #[instrument(skip(self, request), fields(patiente_id = request.patiente_id))]
    pub async fn generate_calendar(
        &self,
        request: GenerateCalendarRequest,
        today: NaiveDate,
    ) -> Result<Vec<Cpn>, DomainError> {
        request.validate()?;
        if request.nombre_cpn != 4 && request.nombre_cpn != MAX_CPN {
            return Err(DomainError::Validation(
                "nombre_cpn: nombre_cpn must be 4 or 8".to_string(),
            ));
        }
        self.require_patiente(request.patiente_id).await?;

        let existing: HashSet<u32> = self
            .storage
            .list_cpn(&CpnFilter::for_patiente(request.patiente_id))
            .await?
            .iter()
            .map(|cpn| cpn.numero_cpn)
            .collect();

        let plan = plan_calendar(
            request.date_premiere_cpn,
            request.semaine_grossesse,
            request.nombre_cpn,
            today,
        )
        .ok_or_else(|| {
            DomainError::Validation("date_premiere_cpn: date_premiere_cpn is out of range".to_string())
        })?;

        let mut created = Vec::new();
        for planned in plan {
            if existing.contains(&planned.numero_cpn) {
                continue;
            }
            let cpn = self
                .storage
                .create_cpn(Cpn {
                    id: 0,
                    patiente_id: request.patiente_id,
                    numero_cpn: planned.numero_cpn,
                    date_rdv: appointment_time(planned.date),
                    semaine_grossesse: Some(planned.semaine_grossesse),
                    statut: planned.statut,
                    lieu: request.lieu.clone(),
                    notes: None,
                    rappel_envoye: false,
                    created_at: Utc::now(),
                })
                .await?;
            created.push(cpn);
        }

        info!(
            "Generated {} CPN for patiente {}",
            created.len(),
            request.patiente_id
        );
        Ok(created)
    }

    /// Record one reminder per channel and flag the appointment
    #[instrument(skip(self, request))]
    pub async fn send_rappels(&self, id: i64, request: SendRappelsRequest) -> Result<Vec<Rappel>, DomainError> {
        request.validate()?;
        let mut cpn = self.get(id).await?;
        let patiente = self.storage.get_patiente(cpn.patiente_id).await?;
        let message = reminder_message(&cpn, patiente.as_ref());

        let mut canaux = request.types;
        let mut seen = HashSet::new();
        canaux.retain(|canal| seen.insert(*canal));

        let now = Utc::now();
        let mut rappels = Vec::with_capacity(canaux.len());
        for canal in canaux {
            let rappel = self
                .storage
                .create_rappel(Rappel {
                    id: 0,
                    cpn_id: cpn.id,
                    patiente_id: cpn.patiente_id,
                    canal,
                    message: message.clone(),
                    statut: RappelStatut::Envoye,
                    date_programmee: now,
                    date_envoi: Some(now),
                    created_at: now,
                })
                .await?;
            rappels.push(rappel);
        }

        cpn.rappel_envoye = true;
        self.storage.update_cpn(cpn).await?;
        info!("Sent {} reminder(s) for CPN {}", rappels.len(), id);
        Ok(rappels)
    }

    pub async fn list_rappels(&self, id: i64) -> Result<Vec<Rappel>, DomainError> {
        self.get(id).await?;
        Ok(self.storage.list_rappels(Some(id)).await?)
    }
}
