// Domain services
// Business rules for patients, appointments and the assistant features.

pub mod calendar;
pub mod chatbot;
pub mod consultations;
pub mod cpn;
pub mod dashboard;
pub mod patients;
pub mod prediction;
pub mod vaccinations;

pub use consultations::{ConsultationService, CreateConsultationRequest};
pub use cpn::{
    CpnService, CpnWithPatiente, CreateCpnRequest, GenerateCalendarRequest, PatienteSummary,
    SendRappelsRequest, UpdateCpnRequest,
};
pub use dashboard::{DashboardService, DashboardStats, PatienteOverview};
pub use patients::{
    CreatePatienteRequest, Dossier, PatientService, SyncCode, UpdatePatienteRequest,
    ValidateSyncCodeRequest,
};
pub use prediction::{PatienteRisk, PatientesRisks, PredictionService, RiskLevel, RiskPrediction};
pub use vaccinations::{CreateVaccinationRequest, VaccinationService};

use crate::SharedStorage;

/// Every storage-backed service, built over one storage handle
#[derive(Clone)]
pub struct Services {
    pub patients: PatientService,
    pub cpn: CpnService,
    pub consultations: ConsultationService,
    pub vaccinations: VaccinationService,
    pub dashboard: DashboardService,
    pub predictions: PredictionService,
}

impl Services {
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            patients: PatientService::new(storage.clone()),
            cpn: CpnService::new(storage.clone()),
            consultations: ConsultationService::new(storage.clone()),
            vaccinations: VaccinationService::new(storage.clone()),
            dashboard: DashboardService::new(storage.clone()),
            predictions: PredictionService::new(storage),
        }
    }
}
