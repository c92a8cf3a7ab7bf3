use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Consultation, Cpn, CpnStatut, Patiente, Rappel, User, Vaccination};
use super::errors::RepositoryError;

/// Which backend a [`Storage`] is running on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Csv,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "SQLite",
            StorageBackend::Csv => "CSV",
        }
    }
}

/// Filter applied when listing CPN appointments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpnFilter {
    pub patiente_id: Option<i64>,
    pub statut: Option<CpnStatut>,
}

impl CpnFilter {
    pub fn for_patiente(patiente_id: i64) -> Self {
        Self {
            patiente_id: Some(patiente_id),
            statut: None,
        }
    }

    pub fn with_statut(statut: CpnStatut) -> Self {
        Self {
            patiente_id: None,
            statut: Some(statut),
        }
    }

    pub fn matches(&self, cpn: &Cpn) -> bool {
        self.patiente_id.map_or(true, |id| cpn.patiente_id == id)
            && self.statut.map_or(true, |statut| cpn.statut == statut)
    }
}

/// Persistence capability used by every domain service
///
/// Implementations assign the `id` of created records and ignore the one
/// passed in. Lists are returned in ascending id order except CPN, which
/// are sorted by appointment date.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Backend identifier for logs and liveness payloads
    fn backend(&self) -> StorageBackend;

    /// Create tables (or files) that do not exist yet; safe to call repeatedly
    async fn ensure_schema(&self) -> Result<(), RepositoryError>;

    // Accounts

    /// Insert an account; fails with `Conflict` when the telephone is taken
    async fn create_user(&self, user: User) -> Result<User, RepositoryError>;
    async fn get_user(&self, id: i64) -> Result<Option<User>, RepositoryError>;
    async fn find_user_by_telephone(&self, telephone: &str) -> Result<Option<User>, RepositoryError>;

    /// Remove an account; returns `false` when it did not exist
    async fn delete_user(&self, id: i64) -> Result<bool, RepositoryError>;

    // Patients

    async fn create_patiente(&self, patiente: Patiente) -> Result<Patiente, RepositoryError>;
    async fn get_patiente(&self, id: i64) -> Result<Option<Patiente>, RepositoryError>;
    async fn list_patientes(&self) -> Result<Vec<Patiente>, RepositoryError>;

    /// Replace a stored patient; fails with `NotFound` when absent
    async fn update_patiente(&self, patiente: Patiente) -> Result<Patiente, RepositoryError>;

    /// Delete a patient with its CPN, consultations, vaccinations and reminders.
    /// Returns `false` when the patient did not exist.
    async fn delete_patiente(&self, id: i64) -> Result<bool, RepositoryError>;

    async fn find_patiente_by_sync_code(&self, code: &str) -> Result<Option<Patiente>, RepositoryError>;
    async fn find_patiente_by_user(&self, user_id: i64) -> Result<Option<Patiente>, RepositoryError>;

    // Antenatal consultations

    async fn create_cpn(&self, cpn: Cpn) -> Result<Cpn, RepositoryError>;
    async fn get_cpn(&self, id: i64) -> Result<Option<Cpn>, RepositoryError>;
    async fn list_cpn(&self, filter: &CpnFilter) -> Result<Vec<Cpn>, RepositoryError>;

    /// Replace a stored CPN; fails with `NotFound` when absent
    async fn update_cpn(&self, cpn: Cpn) -> Result<Cpn, RepositoryError>;

    /// Set `rappel_envoye` on a `planifie` CPN that has not been reminded yet.
    ///
    /// The check and the write are a single step, so concurrent callers see
    /// exactly one `true` per appointment. Returns `false` when the CPN is
    /// absent, already reminded or no longer `planifie`.
    async fn claim_cpn_reminder(&self, id: i64) -> Result<bool, RepositoryError>;

    /// Move a `planifie` CPN dated before `before` to `manquee`, in a single
    /// step. Returns `false` when it no longer qualifies.
    async fn mark_cpn_missed(&self, id: i64, before: DateTime<Utc>) -> Result<bool, RepositoryError>;

    // Consultations

    async fn create_consultation(&self, consultation: Consultation) -> Result<Consultation, RepositoryError>;
    async fn get_consultation(&self, id: i64) -> Result<Option<Consultation>, RepositoryError>;
    async fn list_consultations(&self, patiente_id: Option<i64>) -> Result<Vec<Consultation>, RepositoryError>;

    // Vaccinations

    async fn create_vaccination(&self, vaccination: Vaccination) -> Result<Vaccination, RepositoryError>;
    async fn get_vaccination(&self, id: i64) -> Result<Option<Vaccination>, RepositoryError>;
    async fn list_vaccinations(&self, patiente_id: Option<i64>) -> Result<Vec<Vaccination>, RepositoryError>;

    // Reminders

    async fn create_rappel(&self, rappel: Rappel) -> Result<Rappel, RepositoryError>;
    async fn list_rappels(&self, cpn_id: Option<i64>) -> Result<Vec<Rappel>, RepositoryError>;
}
