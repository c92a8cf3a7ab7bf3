use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
#[cfg(feature = "with-api")]
use utoipa::ToSchema;
use validator::Validate;

use mama_plus_data::models::{Consultation, Cpn, Patiente, Role, Vaccination};
use mama_plus_data::repository::CpnFilter;

use crate::auth::logging::{log_auth_event, AuthEvent, AuthEventType};
use crate::auth::service::{create_account, normalize_telephone};
use crate::error::DomainError;
use crate::services::prediction::{predict, RiskPrediction};
use crate::SharedStorage;

/// Prefix of every sync code
pub const SYNC_CODE_PREFIX: &str = "MAMA";

/// How long a sync code stays valid
pub const SYNC_CODE_VALIDITY_DAYS: i64 = 7;

/// Letters and digits that cannot be confused when read aloud or typed
const SYNC_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Days from last menstrual period to expected delivery
const PREGNANCY_DAYS: i64 = 280;

fn default_langue() -> String {
    "fr".to_string()
}

fn default_gestite() -> u32 {
    1
}

/// Patient creation payload
///
/// When `telephone` and `password` are both given, a `patiente` account is
/// created and linked to the record.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreatePatienteRequest {
    #[validate(length(min = 6, max = 20, message = "telephone must contain 6 to 20 characters"))]
    pub telephone: Option<String>,

    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: Option<String>,

    pub nom: Option<String>,
    pub prenom: Option<String>,

    #[validate(range(min = 12, max = 60, message = "age must be between 12 and 60"))]
    pub age: u32,

    #[serde(default = "default_gestite")]
    #[validate(range(min = 1, max = 20, message = "gestite must be between 1 and 20"))]
    pub gestite: u32,

    #[serde(default)]
    #[validate(range(max = 20, message = "parite must be at most 20"))]
    pub parite: u32,

    pub niveau_instruction: Option<String>,

    #[serde(default = "default_langue")]
    pub langue_preferee: String,

    #[validate(range(min = 0.0, max = 500.0, message = "distance_centre must be between 0 and 500 km"))]
    pub distance_centre: Option<f64>,

    pub moyen_transport: Option<String>,
    pub adresse: Option<String>,
    pub ville: Option<String>,
    pub antecedents_medicaux: Option<String>,
    pub antecedents_obstetricaux: Option<String>,
    pub allergies: Option<String>,
    pub telephone_urgence: Option<String>,
    pub nom_contact_urgence: Option<String>,
    pub date_dernieres_regles: Option<NaiveDate>,
    pub date_accouchement_prevue: Option<NaiveDate>,
}

/// Partial patient update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UpdatePatienteRequest {
    pub nom: Option<String>,
    pub prenom: Option<String>,

    #[validate(length(min = 6, max = 20, message = "telephone must contain 6 to 20 characters"))]
    pub telephone: Option<String>,

    #[validate(range(min = 12, max = 60, message = "age must be between 12 and 60"))]
    pub age: Option<u32>,

    #[validate(range(min = 1, max = 20, message = "gestite must be between 1 and 20"))]
    pub gestite: Option<u32>,

    #[validate(range(max = 20, message = "parite must be at most 20"))]
    pub parite: Option<u32>,

    pub niveau_instruction: Option<String>,
    pub langue_preferee: Option<String>,

    #[validate(range(min = 0.0, max = 500.0, message = "distance_centre must be between 0 and 500 km"))]
    pub distance_centre: Option<f64>,

    pub moyen_transport: Option<String>,
    pub adresse: Option<String>,
    pub ville: Option<String>,
    pub antecedents_medicaux: Option<String>,
    pub antecedents_obstetricaux: Option<String>,
    pub allergies: Option<String>,
    pub telephone_urgence: Option<String>,
    pub nom_contact_urgence: Option<String>,
    pub date_dernieres_regles: Option<NaiveDate>,
    pub date_accouchement_prevue: Option<NaiveDate>,
}

/// Everything known about a patient
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Dossier {
    pub patiente: Patiente,
    pub consultations: Vec<Consultation>,
    pub vaccinations: Vec<Vaccination>,
    pub cpn: Vec<Cpn>,
    pub prediction_risk: RiskPrediction,
}

/// Sync code handed to the patient to link her mobile account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SyncCode {
    pub patiente_id: i64,
    /// `MAMA-XXXX-XXXX`
    pub sync_code: String,
    pub expires_at: DateTime<Utc>,
}

/// Sync code redemption payload
#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ValidateSyncCodeRequest {
    #[validate(length(min = 1, message = "sync_code is required"))]
    pub sync_code: String,
    pub user_id: i64,
}

/// Expected delivery date, 280 days after the last menstrual period
pub fn expected_delivery(ddr: NaiveDate) -> Result<NaiveDate, DomainError> {
    ddr.checked_add_signed(Duration::days(PREGNANCY_DAYS)).ok_or_else(|| {
        DomainError::Validation("date_dernieres_regles: date_dernieres_regles is out of range".to_string())
    })
}

/// Generate a fresh code in the `MAMA-XXXX-XXXX` format
pub fn generate_sync_code() -> String {
    let mut rng = rand::thread_rng();
    let mut block = || -> String {
        (0..4)
            .map(|_| SYNC_CODE_ALPHABET[rng.gen_range(0..SYNC_CODE_ALPHABET.len())] as char)
            .collect()
    };
    let first = block();
    let second = block();
    format!("{}-{}-{}", SYNC_CODE_PREFIX, first, second)
}

/// Normalize a typed code; `None` when it is not in the `MAMA-XXXX-XXXX` format
pub fn parse_sync_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    let mut parts = code.split('-');
    let valid = parts.next() == Some(SYNC_CODE_PREFIX)
        && parts
            .by_ref()
            .take(2)
            .filter(|block| block.len() == 4 && block.chars().all(|c| c.is_ascii_alphanumeric()))
            .count()
            == 2
        && parts.next().is_none();
    valid.then_some(code)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Patient record management
#[derive(Clone)]
pub struct PatientService {
    storage: SharedStorage,
}

impl PatientService {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    pub async fn list(&self) -> Result<Vec<Patiente>, DomainError> {
        Ok(self.storage.list_patientes().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Patiente, DomainError> {
        self.storage
            .get_patiente(id)
            .await?
            .ok_or_else(|| DomainError::not_found("patiente", id))
    }

    /// Record linked to a patient account, if any
    pub async fn find_by_user(&self, user_id: i64) -> Result<Option<Patiente>, DomainError> {
        Ok(self.storage.find_patiente_by_user(user_id).await?)
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreatePatienteRequest) -> Result<Patiente, DomainError> {
        request.validate()?;

        if request.password.is_some() && request.telephone.is_none() {
            return Err(DomainError::Validation(
                "telephone: telephone is required to create an account".to_string(),
            ));
        }
        if request.parite >= request.gestite {
            return Err(DomainError::Validation(
                "parite: parite must be lower than gestite".to_string(),
            ));
        }
        let date_accouchement_prevue = match (request.date_accouchement_prevue, request.date_dernieres_regles) {
            (Some(dpa), _) => Some(dpa),
            (None, Some(ddr)) => Some(expected_delivery(ddr)?),
            (None, None) => None,
        };

        // Every check is done: the account is the first write.
        let user_id = match (&request.telephone, &request.password) {
            (Some(telephone), Some(password)) => {
                let user = create_account(
                    &self.storage,
                    telephone,
                    password,
                    Role::Patiente,
                    request.nom.clone(),
                    request.prenom.clone(),
                    None,
                )
                .await?;
                Some(user.id)
            }
            _ => None,
        };

        let now = Utc::now();
        let patiente = Patiente {
            id: 0,
            user_id,
            nom: non_empty(request.nom),
            prenom: non_empty(request.prenom),
            telephone: request.telephone.as_deref().map(normalize_telephone),
            age: request.age,
            gestite: request.gestite,
            parite: request.parite,
            niveau_instruction: non_empty(request.niveau_instruction),
            langue_preferee: request.langue_preferee,
            distance_centre: request.distance_centre,
            moyen_transport: non_empty(request.moyen_transport),
            adresse: non_empty(request.adresse),
            ville: non_empty(request.ville),
            antecedents_medicaux: non_empty(request.antecedents_medicaux),
            antecedents_obstetricaux: non_empty(request.antecedents_obstetricaux),
            allergies: non_empty(request.allergies),
            telephone_urgence: non_empty(request.telephone_urgence),
            nom_contact_urgence: non_empty(request.nom_contact_urgence),
            date_dernieres_regles: request.date_dernieres_regles,
            date_accouchement_prevue,
            sync_code: None,
            sync_code_expires_at: None,
            created_at: now,
            updated_at: now,
        };

        let patiente = match self.storage.create_patiente(patiente).await {
            Ok(patiente) => patiente,
            Err(e) => {
                if let Some(user_id) = user_id {
                    warn!("Removing account {} left without a patiente record", user_id);
                    if let Err(cleanup) = self.storage.delete_user(user_id).await {
                        error!("Failed to remove account {}: {}", user_id, cleanup);
                    }
                }
                return Err(e.into());
            }
        };
        info!("Created patiente {}", patiente.id);
        Ok(patiente)
    }

    #[instrument(skip(self, request))]
    pub async fn update(&self, id: i64, request: UpdatePatienteRequest) -> Result<Patiente, DomainError> {
        request.validate()?;
        let mut patiente = self.get(id).await?;

        macro_rules! apply {
            ($($field:ident),+) => {$(
                if let Some(value) = request.$field {
                    patiente.$field = Some(value);
                }
            )+};
        }
        apply!(
            nom,
            prenom,
            niveau_instruction,
            distance_centre,
            moyen_transport,
            adresse,
            ville,
            antecedents_medicaux,
            antecedents_obstetricaux,
            allergies,
            telephone_urgence,
            nom_contact_urgence,
            date_dernieres_regles,
            date_accouchement_prevue
        );

        if let Some(telephone) = request.telephone {
            patiente.telephone = Some(normalize_telephone(&telephone));
        }
        if let Some(age) = request.age {
            patiente.age = age;
        }
        if let Some(gestite) = request.gestite {
            patiente.gestite = gestite;
        }
        if let Some(parite) = request.parite {
            patiente.parite = parite;
        }
        if let Some(langue) = request.langue_preferee {
            patiente.langue_preferee = langue;
        }
        if patiente.parite >= patiente.gestite {
            return Err(DomainError::Validation(
                "parite: parite must be lower than gestite".to_string(),
            ));
        }

        patiente.updated_at = Utc::now();
        Ok(self.storage.update_patiente(patiente).await?)
    }

    /// Delete a patient and everything recorded for her
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), DomainError> {
        if self.storage.delete_patiente(id).await? {
            info!("Deleted patiente {}", id);
            Ok(())
        } else {
            Err(DomainError::not_found("patiente", id))
        }
    }

    pub async fn dossier(&self, id: i64) -> Result<Dossier, DomainError> {
        let patiente = self.get(id).await?;
        let consultations = self.storage.list_consultations(Some(id)).await?;
        let vaccinations = self.storage.list_vaccinations(Some(id)).await?;
        let cpn = self.storage.list_cpn(&CpnFilter::for_patiente(id)).await?;
        let prediction_risk = predict(&patiente, &consultations, &cpn);

        Ok(Dossier {
            patiente,
            consultations,
            vaccinations,
            cpn,
            prediction_risk,
        })
    }

    /// Current sync code, generated when absent or expired
    pub async fn sync_code(&self, id: i64) -> Result<SyncCode, DomainError> {
        let patiente = self.get(id).await?;
        match (&patiente.sync_code, patiente.sync_code_expires_at) {
            (Some(code), Some(expires_at)) if expires_at > Utc::now() => Ok(SyncCode {
                patiente_id: id,
                sync_code: code.clone(),
                expires_at,
            }),
            _ => self.issue_sync_code(patiente).await,
        }
    }

    /// Replace the sync code even when the current one is still valid
    pub async fn regenerate_sync_code(&self, id: i64) -> Result<SyncCode, DomainError> {
        let patiente = self.get(id).await?;
        self.issue_sync_code(patiente).await
    }

    async fn issue_sync_code(&self, mut patiente: Patiente) -> Result<SyncCode, DomainError> {
        let expires_at = Utc::now() + Duration::days(SYNC_CODE_VALIDITY_DAYS);
        // A clash with another record's code is retried with a new code.
        for _ in 0..5 {
            patiente.sync_code = Some(generate_sync_code());
            patiente.sync_code_expires_at = Some(expires_at);
            patiente.updated_at = Utc::now();
            match self.storage.update_patiente(patiente.clone()).await {
                Ok(saved) => {
                    info!("Issued sync code for patiente {}", saved.id);
                    return Ok(SyncCode {
                        patiente_id: saved.id,
                        sync_code: saved.sync_code.unwrap_or_default(),
                        expires_at,
                    });
                }
                Err(mama_plus_data::repository::RepositoryError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(DomainError::Conflict("could not allocate a unique sync code".to_string()))
    }

    /// Link a patient account to the record holding `sync_code`
    #[instrument(skip(self, request), fields(user_id = request.user_id))]
    pub async fn validate_sync_code(&self, request: ValidateSyncCodeRequest) -> Result<Patiente, DomainError> {
        request.validate()?;
        let code = parse_sync_code(&request.sync_code).ok_or_else(|| {
            DomainError::Validation("sync_code: expected format MAMA-XXXX-XXXX".to_string())
        })?;

        let user = self
            .storage
            .get_user(request.user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", request.user_id))?;

        let mut patiente = self
            .storage
            .find_patiente_by_sync_code(&code)
            .await?
            .ok_or_else(|| DomainError::NotFound("sync code not found".to_string()))?;

        if patiente.sync_code_expires_at.map_or(true, |at| at <= Utc::now()) {
            return Err(DomainError::NotFound("sync code has expired".to_string()));
        }

        patiente.user_id = Some(user.id);
        patiente.sync_code = None;
        patiente.sync_code_expires_at = None;
        patiente.updated_at = Utc::now();
        let patiente = self.storage.update_patiente(patiente).await?;

        log_auth_event(
            AuthEvent::new(AuthEventType::AccountLink, Some(&user.id.to_string()), true)
                .with_details(format!("linked to patiente {}", patiente.id))
                .with_auth_method("sync_code"),
        );
        Ok(patiente)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mama_plus_data::database::{open_pool, DatabaseConfig};
    use mama_plus_data::repository::{SqliteStorage, Storage};

    use super::*;

    async fn service() -> (PatientService, SharedStorage) {
        let storage = SqliteStorage::new(open_pool(&DatabaseConfig::in_memory()).unwrap());
        storage.ensure_schema().await.unwrap();
        let storage: SharedStorage = Arc::new(storage);
        (PatientService::new(storage.clone()), storage)
    }

    fn request() -> CreatePatienteRequest {
        CreatePatienteRequest {
            nom: Some("Keita".to_string()),
            prenom: Some("Mariam".to_string()),
            age: 24,
            gestite: 1,
            parite: 0,
            langue_preferee: "fr".to_string(),
            date_dernieres_regles: NaiveDate::from_ymd_opt(2024, 1, 15),
            ..CreatePatienteRequest::default()
        }
    }

    #[test]
    fn test_generated_sync_codes_parse() {
        for _ in 0..50 {
            let code = generate_sync_code();
            assert_eq!(code.len(), 14);
            assert_eq!(parse_sync_code(&code), Some(code.clone()));
        }
    }

    #[test]
    fn test_parse_sync_code() {
        assert_eq!(parse_sync_code(" mama-ab12-cd34 "), Some("MAMA-AB12-CD34".to_string()));
        assert_eq!(parse_sync_code("MAMA-AB12"), None);
        assert_eq!(parse_sync_code("MAMA-AB12-CD34-EF56"), None);
        assert_eq!(parse_sync_code("PAPA-AB12-CD34"), None);
        assert_eq!(parse_sync_code("MAMA-AB1!-CD34"), None);
    }

    #[tokio::test]
    async fn test_create_computes_due_date_and_account() {
        let (service, storage) = service().await;
        let mut req = request();
        req.telephone = Some("76 00 00 01".to_string());
        req.password = Some("secret123".to_string());

        let patiente = service.create(req).await.unwrap();
        assert_eq!(patiente.date_accouchement_prevue, NaiveDate::from_ymd_opt(2024, 10, 21));
        assert_eq!(patiente.telephone.as_deref(), Some("76000001"));

        let user = storage.find_user_by_telephone("76000001").await.unwrap().unwrap();
        assert_eq!(user.role, Role::Patiente);
        assert_eq!(patiente.user_id, Some(user.id));
    }

    #[tokio::test]
    async fn test_create_rejects_short_password_and_bad_age() {
        let (service, _) = service().await;
        let mut req = request();
        req.telephone = Some("76000002".to_string());
        req.password = Some("123".to_string());
        assert!(matches!(service.create(req).await, Err(DomainError::Validation(_))));

        let mut req = request();
        req.age = 8;
        assert!(matches!(service.create(req).await, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rejected_create_leaves_no_account() {
        let (service, storage) = service().await;
        let mut req = request();
        req.telephone = Some("76000005".to_string());
        req.password = Some("secret123".to_string());
        req.gestite = 2;
        req.parite = 2;
        assert!(matches!(service.create(req.clone()).await, Err(DomainError::Validation(_))));
        assert!(storage.find_user_by_telephone("76000005").await.unwrap().is_none());

        req.date_dernieres_regles = Some(NaiveDate::MAX);
        req.parite = 1;
        assert!(matches!(service.create(req.clone()).await, Err(DomainError::Validation(_))));
        assert!(storage.find_user_by_telephone("76000005").await.unwrap().is_none());

        req.date_dernieres_regles = NaiveDate::from_ymd_opt(2024, 1, 15);
        let patiente = service.create(req).await.unwrap();
        assert!(patiente.user_id.is_some());
    }

    #[tokio::test]
    async fn test_failed_patiente_insert_removes_account() {
        let pool = open_pool(&DatabaseConfig::in_memory()).unwrap();
        let storage = SqliteStorage::new(pool.clone());
        storage.ensure_schema().await.unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_patientes BEFORE INSERT ON patientes
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let storage: SharedStorage = Arc::new(storage);
        let service = PatientService::new(storage.clone());

        let mut req = request();
        req.telephone = Some("76000006".to_string());
        req.password = Some("secret123".to_string());
        assert!(service.create(req).await.is_err());
        assert!(storage.find_user_by_telephone("76000006").await.unwrap().is_none());
    }

    #[test]
    fn test_expected_delivery_out_of_range() {
        assert_eq!(
            expected_delivery(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()).unwrap(),
            NaiveDate::from_ymd_opt(2024, 10, 21).unwrap()
        );
        assert!(matches!(expected_delivery(NaiveDate::MAX), Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (service, _) = service().await;
        let patiente = service.create(request()).await.unwrap();

        let updated = service
            .update(
                patiente.id,
                UpdatePatienteRequest {
                    ville: Some("Bamako".to_string()),
                    age: Some(25),
                    ..UpdatePatienteRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.ville.as_deref(), Some("Bamako"));
        assert_eq!(updated.age, 25);
        assert_eq!(updated.nom.as_deref(), Some("Keita"));

        service.delete(patiente.id).await.unwrap();
        assert!(matches!(service.get(patiente.id).await, Err(DomainError::NotFound(_))));
        assert!(matches!(service.delete(patiente.id).await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sync_code_lifecycle() {
        let (service, storage) = service().await;
        let patiente = service.create(request()).await.unwrap();

        let code = service.sync_code(patiente.id).await.unwrap();
        assert!(code.sync_code.starts_with("MAMA-"));
        // The same valid code is returned until regenerated.
        assert_eq!(service.sync_code(patiente.id).await.unwrap(), code);
        let regenerated = service.regenerate_sync_code(patiente.id).await.unwrap();
        assert_ne!(regenerated.sync_code, code.sync_code);

        let user = create_account(&storage, "76000003", "secret123", Role::Patiente, None, None, None)
            .await
            .unwrap();

        // The replaced code no longer links anything.
        let stale = service
            .validate_sync_code(ValidateSyncCodeRequest {
                sync_code: code.sync_code.clone(),
                user_id: user.id,
            })
            .await;
        assert!(matches!(stale, Err(DomainError::NotFound(_))));

        let linked = service
            .validate_sync_code(ValidateSyncCodeRequest {
                sync_code: regenerated.sync_code.to_lowercase(),
                user_id: user.id,
            })
            .await
            .unwrap();
        assert_eq!(linked.user_id, Some(user.id));
        assert!(linked.sync_code.is_none());
        assert_eq!(service.find_by_user(user.id).await.unwrap().map(|p| p.id), Some(patiente.id));
    }

    #[tokio::test]
    async fn test_expired_sync_code_is_rejected() {
        let (service, storage) = service().await;
        let mut patiente = service.create(request()).await.unwrap();
        patiente.sync_code = Some("MAMA-AAAA-BBBB".to_string());
        patiente.sync_code_expires_at = Some(Utc::now() - Duration::hours(1));
        storage.update_patiente(patiente).await.unwrap();
        let user = create_account(&storage, "76000004", "secret123", Role::Patiente, None, None, None)
            .await
            .unwrap();

        let result = service
            .validate_sync_code(ValidateSyncCodeRequest {
                sync_code: "MAMA-AAAA-BBBB".to_string(),
                user_id: user.id,
            })
            .await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));

        let malformed = service
            .validate_sync_code(ValidateSyncCodeRequest {
                sync_code: "hello".to_string(),
                user_id: user.id,
            })
            .await;
        assert!(matches!(malformed, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_dossier_bundles_records() {
        let (service, _) = service().await;
        let patiente = service.create(request()).await.unwrap();
        let dossier = service.dossier(patiente.id).await.unwrap();
        assert_eq!(dossier.patiente.id, patiente.id);
        assert!(dossier.cpn.is_empty());
        assert!(dossier.prediction_risk.available);
    }
}
