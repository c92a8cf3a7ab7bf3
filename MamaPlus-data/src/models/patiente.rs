use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for a followed pregnant patient
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(utoipa::ToSchema))]
pub struct Patiente {
    pub id: i64,

    /// Account linked to this record, when the patient uses the mobile client
    pub user_id: Option<i64>,

    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub telephone: Option<String>,
    pub age: u32,

    /// Number of pregnancies, including the current one
    pub gestite: u32,

    /// Number of previous deliveries
    pub parite: u32,

    pub niveau_instruction: Option<String>,
    pub langue_preferee: String,

    /// Distance to the health centre in kilometres
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

    /// Code used to link a mobile account to this record (MAMA-XXXX-XXXX)
    pub sync_code: Option<String>,
    pub sync_code_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patiente {
    /// Display name built from the available name parts
    pub fn display_name(&self) -> String {
        match (&self.prenom, &self.nom) {
            (Some(prenom), Some(nom)) => format!("{} {}", prenom, nom),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => format!("Patiente #{}", self.id),
        }
    }
}
