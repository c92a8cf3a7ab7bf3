use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for an administered vaccine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(utoipa::ToSchema))]
pub struct Vaccination {
    pub id: i64,
    pub patiente_id: i64,

    /// Vaccine name, e.g. VAT1
    pub type_vaccin: String,

    pub date_vaccination: NaiveDate,
    pub dose: Option<String>,
    pub site_injection: Option<String>,
    pub lot: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
