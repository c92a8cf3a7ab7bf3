use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for a consultation with recorded measurements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(utoipa::ToSchema))]
pub struct Consultation {
    pub id: i64,
    pub patiente_id: i64,

    /// CPN appointment this consultation fulfils, if any
    pub cpn_id: Option<i64>,

    pub date_consultation: DateTime<Utc>,

    /// Weight in kilograms
    pub poids: Option<f64>,

    /// Systolic blood pressure in mmHg
    pub tension_arterielle_systolique: Option<u32>,

    /// Diastolic blood pressure in mmHg
    pub tension_arterielle_diastolique: Option<u32>,

    /// Fundal height in centimetres
    pub hauteur_uterine: Option<f64>,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
