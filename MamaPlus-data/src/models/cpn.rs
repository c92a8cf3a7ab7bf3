use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UnknownVariant;

/// Lifecycle of an antenatal consultation appointment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum CpnStatut {
    #[default]
    Planifie,
    Complete,
    Manquee,
    Annulee,
}

impl CpnStatut {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpnStatut::Planifie => "planifie",
            CpnStatut::Complete => "complete",
            CpnStatut::Manquee => "manquee",
            CpnStatut::Annulee => "annulee",
        }
    }
}

impl fmt::Display for CpnStatut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CpnStatut {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planifie" => Ok(CpnStatut::Planifie),
            "complete" => Ok(CpnStatut::Complete),
            "manquee" => Ok(CpnStatut::Manquee),
            "annulee" => Ok(CpnStatut::Annulee),
            other => Err(UnknownVariant::new("CPN status", other)),
        }
    }
}

/// Storage model for an antenatal consultation (CPN) appointment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(utoipa::ToSchema))]
pub struct Cpn {
    pub id: i64,
    pub patiente_id: i64,

    /// Position in the pregnancy schedule, 1 to 8
    pub numero_cpn: u32,

    pub date_rdv: DateTime<Utc>,
    pub semaine_grossesse: Option<u32>,
    pub statut: CpnStatut,
    pub lieu: Option<String>,
    pub notes: Option<String>,

    /// Set once a reminder has been recorded for this appointment
    pub rappel_envoye: bool,

    pub created_at: DateTime<Utc>,
}
