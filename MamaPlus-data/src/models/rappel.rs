use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UnknownVariant;

/// Channel a reminder is delivered through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RappelCanal {
    #[default]
    Sms,
    Appel,
    Whatsapp,
}

impl RappelCanal {
    pub fn as_str(&self) -> &'static str {
        match self {
            RappelCanal::Sms => "sms",
            RappelCanal::Appel => "appel",
            RappelCanal::Whatsapp => "whatsapp",
        }
    }
}

impl fmt::Display for RappelCanal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RappelCanal {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sms" => Ok(RappelCanal::Sms),
            "appel" => Ok(RappelCanal::Appel),
            "whatsapp" => Ok(RappelCanal::Whatsapp),
            other => Err(UnknownVariant::new("reminder channel", other)),
        }
    }
}

/// Delivery state of a reminder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RappelStatut {
    #[default]
    EnAttente,
    Envoye,
    Echec,
}

impl RappelStatut {
    pub fn as_str(&self) -> &'static str {
        match self {
            RappelStatut::EnAttente => "en_attente",
            RappelStatut::Envoye => "envoye",
            RappelStatut::Echec => "echec",
        }
    }
}

impl fmt::Display for RappelStatut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RappelStatut {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en_attente" => Ok(RappelStatut::EnAttente),
            "envoye" => Ok(RappelStatut::Envoye),
            "echec" => Ok(RappelStatut::Echec),
            other => Err(UnknownVariant::new("reminder status", other)),
        }
    }
}

/// Storage model for a reminder sent (or scheduled) for a CPN appointment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(utoipa::ToSchema))]
pub struct Rappel {
    pub id: i64,
    pub cpn_id: i64,
    pub patiente_id: i64,
    pub canal: RappelCanal,
    pub message: String,
    pub statut: RappelStatut,
    pub date_programmee: DateTime<Utc>,
    pub date_envoi: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
