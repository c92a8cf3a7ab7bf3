//! Risk of missing antenatal follow-up
//!
//! A transparent additive score over the patient profile and her history.
//! Each factor that contributes also yields a recommendation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use mama_plus_data::models::{Consultation, Cpn, CpnStatut, Patiente};
use mama_plus_data::repository::CpnFilter;

use crate::error::DomainError;
use crate::SharedStorage;

const BASE_SCORE: f64 = 0.10;

/// Number of inputs the score can draw on; drives the confidence value
const FEATURE_COUNT: usize = 9;

/// Risk band of a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub enum RiskLevel {
    #[serde(rename = "faible")]
    Faible,
    #[serde(rename = "moyen")]
    Moyen,
    #[serde(rename = "élevé")]
    Eleve,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.4 {
            RiskLevel::Faible
        } else if score < 0.7 {
            RiskLevel::Moyen
        } else {
            RiskLevel::Eleve
        }
    }
}

/// Risk prediction for one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct RiskPrediction {
    /// False when the record lacks the data needed to score it
    pub available: bool,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub recommendations: Vec<String>,
    #[cfg_attr(feature = "with-api", schema(value_type = Object))]
    pub features_used: BTreeMap<String, Value>,
}

impl RiskPrediction {
    fn unavailable() -> Self {
        Self {
            available: false,
            risk_score: 0.0,
            risk_level: RiskLevel::Faible,
            confidence: 0.0,
            recommendations: vec![
                "Complétez le dossier de la patiente pour obtenir une prédiction.".to_string(),
            ],
            features_used: BTreeMap::new(),
        }
    }
}

/// One entry of the all-patients listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct PatienteRisk {
    pub patiente_id: i64,
    pub prediction: RiskPrediction,
}

/// Predictions for every patient
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct PatientesRisks {
    pub patientes: Vec<PatienteRisk>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

/// Score a patient from her record, consultations and appointments
pub fn predict(patiente: &Patiente, consultations: &[Consultation], cpn: &[Cpn]) -> RiskPrediction {
    if patiente.age == 0 {
        return RiskPrediction::unavailable();
    }

    let mut score = BASE_SCORE;
    let mut recommendations = Vec::new();
    let mut features = BTreeMap::new();

    features.insert("age".to_string(), json!(patiente.age));
    if patiente.age < 18 {
        score += 0.15;
        recommendations.push("Grossesse précoce : prévoir un accompagnement renforcé.".to_string());
    } else if patiente.age > 35 {
        score += 0.10;
        recommendations.push("Âge maternel avancé : surveillance rapprochée recommandée.".to_string());
    }

    features.insert("gestite".to_string(), json!(patiente.gestite));
    features.insert("parite".to_string(), json!(patiente.parite));
    if patiente.parite == 0 {
        score += 0.05;
        recommendations.push("Première grossesse : expliquer l'importance de chaque CPN.".to_string());
    } else if patiente.parite >= 4 {
        score += 0.10;
        recommendations.push("Grande multipare : planifier les rendez-vous avec la famille.".to_string());
    }

    if let Some(distance) = patiente.distance_centre {
        features.insert("distance_centre".to_string(), json!(distance));
        if distance > 10.0 {
            score += 0.20;
            recommendations.push(format!(
                "Le centre le plus proche est à {:.1} km : organiser le transport à l'avance.",
                distance
            ));
        } else if distance > 5.0 {
            score += 0.10;
            recommendations.push(format!("Le centre le plus proche est à {:.1} km.", distance));
        }
    }

    if let Some(transport) = patiente.moyen_transport.as_deref().filter(|t| !t.trim().is_empty()) {
        features.insert("moyen_transport".to_string(), json!(transport));
        let on_foot = matches!(transport.to_lowercase().as_str(), "a_pied" | "à pied" | "a pied" | "pied");
        if on_foot && patiente.distance_centre.map_or(false, |d| d > 5.0) {
            score += 0.05;
        }
    }

    if let Some(level) = patiente.niveau_instruction.as_deref().filter(|l| !l.trim().is_empty()) {
        features.insert("niveau_instruction".to_string(), json!(level));
        if matches!(level.to_lowercase().as_str(), "aucun" | "non_scolarise" | "analphabete") {
            score += 0.10;
            recommendations.push("Privilégier les rappels vocaux (appel) plutôt que les SMS.".to_string());
        }
    }

    let missed = cpn.iter().filter(|c| c.statut == CpnStatut::Manquee).count();
    features.insert("cpn_manquees".to_string(), json!(missed));
    if missed > 0 {
        score += (0.15 * missed as f64).min(0.30);
        recommendations.push(format!(
            "{} CPN manquée(s) : contacter la patiente pour reprogrammer.",
            missed
        ));
    }

    let last_bp = consultations
        .iter()
        .filter(|c| c.tension_arterielle_systolique.is_some() || c.tension_arterielle_diastolique.is_some())
        .max_by_key(|c| c.date_consultation);
    if let Some(consultation) = last_bp {
        let systolic = consultation.tension_arterielle_systolique.unwrap_or(0);
        let diastolic = consultation.tension_arterielle_diastolique.unwrap_or(0);
        features.insert("tension_arterielle".to_string(), json!(format!("{}/{}", systolic, diastolic)));
        if systolic >= 140 || diastolic >= 90 {
            score += 0.15;
            recommendations.push(
                "Tension artérielle élevée : consulter sans attendre en cas de maux de tête.".to_string(),
            );
        }
    }

    let history = has_text(&patiente.antecedents_medicaux) || has_text(&patiente.antecedents_obstetricaux);
    features.insert("antecedents".to_string(), json!(history));
    if history {
        score += 0.05;
        recommendations.push("Antécédents connus : suivi médical régulier conseillé.".to_string());
    }

    if recommendations.is_empty() {
        recommendations.push("Continuez le suivi régulier de vos consultations prénatales.".to_string());
    }

    let risk_score = round2(score.clamp(0.0, 1.0));
    let confidence = round2(0.5 + 0.5 * features.len().min(FEATURE_COUNT) as f64 / FEATURE_COUNT as f64);

    RiskPrediction {
        available: true,
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
        confidence,
        recommendations,
        features_used: features,
    }
}

/// Storage-backed predictions
#[derive(Clone)]
pub struct PredictionService {
    storage: SharedStorage,
}

impl PredictionService {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Predict for a stored patient
    pub async fn for_patiente(&self, patiente_id: i64) -> Result<RiskPrediction, DomainError> {
        let patiente = self
            .storage
            .get_patiente(patiente_id)
            .await?
            .ok_or_else(|| DomainError::not_found("patiente", patiente_id))?;
        self.predict_stored(&patiente).await
    }

    /// Predict for every stored patient
    pub async fn all(&self) -> Result<PatientesRisks, DomainError> {
        let mut patientes = Vec::new();
        for patiente in self.storage.list_patientes().await? {
            patientes.push(PatienteRisk {
                patiente_id: patiente.id,
                prediction: self.predict_stored(&patiente).await?,
            });
        }
        Ok(PatientesRisks { patientes })
    }

    pub(crate) async fn predict_stored(&self, patiente: &Patiente) -> Result<RiskPrediction, DomainError> {
        let consultations = self.storage.list_consultations(Some(patiente.id)).await?;
        let cpn = self.storage.list_cpn(&CpnFilter::for_patiente(patiente.id)).await?;
        Ok(predict(patiente, &consultations, &cpn))
    }
}
