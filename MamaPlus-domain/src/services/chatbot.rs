//! Keyword-based prenatal assistant
//!
//! Symptom keywords are checked first and always produce an alert answer.
//! Topic keywords produce advice. Anything else gets the default answer.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
#[cfg(feature = "with-api")]
use utoipa::ToSchema;
use validator::Validate;

use crate::error::DomainError;

const DEFAULT_ANSWER: &str = "Merci pour votre question. Pour des informations plus spécifiques, je vous recommande de consulter votre professionnel de santé. Vous pouvez également consulter la page 'Conseils' pour plus d'informations sur la nutrition et les signes d'alerte.";

/// Category of an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ChatCategory {
    Saignement,
    MauxTete,
    Fievre,
    Vomissements,
    Nutrition,
    Signes,
    Consultation,
    Exercices,
    General,
}

struct Rule {
    category: ChatCategory,
    keywords: &'static [&'static str],
    answer: &'static str,
}

static SYMPTOM_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            category: ChatCategory::Saignement,
            keywords: &["saignement", "sang"],
            answer: "🚨 Signe d'alerte. Veuillez consulter immédiatement. Les saignements pendant la grossesse nécessitent une évaluation médicale urgente. Contactez votre médecin ou rendez-vous aux urgences.",
        },
        Rule {
            category: ChatCategory::MauxTete,
            keywords: &["maux de tête", "mal de tête", "céphalée"],
            answer: "🚨 Signe d'alerte. Veuillez consulter immédiatement. Des maux de tête forts pendant la grossesse peuvent indiquer un problème sérieux. Contactez votre médecin sans délai.",
        },
        Rule {
            category: ChatCategory::Fievre,
            keywords: &["fièvre", "fievre", "température"],
            answer: "🚨 Signe d'alerte. Veuillez consulter immédiatement. La fièvre pendant la grossesse nécessite une attention médicale urgente. Contactez votre médecin ou rendez-vous aux urgences.",
        },
        Rule {
            category: ChatCategory::Vomissements,
            keywords: &["vomissement", "vomir", "nausée"],
            answer: "🚨 Signe d'alerte. Veuillez consulter immédiatement. Des vomissements persistants peuvent entraîner une déshydratation et nécessitent une évaluation médicale. Contactez votre médecin sans délai.",
        },
    ]
});

static TOPIC_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            category: ChatCategory::Nutrition,
            keywords: &["nutrition", "aliment", "manger"],
            answer: "Pendant la grossesse, il est important de consommer des aliments riches en acide folique, fer, calcium et protéines. Privilégiez les fruits et légumes, les protéines maigres, et les produits laitiers. Évitez l'alcool, la caféine excessive, et les aliments crus.",
        },
        Rule {
            category: ChatCategory::Signes,
            keywords: &["signe", "alerte", "danger"],
            answer: "Les signes d'alerte à surveiller incluent : saignements vaginaux, douleurs abdominales intenses, perte de liquide amniotique, absence de mouvements du bébé, maux de tête sévères, ou fièvre élevée. En cas de doute, consultez immédiatement un professionnel de santé.",
        },
        Rule {
            category: ChatCategory::Consultation,
            keywords: &["consult", "médecin", "docteur"],
            answer: "Vous devriez consulter un médecin immédiatement en cas de saignements, douleurs intenses, perte de liquide, ou absence de mouvements du bébé. Pour les urgences, appelez le +223 70 00 00 00.",
        },
        Rule {
            category: ChatCategory::Exercices,
            keywords: &["exercice", "sport", "activité"],
            answer: "Pendant la grossesse, les exercices doux sont recommandés : marche, natation, yoga prénatal. Évitez les sports de contact et les activités à haut risque. Consultez votre médecin avant de commencer un nouveau programme d'exercice.",
        },
    ]
});

/// Answer selected for a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAnswer {
    pub category: ChatCategory,
    pub text: &'static str,
    /// True for symptom answers
    pub alert: bool,
}

/// Select the answer for a free-text question
pub fn answer(question: &str) -> ChatAnswer {
    let lower = question.to_lowercase();
    let matches = |rule: &&Rule| rule.keywords.iter().any(|k| lower.contains(k));

    if let Some(rule) = SYMPTOM_RULES.iter().find(matches) {
        return ChatAnswer {
            category: rule.category,
            text: rule.answer,
            alert: true,
        };
    }

    if let Some(rule) = TOPIC_RULES.iter().find(matches) {
        return ChatAnswer {
            category: rule.category,
            text: rule.answer,
            alert: false,
        };
    }

    ChatAnswer {
        category: ChatCategory::General,
        text: DEFAULT_ANSWER,
        alert: false,
    }
}

fn default_langue() -> String {
    "fr".to_string()
}

/// Incoming chatbot message
#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ChatMessageRequest {
    #[validate(length(min = 1, message = "numero_expediteur is required"))]
    pub numero_expediteur: String,

    #[validate(length(min = 1, max = 2000, message = "message_recu must contain 1 to 2000 characters"))]
    pub message_recu: String,

    #[serde(default = "default_langue")]
    pub langue: String,
}

/// Chatbot exchange returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ChatMessageResponse {
    pub numero_expediteur: String,
    pub message_recu: String,
    pub message_envoye: String,
    pub categorie: ChatCategory,
    pub alerte: bool,
    pub langue: String,
}

/// Handle one incoming message
pub fn reply(request: ChatMessageRequest) -> Result<ChatMessageResponse, DomainError> {
    request.validate()?;

    let answer = answer(&request.message_recu);
    if answer.alert {
        warn!(
            "Chatbot alert {:?} for sender {}",
            answer.category, request.numero_expediteur
        );
    } else {
        info!("Chatbot answered {:?}", answer.category);
    }

    Ok(ChatMessageResponse {
        numero_expediteur: request.numero_expediteur,
        message_recu: request.message_recu,
        message_envoye: answer.text.to_string(),
        categorie: answer.category,
        alerte: answer.alert,
        langue: request.langue,
    })
}
