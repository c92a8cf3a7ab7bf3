use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::tag::TagBuilder;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppVariant;

/// Swagger UI at `/docs` serving the document at `/openapi.json`
pub fn configure_swagger_routes(variant: AppVariant, tags: &[&str]) -> SwaggerUi {
    SwaggerUi::new("/docs").url("/openapi.json", api_doc(variant, tags))
}

/// OpenAPI document for a variant, tagged with the mounted routers
pub fn api_doc(variant: AppVariant, tags: &[&str]) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = variant.title().to_string();
    doc.info.version = variant.version().to_string();

    let mut all_tags = vec![TagBuilder::new()
        .name("System")
        .description(Some("Service identification and liveness"))
        .build()];
    all_tags.extend(tags.iter().map(|tag| TagBuilder::new().name(*tag).build()));
    doc.tags = Some(all_tags);
    doc
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // System endpoints
        crate::api::handlers::root::root,
        crate::api::handlers::root::health_check,

        // Auth endpoints
        crate::api::handlers::auth::register,
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::me,

        // Patient endpoints
        crate::api::handlers::patientes::list_patientes,
        crate::api::handlers::patientes::create_patiente,
        crate::api::handlers::patientes::get_patiente,
        crate::api::handlers::patientes::get_profil,
        crate::api::handlers::patientes::update_patiente,
        crate::api::handlers::patientes::delete_patiente,
        crate::api::handlers::patientes::get_dossier,
        crate::api::handlers::patientes::get_sync_code,
        crate::api::handlers::patientes::regenerate_sync_code,
        crate::api::handlers::patientes::validate_sync_code,

        // Antenatal consultation endpoints
        crate::api::handlers::cpn::list_cpn,
        crate::api::handlers::cpn::create_cpn,
        crate::api::handlers::cpn::get_cpn,
        crate::api::handlers::cpn::update_cpn,
        crate::api::handlers::cpn::generate_calendar,
        crate::api::handlers::cpn::send_rappels,
        crate::api::handlers::cpn::list_rappels,

        // Consultation and vaccination endpoints
        crate::api::handlers::consultations::list_consultations,
        crate::api::handlers::consultations::create_consultation,
        crate::api::handlers::consultations::get_consultation,
        crate::api::handlers::vaccinations::list_vaccinations,
        crate::api::handlers::vaccinations::create_vaccination,
        crate::api::handlers::vaccinations::get_vaccination,

        // Dashboard, chatbot, prediction and scheduler endpoints
        crate::api::handlers::dashboard::get_stats,
        crate::api::handlers::dashboard::get_patientes,
        crate::api::handlers::chatbot::post_message,
        crate::api::handlers::prediction::predict_patiente,
        crate::api::handlers::prediction::predict_all,
        crate::api::handlers::scheduler::get_status,
        crate::api::handlers::scheduler::run_now,
    ),
    components(
        schemas(
            // System
            crate::api::handlers::root::RootResponse,
            crate::api::handlers::root::HealthResponse,
            crate::api::error::ErrorResponse,

            // Records
            mama_plus_data::models::Role,
            mama_plus_data::models::Patiente,
            mama_plus_data::models::Cpn,
            mama_plus_data::models::CpnStatut,
            mama_plus_data::models::Consultation,
            mama_plus_data::models::Vaccination,
            mama_plus_data::models::Rappel,
            mama_plus_data::models::RappelCanal,
            mama_plus_data::models::RappelStatut,

            // Auth schemas
            mama_plus_domain::auth::RegisterRequest,
            mama_plus_domain::auth::LoginRequest,
            mama_plus_domain::auth::LoginResponse,
            mama_plus_domain::auth::UserProfile,

            // Service payloads
            mama_plus_domain::services::CreatePatienteRequest,
            mama_plus_domain::services::UpdatePatienteRequest,
            mama_plus_domain::services::Dossier,
            mama_plus_domain::services::SyncCode,
            mama_plus_domain::services::ValidateSyncCodeRequest,
            mama_plus_domain::services::CreateCpnRequest,
            mama_plus_domain::services::UpdateCpnRequest,
            mama_plus_domain::services::GenerateCalendarRequest,
            mama_plus_domain::services::SendRappelsRequest,
            mama_plus_domain::services::CpnWithPatiente,
            mama_plus_domain::services::PatienteSummary,
            mama_plus_domain::services::CreateConsultationRequest,
            mama_plus_domain::services::CreateVaccinationRequest,
            mama_plus_domain::services::DashboardStats,
            mama_plus_domain::services::PatienteOverview,
            mama_plus_domain::services::RiskLevel,
            mama_plus_domain::services::RiskPrediction,
            mama_plus_domain::services::PatienteRisk,
            mama_plus_domain::services::PatientesRisks,
            mama_plus_domain::services::chatbot::ChatCategory,
            mama_plus_domain::services::chatbot::ChatMessageRequest,
            mama_plus_domain::services::chatbot::ChatMessageResponse,
            mama_plus_domain::scheduler::SchedulerStatus,
            mama_plus_domain::scheduler::RunSummary,
        )
    ),
    modifiers(&BearerAuth),
    info(
        title = "MAMA+ API",
        version = "1.0.0",
        description = "Suivi prénatal: patientes, CPN, consultations, vaccinations et rappels",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_doc_generation() {
        let tags = ["Authentication", "Patients", "Scheduler"];
        let openapi = api_doc(AppVariant::Csv, &tags);

        assert_eq!(openapi.info.title, "MAMA+ API (CSV Storage)");
        assert_eq!(openapi.info.version, "2.0.0");

        let names: Vec<&str> = openapi
            .tags
            .as_ref()
            .map(|tags| tags.iter().map(|tag| tag.name.as_str()).collect())
            .unwrap_or_default();
        assert_eq!(names, vec!["System", "Authentication", "Patients", "Scheduler"]);

        for path in [
            "/",
            "/health",
            "/api/auth/login",
            "/api/patientes/{id}/dossier",
            "/api/cpn/generate",
            "/api/prediction/patientes/risks",
            "/api/scheduler/run",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {}", path);
        }

        let components = openapi.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
