use axum::{
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::api::handlers::{
    auth, chatbot, consultations, cpn, dashboard, health_check, patientes, prediction, root, scheduler,
    vaccinations,
};
use crate::openapi::configure_swagger_routes;
use crate::state::AppState;

/// Router assembly failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShellError {
    #[error("Router prefix {0} is already mounted")]
    DuplicatePrefix(String),

    #[error("Router prefix {0:?} must start with '/' and not end with '/'")]
    InvalidPrefix(String),
}

struct MountedRouter {
    prefix: &'static str,
    tag: &'static str,
    router: Router<AppState>,
}

/// Ordered list of domain routers, each under its own prefix
#[derive(Default)]
pub struct RouterRegistry {
    entries: Vec<MountedRouter>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a router under `prefix`
    pub fn mount(
        mut self,
        prefix: &'static str,
        tag: &'static str,
        router: Router<AppState>,
    ) -> Result<Self, ShellError> {
        if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
            return Err(ShellError::InvalidPrefix(prefix.to_string()));
        }
        if self.entries.iter().any(|entry| entry.prefix == prefix) {
            return Err(ShellError::DuplicatePrefix(prefix.to_string()));
        }

        debug!("Mounting {} router at {}", tag, prefix);
        self.entries.push(MountedRouter { prefix, tag, router });
        Ok(self)
    }

    /// Mounted prefixes in registration order
    pub fn prefixes(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.prefix).collect()
    }

    /// Documentation tags in registration order
    pub fn tags(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.tag).collect()
    }

    /// `(prefix, tag)` pairs in registration order
    pub fn routes(&self) -> Vec<(&'static str, &'static str)> {
        self.entries.iter().map(|entry| (entry.prefix, entry.tag)).collect()
    }

    fn into_router(self) -> Router<AppState> {
        self.entries
            .into_iter()
            .fold(Router::new(), |app, entry| app.nest(entry.prefix, entry.router))
    }
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
}

fn patientes_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(patientes::list_patientes).post(patientes::create_patiente))
        .route("/sync-code/validate", post(patientes::validate_sync_code))
        .route(
            "/:id",
            get(patientes::get_patiente)
                .put(patientes::update_patiente)
                .delete(patientes::delete_patiente),
        )
        .route("/:id/dossier", get(patientes::get_dossier))
        .route("/:id/profil", get(patientes::get_profil))
        .route("/:id/sync-code", get(patientes::get_sync_code))
        .route("/:id/sync-code/regenerate", post(patientes::regenerate_sync_code))
}

fn cpn_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cpn::list_cpn).post(cpn::create_cpn))
        .route("/generate", post(cpn::generate_calendar))
        .route("/:id", get(cpn::get_cpn).put(cpn::update_cpn))
        .route("/:id/rappels", get(cpn::list_rappels).post(cpn::send_rappels))
}

fn consultations_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(consultations::list_consultations).post(consultations::create_consultation),
        )
        .route("/:id", get(consultations::get_consultation))
}

fn vaccinations_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(vaccinations::list_vaccinations).post(vaccinations::create_vaccination),
        )
        .route("/:id", get(vaccinations::get_vaccination))
}

fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(dashboard::get_stats))
        .route("/patientes", get(dashboard::get_patientes))
}

fn chatbot_routes() -> Router<AppState> {
    Router::new().route("/messages", post(chatbot::post_message))
}

fn prediction_routes() -> Router<AppState> {
    Router::new()
        .route("/patientes/risks", get(prediction::predict_all))
        .route("/patientes/:id", get(prediction::predict_patiente))
}

fn scheduler_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(scheduler::get_status))
        .route("/run", post(scheduler::run_now))
}

/// The nine domain routers of the service
pub fn default_registry() -> Result<RouterRegistry, ShellError> {
    RouterRegistry::new()
        .mount("/api/auth", "Authentication", auth_routes())?
        .mount("/api/patientes", "Patients", patientes_routes())?
        .mount("/api/cpn", "Antenatal Consultations", cpn_routes())?
        .mount("/api/consultations", "Consultations", consultations_routes())?
        .mount("/api/vaccinations", "Vaccinations", vaccinations_routes())?
        .mount("/api/dashboard", "Dashboard", dashboard_routes())?
        .mount("/api/chatbot", "Chatbot", chatbot_routes())?
        .mount("/api/prediction", "Predictions", prediction_routes())?
        .mount("/api/scheduler", "Scheduler", scheduler_routes())
}

/// Development CORS policy: every origin, method and header, with credentials.
///
/// Browsers refuse `*` together with credentials, so the request values are
/// mirrored back. Do not expose this policy in production.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the application from a registry
pub fn build_app(state: AppState, registry: RouterRegistry) -> Router {
    info!(
        "Building {} with routers: {}",
        state.variant.title(),
        registry.prefixes().join(", ")
    );

    let swagger = configure_swagger_routes(state.variant, &registry.tags());
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(registry.into_router())
        .with_state(state)
        .merge(swagger)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Create the application router with every domain router mounted
pub fn create_app(state: AppState) -> Result<Router, ShellError> {
    Ok(build_app(state, default_registry()?))
}
