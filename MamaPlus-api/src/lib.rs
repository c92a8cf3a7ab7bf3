// MAMA+ API lib.rs
//
// HTTP shell of the MAMA+ prenatal care service: configuration, storage
// bootstrap, lifecycle hooks, routers and OpenAPI documentation.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod lifecycle;
pub mod openapi;
pub mod state;

pub use api::create_app;
pub use bootstrap::{build_state, BootstrapError};
pub use config::{AppConfig, AppVariant, StorageKind};
pub use state::AppState;
