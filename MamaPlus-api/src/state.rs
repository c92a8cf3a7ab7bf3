use std::sync::Arc;

use mama_plus_domain::auth::{AuthService, TokenConfig};
use mama_plus_domain::scheduler::ReminderScheduler;
use mama_plus_domain::services::Services;
use mama_plus_domain::SharedStorage;

use crate::config::AppVariant;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub variant: AppVariant,
    pub storage: SharedStorage,
    pub auth: AuthService,
    pub services: Services,
    pub scheduler: Arc<dyn ReminderScheduler>,
}

impl AppState {
    pub fn new(
        variant: AppVariant,
        storage: SharedStorage,
        tokens: TokenConfig,
        scheduler: Arc<dyn ReminderScheduler>,
    ) -> Self {
        Self {
            variant,
            auth: AuthService::new(storage.clone(), tokens),
            services: Services::new(storage.clone()),
            storage,
            scheduler,
        }
    }
}
