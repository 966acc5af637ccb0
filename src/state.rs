use chrono::FixedOffset;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::Store;
use crate::services::daraja_service::DarajaService;
use crate::services::dispatcher::WebhookDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub dispatcher: WebhookDispatcher,
    pub daraja: Arc<DarajaService>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, daraja: Arc<DarajaService>) -> Self {
        let dispatcher = WebhookDispatcher::new(store.clone(), config.provider_utc_offset);
        AppState {
            config: Arc::new(config),
            store,
            dispatcher,
            daraja,
        }
    }

    pub fn provider_offset(&self) -> FixedOffset {
        self.config.provider_utc_offset
    }
}
