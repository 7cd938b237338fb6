use std::sync::Arc;

use crate::config::AppConfig;
use crate::mail::Mailer;
use crate::store::Store;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            mailer,
        }
    }
}
