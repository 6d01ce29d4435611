use std::sync::Arc;

use crate::audit::AuditLogger;
use crate::auth::AuthProvider;
use crate::config::AppConfig;
use crate::db::store::Store;
use crate::realtime::ChangeFeed;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: Arc<dyn AuthProvider>,
    pub audit: AuditLogger,
    pub feed: ChangeFeed,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        auth: Arc<dyn AuthProvider>,
        feed: ChangeFeed,
        config: AppConfig,
    ) -> Self {
        Self {
            audit: AuditLogger::new(store.clone()),
            store,
            auth,
            feed,
            config: Arc::new(config),
        }
    }
}
