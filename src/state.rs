use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{Notifier, Store};

/// Shared handler state, registered once with `web::Data`.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { config, store, notifier }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::test_config;
    use crate::services::memory_store::MemoryStore;
    use crate::services::notification_service::testing::RecordingNotifier;

    /// State over a fresh in-memory store; the concrete handles are returned
    /// so tests can seed data and inspect sent mail.
    pub fn test_state() -> (AppState, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(test_config(), store.clone(), notifier.clone());
        (state, store, notifier)
    }
}
