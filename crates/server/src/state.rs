use std::sync::Arc;
use transcoder_core::{
    Config, EventStore, SanitizedConfig, TranscodingService, WorkerPool,
};

/// Shared application state
pub struct AppState {
    config: Config,
    service: Arc<TranscodingService>,
    pool: Arc<WorkerPool>,
    event_store: Arc<dyn EventStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        service: Arc<TranscodingService>,
        pool: Arc<WorkerPool>,
        event_store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            config,
            service,
            pool,
            event_store,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn service(&self) -> &TranscodingService {
        self.service.as_ref()
    }

    pub fn pool(&self) -> &WorkerPool {
        self.pool.as_ref()
    }

    pub fn event_store(&self) -> &dyn EventStore {
        self.event_store.as_ref()
    }
}
