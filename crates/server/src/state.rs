use std::sync::Arc;

use reelfetch_core::{ArtifactStore, Config, Extractor, Orchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn store(&self) -> &ArtifactStore {
        self.orchestrator.store()
    }

    pub fn extractor(&self) -> &dyn Extractor {
        self.orchestrator.extractor().as_ref()
    }
}
