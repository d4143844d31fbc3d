//! Application state.

use std::sync::Arc;

use pframe_store::{JobStore, StoreConfig};
use pframe_worker::{
    Dispatcher, LocalUploadSource, ProcessingEngine, SimulatedEngine, SimulatedEngineConfig,
    UploadSource, WorkerConfig,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub uploads: Arc<dyn UploadSource>,
}

impl AppState {
    /// Create application state from the environment.
    ///
    /// Starts the dispatcher, so this must run inside the Tokio runtime.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store_config = StoreConfig::from_env();
        let store = pframe_store::connect(&store_config)?;

        let worker_config = WorkerConfig::from_env();
        let uploads: Arc<dyn UploadSource> = Arc::new(LocalUploadSource::new(&worker_config.upload_dir));
        let engine: Arc<dyn ProcessingEngine> =
            Arc::new(SimulatedEngine::new(SimulatedEngineConfig::from_env()));

        Ok(Self::from_parts(config, worker_config, store, engine, uploads))
    }

    /// Assemble state from already-built collaborators.
    pub fn from_parts(
        config: ApiConfig,
        worker_config: WorkerConfig,
        store: Arc<dyn JobStore>,
        engine: Arc<dyn ProcessingEngine>,
        uploads: Arc<dyn UploadSource>,
    ) -> Self {
        let dispatcher = Dispatcher::start(worker_config, store, engine, Arc::clone(&uploads));
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            uploads,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        self.dispatcher.store()
    }

    pub fn engine(&self) -> &Arc<dyn ProcessingEngine> {
        self.dispatcher.engine()
    }
}
