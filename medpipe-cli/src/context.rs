use medpipe::config::MedpipeConfig;
use medpipe::pipeline::FactoryRegistry;
use medpipe::tracking::{MlflowClient, Tracker};
use medpipe::{MedpipeError, Result};
use std::sync::Arc;
use tracing::debug;

pub struct MedpipeCliContext {
    pub config: MedpipeConfig,
    pub registry: FactoryRegistry,
    pub tracker: Option<Arc<dyn Tracker>>,
}

impl MedpipeCliContext {
    /// Builtin factories, plus an MLflow client when a tracking server is configured
    pub fn new(config: MedpipeConfig) -> Result<Self> {
        let tracker: Option<Arc<dyn Tracker>> = match config.tracking.tracking_uri() {
            Some(uri) => {
                debug!(tracking_uri = %uri, "Using MLflow tracking server");
                Some(Arc::new(MlflowClient::new(&config.tracking)?))
            }
            None => None,
        };

        Ok(Self {
            config,
            registry: FactoryRegistry::with_builtins(),
            tracker,
        })
    }

    /// Context without a tracker; commands that need one fail
    pub fn offline(config: MedpipeConfig) -> Self {
        Self {
            config,
            registry: FactoryRegistry::with_builtins(),
            tracker: None,
        }
    }

    pub fn tracker(&self) -> Result<&Arc<dyn Tracker>> {
        self.tracker.as_ref().ok_or_else(|| {
            MedpipeError::Configuration(
                "no tracking server configured; set tracking.uri, tracking.dagshub or MLFLOW_TRACKING_URI"
                    .to_string(),
            )
        })
    }
}
