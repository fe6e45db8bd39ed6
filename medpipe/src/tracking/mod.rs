//! Experiment tracking and model registry.
//!
//! [`Tracker`] is the seam the workflow talks to; [`MlflowClient`] implements
//! it against the MLflow REST API. Logged models are pipeline packages plus an
//! `MLmodel` descriptor, so [`Tracker::load_model`] gives back a runnable
//! [`Pipeline`].

pub mod artifacts;
mod client;
mod error;
mod retry;
mod types;
mod uri;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub use artifacts::ArtifactLocation;
pub use client::{FLAVOR, MLMODEL_FILE, MODEL_DATA_DIR, MlflowClient};
pub use error::*;
pub use retry::RetryPolicy;
pub use types::{
    Experiment, FileInfo, KeyValue, ModelVersion, NewExperiment, Run, RunData, RunInfo, RunStatus,
};
pub use uri::{ModelUri, VersionSelector};

use crate::pipeline::{FactoryRegistry, Pipeline, PipelineProvider};

/// Operations the workflow needs from a tracking backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Create an experiment, returning its id
    async fn create_experiment(&self, experiment: &NewExperiment) -> Result<String>;

    async fn get_experiment(&self, experiment_id: &str) -> Result<Experiment>;

    /// Look up an experiment by name; `None` if it does not exist
    async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>>;

    /// Start a run in an experiment
    async fn create_run(&self, experiment_id: &str) -> Result<RunInfo>;

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Snapshot a pipeline under `artifact_path` of the run
    async fn log_model(
        &self,
        run: &RunInfo,
        pipeline: &Pipeline,
        artifact_path: &str,
    ) -> Result<ModelUri>;

    /// Upload a local file (or directory) to the run's artifact root
    async fn log_artifact(&self, run: &RunInfo, local_path: &Path) -> Result<()>;

    async fn finish_run(&self, run_id: &str, status: RunStatus) -> Result<()>;

    /// Register a `runs:/` model under `name`, creating the registered model if needed
    async fn register_model(&self, model_uri: &ModelUri, name: &str) -> Result<ModelVersion>;

    /// Download a logged or registered model and rebuild it through `registry`
    async fn load_model(&self, model_uri: &ModelUri, registry: &FactoryRegistry)
    -> Result<Pipeline>;

    /// Runs of the given experiments, newest first
    async fn search_runs(&self, experiment_ids: &[String], max_results: usize) -> Result<Vec<Run>>;
}

/// Pipeline provider resolving `runs:/` and `models:/` URIs through a tracker
pub struct TrackingProvider<T: Tracker + ?Sized> {
    name: String,
    tracker: Arc<T>,
}

impl<T: Tracker + ?Sized> TrackingProvider<T> {
    pub fn new(name: impl Into<String>, tracker: Arc<T>) -> Self {
        Self {
            name: name.into(),
            tracker,
        }
    }
}

impl<T: Tracker + ?Sized> fmt::Debug for TrackingProvider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingProvider")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<T: Tracker + ?Sized> PipelineProvider for TrackingProvider<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, pipeline: &str, registry: &FactoryRegistry) -> crate::Result<Pipeline> {
        let uri: ModelUri = pipeline.parse()?;
        Ok(self.tracker.load_model(&uri, registry).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracking_provider_parses_uri() {
        let mut tracker = MockTracker::new();
        tracker
            .expect_load_model()
            .withf(|uri, _| *uri == ModelUri::registered("combined", 5))
            .times(1)
            .returning(|_, _| Ok(Pipeline::blank("en").with_name("combined")));

        let provider = TrackingProvider::new("mlflow", Arc::new(tracker));
        let registry = FactoryRegistry::empty();
        let nlp = provider.load("models:/combined/5", &registry).await.unwrap();
        assert_eq!(nlp.name(), "combined");

        assert!(provider.load("not-a-uri", &registry).await.is_err());
    }
}
