//! Configuration builder.
//!
//! This module provides a builder pattern API for creating configurations.

use super::{Result, models::*, validation};
use std::path::Path;
use std::time::Duration;

/// Builder for creating MedpipeConfig instances.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: MedpipeConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: MedpipeConfig) -> Self {
        Self { config }
    }

    /// Replace the source pipelines.
    pub fn with_sources(mut self, sources: Vec<SourceConfig>) -> Self {
        self.config.sources = SourcesConfig(sources);
        self
    }

    /// Append a package source under `root`.
    pub fn with_package_source(
        mut self,
        pipeline: impl Into<String>,
        root: impl AsRef<Path>,
    ) -> Self {
        self.config
            .sources
            .0
            .push(SourceConfig::package(pipeline, root.as_ref()));
        self
    }

    /// Replace the rulers.
    pub fn with_rulers(mut self, rulers: Vec<RulerConfig>) -> Self {
        self.config.rulers = RulersConfig(rulers);
        self
    }

    /// Append a ruler reading `patterns_path`.
    pub fn with_ruler(mut self, name: impl Into<String>, patterns_path: impl AsRef<Path>) -> Self {
        self.config
            .rulers
            .0
            .push(RulerConfig::new(name, patterns_path.as_ref()));
        self
    }

    /// Set the language of the combined pipeline.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.config.pipeline.language = language.into();
        self
    }

    /// Choose whether static vectors are disabled after merging.
    pub fn with_static_vectors_disabled(mut self, disabled: bool) -> Self {
        self.config.pipeline.disable_static_vectors = disabled;
        self
    }

    /// Write the combined pipeline package to `dir`.
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.pipeline.output_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the tracking server URL.
    pub fn with_tracking_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.tracking.uri = Some(uri.into());
        self
    }

    /// Track against a DagsHub-hosted MLflow server.
    pub fn with_dagshub(mut self, repo_owner: impl Into<String>, repo_name: impl Into<String>) -> Self {
        self.config.tracking.dagshub = Some(DagsHubConfig {
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
        });
        self
    }

    /// Authenticate with a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.config.tracking.token = Some(token.into());
        self
    }

    /// Authenticate with basic auth.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.tracking.username = Some(username.into());
        self.config.tracking.password = Some(password.into());
        self
    }

    /// Set the experiment name.
    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.config.tracking.experiment_name = name.into();
        self
    }

    /// Set the registered model name.
    pub fn with_registered_model_name(mut self, name: impl Into<String>) -> Self {
        self.config.tracking.registered_model_name = name.into();
        self
    }

    /// Set the artifact path of the logged model.
    pub fn with_artifact_path(mut self, path: impl Into<String>) -> Self {
        self.config.tracking.artifact_path = path.into();
        self
    }

    /// Add a run parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.config
            .tracking
            .params
            .insert(key.into(), value.to_string());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.tracking.timeout = timeout;
        self
    }

    /// Pin the model version loaded for inference.
    pub fn with_model_version(mut self, version: u64) -> Self {
        self.config.inference.model_version = Some(version);
        self
    }

    /// Set the inference text.
    pub fn with_inference_text(mut self, text: impl Into<String>) -> Self {
        self.config.inference.text = text.into();
        self
    }

    /// Skip the inference check.
    pub fn without_inference(mut self) -> Self {
        self.config.inference.enabled = false;
        self
    }

    /// Set the log level.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set the log format.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.config.logging.format = format;
        self
    }

    /// Configure logging to a file.
    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.logging.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<MedpipeConfig> {
        validation::validate_config(&self.config)?;
        Ok(self.config)
    }
}
