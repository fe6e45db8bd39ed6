//! # medpipe
//!
//! Builds a combined clinical NLP pipeline from two source pipelines, layers
//! dictionary-driven entity rulers on top of it, and tracks the result with an
//! MLflow-compatible experiment tracker.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medpipe::prelude::*;
//!
//! # async fn example() -> medpipe::Result<()> {
//! let config = load_config(None)?;
//! let registry = FactoryRegistry::with_builtins();
//!
//! let report = build_from_config(&config, None, &registry).await?;
//! let doc = report.pipeline.process(SAMPLE_TEXT)?;
//! for ent in doc.ents() {
//!     println!("{}", ent.format());
//! }
//!
//! let tracker = MlflowClient::new(&config.tracking)?;
//! let outcome = run_workflow(&tracker, &report.pipeline, &config, &registry).await?;
//! println!("registered as {:?}", outcome.registered);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **pipeline**: documents, components, merging and on-disk packages
//! - **components**: builtin factories, including the entity ruler
//! - **tracking**: the [`tracking::Tracker`] seam and its MLflow REST client
//! - **workflow**: build-then-return pipeline construction and the tracked run

pub mod components;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod runtime;
pub mod tracking;
pub mod workflow;

/// The prelude re-exports commonly used types for convenience
pub mod prelude {
    pub use crate::config::{
        ConfigBuilder, LogLevel, MedpipeConfig, RulerConfig, SAMPLE_TEXT, SourceConfig,
        load_config,
    };

    pub use crate::pipeline::{
        Component, ComponentConfig, Doc, Entity, FactoryContext, FactoryRegistry, PipePosition,
        Pipeline, merge_pipelines,
    };

    pub use crate::components::{EntityRuler, RulerOptions};

    pub use crate::tracking::{MlflowClient, ModelUri, Tracker};

    pub use crate::workflow::{
        BuildReport, WorkflowOutcome, build_combined_pipeline, build_from_config, run_workflow,
    };

    pub use crate::{MedpipeError, Result};
}

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error type for medpipe operations
#[derive(Debug, thiserror::Error)]
pub enum MedpipeError {
    /// Building or running a pipeline failed
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] pipeline::PipelineError),

    /// Talking to the tracking server failed
    #[error("Tracking error: {0}")]
    Tracking(#[from] tracking::TrackingError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Logging error
    #[error("Logging error: {0}")]
    Logging(#[from] logging::LogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other unclassified errors
    #[error("{0}")]
    Other(String),
}

impl From<config::ConfigError> for MedpipeError {
    fn from(err: config::ConfigError) -> Self {
        MedpipeError::Configuration(err.to_string())
    }
}

/// Result type for medpipe operations
pub type Result<T> = std::result::Result<T, MedpipeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: MedpipeError = config::ConfigError::ValidationError("bad".to_string()).into();
        assert!(matches!(err, MedpipeError::Configuration(_)));
        assert!(err.to_string().contains("bad"));

        let err: MedpipeError = pipeline::PipelineError::UnknownFactory("x".to_string()).into();
        assert_eq!(err.to_string(), "Pipeline error: Unknown component factory 'x'");
    }
}
