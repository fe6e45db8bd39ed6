//! Error types for pipeline construction and processing

use std::fmt;
use thiserror::Error;

/// Error type for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A component with this name is already part of the pipeline
    #[error("Component '{0}' already exists in the pipeline")]
    DuplicateComponent(String),

    /// Referenced component is not part of the pipeline
    #[error("Component '{name}' not found in the pipeline (available: {available:?})")]
    ComponentNotFound {
        name: String,
        available: Vec<String>,
    },

    /// No constructor registered under this factory name
    #[error("Unknown component factory '{0}'")]
    UnknownFactory(String),

    /// A rule dictionary entry failed validation
    #[error("Invalid pattern in {source_name} at line {line}: {reason}")]
    InvalidPattern {
        source_name: String,
        line: usize,
        reason: String,
    },

    /// Component configuration could not be applied
    #[error("Invalid config for component '{component}': {reason}")]
    InvalidConfig { component: String, reason: String },

    /// Pipeline package on disk is malformed
    #[error("Invalid pipeline package: {0}")]
    Package(String),

    /// A component failed while processing a document
    #[error("Component '{component}' failed: {reason}")]
    Processing { component: String, reason: String },

    /// IO error while reading or writing pipeline data
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Create a new invalid config error
    pub fn invalid_config(component: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidConfig {
            component: component.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new package error
    pub fn package(msg: impl fmt::Display) -> Self {
        Self::Package(msg.to_string())
    }

    /// Create a new pattern validation error
    pub fn invalid_pattern(
        source_name: impl Into<String>,
        line: usize,
        reason: impl fmt::Display,
    ) -> Self {
        Self::InvalidPattern {
            source_name: source_name.into(),
            line,
            reason: reason.to_string(),
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
