//! Error types for the tracking client

use std::fmt;
use thiserror::Error;

use crate::pipeline::PipelineError;

/// MLflow error code returned when a resource with the same name exists
pub const RESOURCE_ALREADY_EXISTS: &str = "RESOURCE_ALREADY_EXISTS";

/// MLflow error code returned when a lookup finds nothing
pub const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";

/// Error type for tracking operations
#[derive(Debug, Error)]
pub enum TrackingError {
    /// The tracking server answered with a structured MLflow error
    #[error("Tracking API error ({status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The tracking server answered with a non-success status and no MLflow error body
    #[error("Tracking HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    /// The request never got an answer
    #[error("Tracking transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape
    #[error("Unexpected tracking response: {0}")]
    Response(String),

    /// A tracking or model URI could not be parsed
    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// No artifact backend for this URI scheme
    #[error("Unsupported artifact URI: {0}")]
    UnsupportedArtifactUri(String),

    /// Writing or reading a pipeline snapshot failed
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// IO error while staging artifacts
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrackingError {
    /// Create a new invalid URI error
    pub fn invalid_uri(uri: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new response shape error
    pub fn response(msg: impl fmt::Display) -> Self {
        Self::Response(msg.to_string())
    }

    /// MLflow error code, if the server sent one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the server rejected a create because the resource exists
    pub fn is_already_exists(&self) -> bool {
        self.code() == Some(RESOURCE_ALREADY_EXISTS)
    }

    /// Whether the server reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { code, status, .. } => code == RESOURCE_DOES_NOT_EXIST || *status == 404,
            Self::Http { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } | Self::Http { status, .. } => {
                *status >= 500 || *status == 429
            }
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// The request never reached the server
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect())
    }
}

/// Result type for tracking operations
pub type Result<T> = std::result::Result<T, TrackingError>;
