//! Configuration system for medpipe.
//!
//! Configuration is layered: serialized defaults, then an optional file, then
//! the standard `MLFLOW_TRACKING_*` variables, then `MEDPIPE_` variables with
//! `__` separating nested keys (e.g. `MEDPIPE_TRACKING__EXPERIMENT_NAME`).

mod builder;
mod loader;
mod models;
mod validation;

pub use builder::ConfigBuilder;
pub use loader::{ConfigLoader, load_config};
pub use models::*;
pub use validation::validate_config;

/// Default configuration file names that the system will look for
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "medpipe.toml",
    "medpipe.yaml",
    "medpipe.yml",
    "medpipe.json",
    ".medpipe/config.toml",
    ".medpipe/config.yaml",
    ".medpipe/config.yml",
    ".medpipe/config.json",
];

/// Environment variable prefix for medpipe configuration
pub const ENV_PREFIX: &str = "MEDPIPE_";

/// Standard MLflow variables and the config keys they fill
pub const MLFLOW_ENV_KEYS: &[(&str, &str)] = &[
    ("MLFLOW_TRACKING_URI", "tracking.uri"),
    ("MLFLOW_TRACKING_USERNAME", "tracking.username"),
    ("MLFLOW_TRACKING_PASSWORD", "tracking.password"),
    ("MLFLOW_TRACKING_TOKEN", "tracking.token"),
    ("MLFLOW_EXPERIMENT_NAME", "tracking.experiment_name"),
];

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error occurred during file loading
    #[error("Failed to load configuration file: {0}")]
    FileLoadError(String),

    /// Error occurred during validation
    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    /// Error occurred during parsing
    #[error("Configuration parsing error: {0}")]
    ParseError(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
