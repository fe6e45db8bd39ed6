//! Configuration loader.
//!
//! This module provides functionality to load configuration from multiple sources.

use super::{
    ConfigError, DEFAULT_CONFIG_FILES, ENV_PREFIX, MLFLOW_ENV_KEYS, Result, models::*, validation,
};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader that handles loading from multiple sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    figment: Figment,
}

impl ConfigLoader {
    /// Create a new configuration loader with default values.
    pub fn new() -> Self {
        let figment = Figment::new().merge(Serialized::defaults(MedpipeConfig::default()));
        Self { figment }
    }

    fn merge_provider<T: figment::Provider>(&mut self, provider: T) {
        let figment = std::mem::take(&mut self.figment).merge(provider);
        self.figment = figment;
    }

    /// Load configuration from a file.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileLoadError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => self.merge_provider(Toml::file(path)),
            Some("yaml") | Some("yml") => self.merge_provider(Yaml::file(path)),
            Some("json") => self.merge_provider(Json::file(path)),
            _ => {
                return Err(ConfigError::FileLoadError(format!(
                    "Unsupported file format: {}",
                    path.display()
                )));
            }
        }

        debug!(path = %path.display(), "Loaded configuration file");
        Ok(self)
    }

    /// Attempt to load from default configuration file locations.
    pub fn load_default_files(&mut self) -> &mut Self {
        for file in DEFAULT_CONFIG_FILES {
            let path = PathBuf::from(file);
            if path.exists() && self.load_file(&path).is_ok() {
                return self;
            }
        }

        // Fall back to the platform config directory
        if let Some(proj_dirs) = directories::ProjectDirs::from("org", "medpipe", "medpipe") {
            let config_dir = proj_dirs.config_dir();
            for ext in ["toml", "yaml", "yml", "json"] {
                let path = config_dir.join(format!("config.{}", ext));
                if path.exists() && self.load_file(&path).is_ok() {
                    break;
                }
            }
        }

        self
    }

    /// Load the standard MLflow variables and `MEDPIPE_` variables.
    pub fn load_env(&mut self) -> &mut Self {
        for &(var, key) in MLFLOW_ENV_KEYS {
            self.merge_provider(Env::raw().only(&[var]).map(move |_| key.into()));
        }
        self.merge_provider(Env::prefixed(ENV_PREFIX).split("__"));
        self
    }

    /// Load configuration from a custom source.
    pub fn merge<T: figment::Provider>(&mut self, provider: T) -> &mut Self {
        self.merge_provider(provider);
        self
    }

    /// Extract and validate the configuration.
    pub fn extract(&self) -> Result<MedpipeConfig> {
        let config: MedpipeConfig = self
            .figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        validation::validate_config(&config)?;

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration the way the CLI does: defaults, then `path` (or the
/// default file locations), then the environment.
pub fn load_config(path: Option<&Path>) -> Result<MedpipeConfig> {
    let mut loader = ConfigLoader::new();
    match path {
        Some(path) => {
            loader.load_file(path)?;
        }
        None => {
            loader.load_default_files();
        }
    }
    loader.load_env().extract()
}
