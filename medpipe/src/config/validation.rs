//! Configuration validation utilities.
//!
//! This module provides validation functions for configuration values.

use std::collections::HashSet;

use super::ConfigError;
use super::models::*;
use crate::components::MatchAttr;

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Validate the entire configuration.
pub fn validate_config(config: &MedpipeConfig) -> Result<(), ConfigError> {
    validate_sources(&config.sources)?;
    validate_rulers(&config.rulers)?;
    validate_pipeline(&config.pipeline)?;
    validate_tracking(&config.tracking)?;
    validate_inference(&config.inference)?;
    Ok(())
}

fn validate_sources(sources: &SourcesConfig) -> Result<(), ConfigError> {
    if sources.0.is_empty() {
        return Err(invalid("At least one source pipeline is required"));
    }
    for source in &sources.0 {
        if source.pipeline.trim().is_empty() {
            return Err(invalid("Source pipeline name cannot be empty"));
        }
        if let ProviderConfig::Package { root } = &source.provider
            && root.as_os_str().is_empty()
        {
            return Err(invalid(format!(
                "Package root for source '{}' cannot be empty",
                source.pipeline
            )));
        }
    }
    Ok(())
}

fn validate_rulers(rulers: &RulersConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for ruler in &rulers.0 {
        if ruler.name.trim().is_empty() {
            return Err(invalid("Ruler name cannot be empty"));
        }
        if !names.insert(ruler.name.as_str()) {
            return Err(invalid(format!("Duplicate ruler name '{}'", ruler.name)));
        }
        if ruler.patterns_path.as_os_str().is_empty() {
            return Err(invalid(format!(
                "Ruler '{}' needs a patterns_path",
                ruler.name
            )));
        }
        if MatchAttr::parse(&ruler.phrase_matcher_attr).is_none() {
            return Err(invalid(format!(
                "Ruler '{}' has unsupported phrase_matcher_attr '{}' (expected ORTH or LOWER)",
                ruler.name, ruler.phrase_matcher_attr
            )));
        }
    }
    Ok(())
}

fn validate_pipeline(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.language.trim().is_empty() {
        return Err(invalid("Pipeline language cannot be empty"));
    }
    if config.name.trim().is_empty() {
        return Err(invalid("Pipeline name cannot be empty"));
    }
    if config.recognizer.trim().is_empty() {
        return Err(invalid("Recognizer component name cannot be empty"));
    }
    Ok(())
}

fn validate_tracking(config: &TrackingConfig) -> Result<(), ConfigError> {
    if let Some(uri) = config.tracking_uri()
        && !(uri.starts_with("http://") || uri.starts_with("https://"))
    {
        return Err(invalid(format!(
            "Tracking URI must be an http(s) URL, got '{}'",
            uri
        )));
    }
    if let Some(dagshub) = &config.dagshub
        && (dagshub.repo_owner.trim().is_empty() || dagshub.repo_name.trim().is_empty())
    {
        return Err(invalid("DagsHub repo_owner and repo_name cannot be empty"));
    }
    if config.password.is_some() && config.username.is_none() {
        return Err(invalid("Tracking password set without a username"));
    }
    if config.experiment_name.trim().is_empty() {
        return Err(invalid("Experiment name cannot be empty"));
    }
    if config.artifact_path.trim().is_empty() {
        return Err(invalid("Model artifact path cannot be empty"));
    }
    if config.registered_model_name.trim().is_empty() {
        return Err(invalid("Registered model name cannot be empty"));
    }
    if config.timeout.is_zero() {
        return Err(invalid("Tracking timeout must be greater than zero"));
    }
    if config.retry.backoff_multiplier < 1.0 {
        return Err(invalid("Retry backoff multiplier must be at least 1.0"));
    }
    Ok(())
}

fn validate_inference(config: &InferenceConfig) -> Result<(), ConfigError> {
    if config.enabled && config.text.trim().is_empty() {
        return Err(invalid("Inference text cannot be empty when inference is enabled"));
    }
    if config.model_version == Some(0) {
        return Err(invalid("Model versions start at 1"));
    }
    Ok(())
}
