use medpipe::config::MedpipeConfig;
use medpipe::tracking::ModelUri;
use medpipe::{MedpipeError, Result};

/// Model to load for `predict`: an explicit URI, else a version of the
/// configured registered model, else its latest version.
pub fn resolve_model_uri(
    config: &MedpipeConfig,
    model: Option<&str>,
    version: Option<u64>,
) -> Result<ModelUri> {
    if let Some(model) = model {
        return Ok(model.parse()?);
    }

    let name = &config.tracking.registered_model_name;
    match version.or(config.inference.model_version) {
        Some(0) => Err(MedpipeError::Other(
            "model versions start at 1".to_string(),
        )),
        Some(version) => Ok(ModelUri::registered(name, version)),
        None => Ok(ModelUri::latest(name)),
    }
}

/// Output format from the flags and `MEDPIPE_OUTPUT`; `--machine` wins
pub fn output_format(machine: bool, output: &str) -> String {
    if machine {
        "json".to_string()
    } else if let Ok(env_output) = std::env::var("MEDPIPE_OUTPUT") {
        env_output
    } else {
        output.to_string()
    }
}

/// Shorten `text` to `max` characters for table cells
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
