//! Wire types of the MLflow REST API.
//!
//! Timestamps are milliseconds since the epoch. Some servers encode int64
//! fields as JSON strings, so they are read with a lenient deserializer.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Key/value tag as sent by the tracking server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

pub(crate) fn to_key_values(map: &BTreeMap<String, String>) -> Vec<KeyValue> {
    map.iter()
        .map(|(key, value)| KeyValue {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

fn to_map(items: Vec<KeyValue>) -> BTreeMap<String, String> {
    items.into_iter().map(|kv| (kv.key, kv.value)).collect()
}

fn tags_as_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Option<Vec<KeyValue>> = Option::deserialize(deserializer)?;
    Ok(to_map(items.unwrap_or_default()))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::String(s) => s,
    })
}

/// Experiment as returned by `experiments/get`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(deserialize_with = "lenient_string")]
    pub experiment_id: String,
    pub name: String,
    #[serde(default)]
    pub artifact_location: Option<String>,
    #[serde(default)]
    pub lifecycle_stage: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub creation_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub last_update_time: Option<i64>,
    #[serde(default, deserialize_with = "tags_as_map")]
    pub tags: BTreeMap<String, String>,
}

impl Experiment {
    /// Creation time as a UTC timestamp
    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.creation_time
            .and_then(chrono::DateTime::from_timestamp_millis)
    }
}

/// Request body for `experiments/create`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewExperiment {
    pub name: String,
    pub artifact_location: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl NewExperiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_artifact_location(mut self, location: impl Into<String>) -> Self {
        self.artifact_location = Some(location.into());
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Run lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Scheduled,
    Finished,
    Failed,
    Killed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Scheduled => "SCHEDULED",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        };
        write!(f, "{}", s)
    }
}

/// Run metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub experiment_id: String,
    #[serde(default)]
    pub run_name: Option<String>,
    pub status: RunStatus,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub start_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub end_time: Option<i64>,
    pub artifact_uri: String,
    #[serde(default)]
    pub lifecycle_stage: Option<String>,
}

/// Run parameters and tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunData {
    #[serde(default, deserialize_with = "tags_as_map")]
    pub params: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "tags_as_map")]
    pub tags: BTreeMap<String, String>,
}

/// A run with its data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub info: RunInfo,
    #[serde(default)]
    pub data: RunData,
}

/// Registered model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub version: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub creation_timestamp: Option<i64>,
}

impl ModelVersion {
    /// Numeric version, if the server used a number
    pub fn version_number(&self) -> Option<u64> {
        self.version.parse().ok()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status.as_deref(), None | Some("READY"))
    }
}

/// One entry of an artifact listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error_code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateExperimentResponse {
    #[serde(deserialize_with = "lenient_string")]
    pub experiment_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExperimentResponse {
    pub experiment: Experiment,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunResponse {
    pub run: Run,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRunsResponse {
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelVersionResponse {
    pub model_version: ModelVersion,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LatestVersionsResponse {
    #[serde(default)]
    pub model_versions: Vec<ModelVersion>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListArtifactsResponse {
    #[serde(default)]
    pub files: Vec<FileInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_experiment_accepts_string_timestamps() {
        let experiment: Experiment = serde_json::from_value(json!({
            "experiment_id": "7",
            "name": "spacy_stanza_combined_model_experiment_11",
            "artifact_location": "mlflow-artifacts:/7",
            "lifecycle_stage": "active",
            "creation_time": "1718000000000",
            "tags": [{"key": "env", "value": "dev"}]
        }))
        .unwrap();

        assert_eq!(experiment.creation_time, Some(1_718_000_000_000));
        assert_eq!(experiment.tags.get("env").map(String::as_str), Some("dev"));
        assert!(experiment.created_at().is_some());
    }

    #[test]
    fn test_run_and_model_version_shapes() {
        let run: Run = serde_json::from_value(json!({
            "info": {
                "run_id": "abc",
                "experiment_id": 7,
                "status": "FINISHED",
                "start_time": 1718000000000i64,
                "artifact_uri": "mlflow-artifacts:/7/abc/artifacts"
            },
            "data": {"params": [{"key": "iterations", "value": "10"}]}
        }))
        .unwrap();
        assert_eq!(run.info.experiment_id, "7");
        assert_eq!(run.info.status, RunStatus::Finished);
        assert_eq!(run.data.params["iterations"], "10");

        let version: ModelVersion = serde_json::from_value(json!({
            "name": "combined",
            "version": 5,
            "status": "PENDING_REGISTRATION"
        }))
        .unwrap();
        assert_eq!(version.version_number(), Some(5));
        assert!(!version.is_ready());
    }
}
