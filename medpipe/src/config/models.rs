//! Configuration model definitions.
//!
//! This module contains the configuration structures for every medpipe stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::tracking::RetryPolicy;

/// Sample clinical sentence run through the loaded model after registration
pub const SAMPLE_TEXT: &str = "Alex and Ritesh are cricket players and Mariam never played baseball. \
Although the two local anesthetics usually do not cause methemoglobinemia, we suspect that the displacement of lidocaine \
from protein binding by bupivacaine, in combination with metabolic acidosis and treatment with other oxidants, \
was the reason for the development of methemoglobinemia.";

/// Main configuration structure for medpipe.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct MedpipeConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Source pipelines, merged in this order
    pub sources: SourcesConfig,

    /// Dictionary rulers, inserted as a chain before the recognizer
    pub rulers: RulersConfig,

    /// Combined pipeline settings
    pub pipeline: PipelineConfig,

    /// Experiment tracking and model registry
    pub tracking: TrackingConfig,

    /// Post-registration inference check
    pub inference: InferenceConfig,
}

/// Ordered list of source pipelines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SourcesConfig(pub Vec<SourceConfig>);

impl Default for SourcesConfig {
    fn default() -> Self {
        Self(vec![
            SourceConfig::package("en_core_web_lg", "./pipelines"),
            SourceConfig::package("stanza_en", "./pipelines"),
        ])
    }
}

/// One source pipeline and where to load it from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Package name, or a `runs:/` / `models:/` URI for tracked sources
    pub pipeline: String,

    /// Provider that resolves `pipeline`
    #[serde(flatten)]
    pub provider: ProviderConfig,
}

impl SourceConfig {
    /// Package under a local root directory
    pub fn package(pipeline: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            pipeline: pipeline.into(),
            provider: ProviderConfig::Package { root: root.into() },
        }
    }

    /// Model logged or registered in the tracking backend
    pub fn tracked(uri: impl Into<String>) -> Self {
        Self {
            pipeline: uri.into(),
            provider: ProviderConfig::Tracking,
        }
    }
}

/// Pipeline provider kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Local package directory
    Package { root: PathBuf },

    /// Tracking backend model URI
    Tracking,
}

/// Ordered list of ruler definitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RulersConfig(pub Vec<RulerConfig>);

impl Default for RulersConfig {
    fn default() -> Self {
        Self(vec![
            RulerConfig::new("icd_ruler", "./corpus/icd10cm-tabular-2024.jsonl"),
            RulerConfig::new("medra_ruler", "./corpus/medraLLT.jsonl"),
        ])
    }
}

/// One dictionary ruler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RulerConfig {
    /// Component name in the pipeline
    pub name: String,

    /// JSONL dictionary file
    pub patterns_path: PathBuf,

    /// Reject unknown keys in dictionary entries
    #[serde(default = "default_true")]
    pub validate: bool,

    /// Let matches replace overlapping entities
    #[serde(default)]
    pub overwrite_ents: bool,

    /// `ORTH` or `LOWER`
    #[serde(default = "default_phrase_matcher_attr")]
    pub phrase_matcher_attr: String,
}

fn default_true() -> bool {
    true
}

fn default_phrase_matcher_attr() -> String {
    "ORTH".to_string()
}

impl RulerConfig {
    pub fn new(name: impl Into<String>, patterns_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            patterns_path: patterns_path.into(),
            validate: true,
            overwrite_ents: false,
            phrase_matcher_attr: default_phrase_matcher_attr(),
        }
    }
}

/// Combined pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Language of the combined pipeline
    pub language: String,

    /// Name given to the combined pipeline
    pub name: String,

    /// Component the first ruler is inserted before
    pub recognizer: String,

    /// Vectorizer component whose static vectors can be disabled
    pub vectorizer: String,

    /// Turn off static vectors in the vectorizer after merging
    pub disable_static_vectors: bool,

    /// Write the combined pipeline package here after building
    pub output_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            name: "combined".to_string(),
            recognizer: "ner".to_string(),
            vectorizer: "tok2vec".to_string(),
            disable_static_vectors: true,
            output_dir: None,
        }
    }
}

/// DagsHub repository hosting an MLflow server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DagsHubConfig {
    pub repo_owner: String,
    pub repo_name: String,
}

impl DagsHubConfig {
    /// MLflow tracking URI of the repository
    pub fn tracking_uri(&self) -> String {
        format!(
            "https://dagshub.com/{}/{}.mlflow",
            self.repo_owner, self.repo_name
        )
    }
}

/// Tracking backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    /// MLflow server base URL
    pub uri: Option<String>,

    /// Derive the URI from a DagsHub repository when `uri` is unset
    pub dagshub: Option<DagsHubConfig>,

    /// Basic auth user
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<String>,

    /// Bearer token, preferred over basic auth
    pub token: Option<String>,

    /// Experiment receiving runs; created on first use
    pub experiment_name: String,

    /// Artifact location for a newly created experiment
    pub artifact_location: Option<String>,

    /// Tags for a newly created experiment
    pub experiment_tags: BTreeMap<String, String>,

    /// Parameters logged on every run
    pub params: BTreeMap<String, String>,

    /// Artifact path of the logged model inside the run
    pub artifact_path: String,

    /// Registered model name
    pub registered_model_name: String,

    /// Upload the ruler dictionaries as run artifacts
    pub log_dictionaries: bool,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Retry policy for failed requests
    pub retry: RetryPolicy,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            uri: None,
            dagshub: None,
            username: None,
            password: None,
            token: None,
            experiment_name: "spacy_stanza_combined_model_experiment_11".to_string(),
            artifact_location: Some("./mlruns".to_string()),
            experiment_tags: BTreeMap::from([
                ("env".to_string(), "dev".to_string()),
                ("version".to_string(), "1.0.0".to_string()),
            ]),
            params: BTreeMap::from([("iterations".to_string(), "10".to_string())]),
            artifact_path: "spacy_combined_model_experiment_11".to_string(),
            registered_model_name: "spacy_combined_ner_model_stanza_test_experiment_model_11"
                .to_string(),
            log_dictionaries: true,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl TrackingConfig {
    /// Effective tracking URI: explicit `uri`, then the DagsHub repository
    pub fn tracking_uri(&self) -> Option<String> {
        self.uri
            .clone()
            .filter(|uri| !uri.trim().is_empty())
            .or_else(|| self.dagshub.as_ref().map(DagsHubConfig::tracking_uri))
    }
}

/// Inference check after registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InferenceConfig {
    /// Run the check at all
    pub enabled: bool,

    /// Registered version to load; the version just registered when unset
    pub model_version: Option<u64>,

    /// Text to run through the loaded model
    pub text: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_version: None,
            text: SAMPLE_TEXT.to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,

    /// Log format
    pub format: LogFormat,

    /// File to log to (if any)
    pub file: Option<PathBuf>,

    /// Whether to log to stdout
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Default,
            file: None,
            stdout: true,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Default format
    Default,

    /// JSON format
    Json,

    /// Compact format
    Compact,

    /// Pretty format
    Pretty,
}
