//! Model URIs: `runs:/<run_id>/<path>` and `models:/<name>/<version|latest>`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::TrackingError;

/// Version selector in a `models:/` URI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSelector {
    Number(u64),
    Latest,
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Number(n) => write!(f, "{}", n),
            VersionSelector::Latest => write!(f, "latest"),
        }
    }
}

/// Location of a logged or registered model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelUri {
    /// Artifact path inside a run
    Run { run_id: String, path: String },
    /// Registered model version
    Registered {
        name: String,
        version: VersionSelector,
    },
}

impl ModelUri {
    pub fn run(run_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Run {
            run_id: run_id.into(),
            path: path.into(),
        }
    }

    pub fn registered(name: impl Into<String>, version: u64) -> Self {
        Self::Registered {
            name: name.into(),
            version: VersionSelector::Number(version),
        }
    }

    pub fn latest(name: impl Into<String>) -> Self {
        Self::Registered {
            name: name.into(),
            version: VersionSelector::Latest,
        }
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelUri::Run { run_id, path } => write!(f, "runs:/{}/{}", run_id, path),
            ModelUri::Registered { name, version } => write!(f, "models:/{}/{}", name, version),
        }
    }
}

impl FromStr for ModelUri {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("runs:/") {
            let rest = rest.trim_start_matches('/');
            let (run_id, path) = rest
                .split_once('/')
                .ok_or_else(|| TrackingError::invalid_uri(s, "expected runs:/<run_id>/<path>"))?;
            let path = path.trim_matches('/');
            if run_id.is_empty() || path.is_empty() {
                return Err(TrackingError::invalid_uri(
                    s,
                    "expected runs:/<run_id>/<path>",
                ));
            }
            return Ok(ModelUri::run(run_id, path));
        }

        if let Some(rest) = s.strip_prefix("models:/") {
            let rest = rest.trim_matches('/');
            let (name, version) = rest.rsplit_once('/').ok_or_else(|| {
                TrackingError::invalid_uri(s, "expected models:/<name>/<version>")
            })?;
            if name.is_empty() {
                return Err(TrackingError::invalid_uri(s, "missing model name"));
            }
            let version = if version.eq_ignore_ascii_case("latest") {
                VersionSelector::Latest
            } else {
                VersionSelector::Number(version.parse().map_err(|_| {
                    TrackingError::invalid_uri(s, format!("invalid version '{}'", version))
                })?)
            };
            return Ok(ModelUri::Registered {
                name: name.to_string(),
                version,
            });
        }

        Err(TrackingError::invalid_uri(
            s,
            "expected a runs:/ or models:/ URI",
        ))
    }
}

impl Serialize for ModelUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModelUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
