//! Traits and config types shared by all pipeline components.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use super::Result;
use super::doc::Doc;

/// What a component contributes to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Attaches dense vectors to tokens
    Vectorizer,
    /// Assigns token tags
    Tagger,
    /// Marks sentence boundaries
    SentenceBoundary,
    /// Statistical named entity recognizer
    EntityRecognizer,
    /// Dictionary-driven entity matcher
    EntityRuler,
}

/// Mutable key/value configuration owned by a component.
///
/// Serialized verbatim into the pipeline package manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentConfig(Map<String, Value>);

impl ComponentConfig {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from a JSON value; anything but an object yields an empty config
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    /// Set a value, returning the previous one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style `set`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// A named processing step in a [`Pipeline`](super::Pipeline).
///
/// The pipeline owns the component's name; the component owns its factory
/// name and config so it can be written back to a package and rebuilt.
pub trait Component: Send + Sync + std::fmt::Debug {
    /// Factory name used to rebuild this component from a package
    fn factory(&self) -> &str;

    /// What this component adds to a document
    fn capability(&self) -> Capability;

    fn config(&self) -> &ComponentConfig;

    /// Mutable config; components read their options at process time so
    /// edits made after construction take effect.
    fn config_mut(&mut self) -> &mut ComponentConfig;

    /// Annotate the document in place
    fn process(&self, doc: &mut Doc) -> Result<()>;

    /// Write component data (tables, patterns) into `dir`.
    ///
    /// Components without data files keep the default no-op.
    fn to_disk(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }
}
