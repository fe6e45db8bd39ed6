//! Rule dictionary entries and their JSONL format.
//!
//! One JSON object per line:
//!
//! ```text
//! {"label": "ICD", "pattern": "diabetes mellitus", "id": "E11"}
//! {"label": "ICD", "pattern": [{"LOWER": "flu"}]}
//! ```
//!
//! Blank lines are ignored. Token patterns accept one of `ORTH`, `TEXT` or
//! `LOWER` per token.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::pipeline::{PipelineError, Result};

/// Token attribute a pattern token is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchAttr {
    /// Exact token text
    Orth,
    /// Lowercased token text
    Lower,
}

impl MatchAttr {
    /// Parse a token attribute key; `TEXT` is an alias of `ORTH`
    pub fn parse(key: &str) -> Option<Self> {
        match key.to_uppercase().as_str() {
            "ORTH" | "TEXT" => Some(MatchAttr::Orth),
            "LOWER" => Some(MatchAttr::Lower),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchAttr::Orth => "ORTH",
            MatchAttr::Lower => "LOWER",
        }
    }

    /// Normalize a string for comparison under this attribute
    pub fn normalize(&self, text: &str) -> String {
        match self {
            MatchAttr::Orth => text.to_string(),
            MatchAttr::Lower => text.to_lowercase(),
        }
    }
}

/// One token constraint in a token pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpec {
    pub attr: MatchAttr,
    pub value: String,
}

/// Body of a dictionary entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternBody {
    /// A phrase, tokenized with the pipeline tokenizer
    Phrase(String),
    /// An explicit token sequence
    Tokens(Vec<TokenSpec>),
}

/// A validated (pattern, label) dictionary entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPattern {
    pub label: String,
    pub pattern: PatternBody,
    pub id: Option<String>,
}

impl EntityPattern {
    /// Phrase entry
    pub fn phrase(label: impl Into<String>, phrase: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pattern: PatternBody::Phrase(phrase.into()),
            id: None,
        }
    }

    /// Token-sequence entry
    pub fn tokens(label: impl Into<String>, tokens: Vec<TokenSpec>) -> Self {
        Self {
            label: label.into(),
            pattern: PatternBody::Tokens(tokens),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Validate one JSON entry.
    ///
    /// With `strict`, unknown top-level keys are rejected as well.
    pub fn from_json(value: &Value, strict: bool) -> std::result::Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "entry must be a JSON object".to_string())?;

        if strict
            && let Some(key) = object
                .keys()
                .find(|k| !matches!(k.as_str(), "label" | "pattern" | "id"))
        {
            return Err(format!("unknown key '{}'", key));
        }

        let label = match object.get("label") {
            Some(Value::String(label)) if !label.trim().is_empty() => label.clone(),
            Some(Value::String(_)) => return Err("'label' must not be empty".to_string()),
            Some(_) => return Err("'label' must be a string".to_string()),
            None => return Err("missing 'label'".to_string()),
        };

        let pattern = match object.get("pattern") {
            Some(Value::String(phrase)) if !phrase.trim().is_empty() => {
                PatternBody::Phrase(phrase.clone())
            }
            Some(Value::String(_)) => return Err("'pattern' must not be empty".to_string()),
            Some(Value::Array(tokens)) if !tokens.is_empty() => PatternBody::Tokens(
                tokens
                    .iter()
                    .enumerate()
                    .map(|(i, token)| parse_token_spec(i, token))
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
            Some(Value::Array(_)) => return Err("'pattern' must not be empty".to_string()),
            Some(_) => return Err("'pattern' must be a string or a list of tokens".to_string()),
            None => return Err("missing 'pattern'".to_string()),
        };

        let id = match object.get("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => return Err("'id' must be a string".to_string()),
        };

        Ok(Self { label, pattern, id })
    }

    /// JSON representation, the inverse of [`EntityPattern::from_json`]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("label".to_string(), Value::String(self.label.clone()));
        let pattern = match &self.pattern {
            PatternBody::Phrase(phrase) => Value::String(phrase.clone()),
            PatternBody::Tokens(tokens) => Value::Array(
                tokens
                    .iter()
                    .map(|t| {
                        let mut token = Map::new();
                        token.insert(t.attr.as_str().to_string(), Value::String(t.value.clone()));
                        Value::Object(token)
                    })
                    .collect(),
            ),
        };
        object.insert("pattern".to_string(), pattern);
        if let Some(id) = &self.id {
            object.insert("id".to_string(), Value::String(id.clone()));
        }
        Value::Object(object)
    }
}

fn parse_token_spec(index: usize, token: &Value) -> std::result::Result<TokenSpec, String> {
    let object = token
        .as_object()
        .ok_or_else(|| format!("token {} must be an object", index))?;
    if object.len() != 1 {
        return Err(format!(
            "token {} must have exactly one attribute, found {}",
            index,
            object.len()
        ));
    }
    let (key, value) = object
        .iter()
        .next()
        .ok_or_else(|| format!("token {} is empty", index))?;
    let attr = MatchAttr::parse(key)
        .ok_or_else(|| format!("token {} uses unsupported attribute '{}'", index, key))?;
    let value = value
        .as_str()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("token {} value must be a non-empty string", index))?;
    Ok(TokenSpec {
        attr,
        value: value.to_string(),
    })
}

/// Parse JSONL dictionary content; the first malformed entry fails the parse
pub fn parse_jsonl(content: &str, source_name: &str, strict: bool) -> Result<Vec<EntityPattern>> {
    let mut patterns = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .map_err(|e| PipelineError::invalid_pattern(source_name, line_no, e))?;
        let pattern = EntityPattern::from_json(&value, strict)
            .map_err(|reason| PipelineError::invalid_pattern(source_name, line_no, reason))?;
        patterns.push(pattern);
    }
    Ok(patterns)
}

/// Read and validate a JSONL dictionary file
pub fn read_jsonl(path: &Path, strict: bool) -> Result<Vec<EntityPattern>> {
    let content = fs::read_to_string(path)?;
    parse_jsonl(&content, &path.display().to_string(), strict)
}

/// Write patterns as JSONL
pub fn write_jsonl(path: &Path, patterns: &[EntityPattern]) -> Result<()> {
    let mut content = String::new();
    for pattern in patterns {
        content.push_str(&serde_json::to_string(&pattern.to_json())?);
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}
