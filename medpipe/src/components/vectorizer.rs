//! `tok2vec`: hashed token features, optionally combined with static vectors.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::pipeline::{
    Capability, Component, ComponentConfig, Doc, FactoryContext, PipelineError, Result,
};

/// Factory name
pub const TOK2VEC: &str = "tok2vec";

/// Config key toggling static vector lookup
pub const INCLUDE_STATIC_VECTORS: &str = "include_static_vectors";

const VECTORS_FILE: &str = "vectors.json";
const DEFAULT_WIDTH: usize = 96;

/// Token vectorizer.
///
/// Each token gets a `width`-dimensional vector built from signed hashed
/// features (lowercase form, prefix, suffix, shape). When
/// `include_static_vectors` is true and the token's lowercase form has a row
/// in the static table, that row is added on top.
#[derive(Debug)]
pub struct Tok2Vec {
    config: ComponentConfig,
    width: usize,
    static_vectors: HashMap<String, Vec<f32>>,
}

impl Tok2Vec {
    pub fn new(mut config: ComponentConfig, static_vectors: HashMap<String, Vec<f32>>) -> Result<Self> {
        let width = config.get_u64("width").map(|w| w as usize).unwrap_or(DEFAULT_WIDTH);
        if width == 0 {
            return Err(PipelineError::invalid_config(TOK2VEC, "width must be greater than 0"));
        }
        if let Some((word, row)) = static_vectors.iter().find(|(_, row)| row.len() != width) {
            return Err(PipelineError::invalid_config(
                TOK2VEC,
                format!(
                    "static vector for '{}' has {} dimensions, expected {}",
                    word,
                    row.len(),
                    width
                ),
            ));
        }

        config.set("width", width as u64);
        if !config.contains_key(INCLUDE_STATIC_VECTORS) {
            config.set(INCLUDE_STATIC_VECTORS, true);
        }

        Ok(Self {
            config,
            width,
            static_vectors,
        })
    }

    /// Factory entry point; reads `vectors.json` from the data directory if present
    pub fn from_context(ctx: FactoryContext<'_>) -> Result<Self> {
        let static_vectors = match ctx.data_dir.map(|dir| dir.join(VECTORS_FILE)) {
            Some(path) if path.is_file() => {
                let content = fs::read_to_string(&path)?;
                serde_json::from_str(&content)?
            }
            _ => HashMap::new(),
        };
        Self::new(ctx.config, static_vectors)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn include_static_vectors(&self) -> bool {
        self.config.get_bool(INCLUDE_STATIC_VECTORS).unwrap_or(true)
    }

    fn hashed_vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let chars: Vec<char> = lower.chars().collect();
        let prefix: String = chars.iter().take(1).collect();
        let suffix: String = chars[chars.len().saturating_sub(3)..].iter().collect();
        let features = [
            format!("lower={}", lower),
            format!("prefix={}", prefix),
            format!("suffix={}", suffix),
            format!("shape={}", word_shape(text)),
        ];

        let mut vector = vec![0.0; self.width];
        for feature in &features {
            let digest = Sha256::digest(feature.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.width;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

/// Coarse orthographic shape, e.g. "Lidocaine" -> "Xxxx", "10mg" -> "ddxx"
fn word_shape(text: &str) -> String {
    let mut shape = String::new();
    let mut last = None;
    let mut run = 0;
    for c in text.chars() {
        let class = if c.is_uppercase() {
            'X'
        } else if c.is_lowercase() {
            'x'
        } else if c.is_ascii_digit() {
            'd'
        } else {
            c
        };
        if Some(class) == last {
            run += 1;
        } else {
            run = 1;
            last = Some(class);
        }
        if run <= 4 {
            shape.push(class);
        }
    }
    shape
}

impl Component for Tok2Vec {
    fn factory(&self) -> &str {
        TOK2VEC
    }

    fn capability(&self) -> Capability {
        Capability::Vectorizer
    }

    fn config(&self) -> &ComponentConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ComponentConfig {
        &mut self.config
    }

    fn process(&self, doc: &mut Doc) -> Result<()> {
        let use_static = self.include_static_vectors();
        for token in doc.tokens_mut() {
            let mut vector = self.hashed_vector(&token.text);
            if use_static && let Some(row) = self.static_vectors.get(&token.lower()) {
                for (value, static_value) in vector.iter_mut().zip(row) {
                    *value += static_value;
                }
            }
            token.vector = Some(vector);
        }
        Ok(())
    }

    fn to_disk(&self, dir: &Path) -> Result<()> {
        if self.static_vectors.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(dir)?;
        fs::write(
            dir.join(VECTORS_FILE),
            serde_json::to_string(&self.static_vectors)?,
        )?;
        Ok(())
    }
}
