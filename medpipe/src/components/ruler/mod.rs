//! `entity_ruler`: dictionary-driven entity matching.
//!
//! A ruler is built from a validated rule dictionary and is immutable once it
//! is part of a pipeline. Phrase patterns are tokenized with the pipeline
//! tokenizer and matched on token boundaries. Overlapping matches resolve
//! longest-first, then earliest-first.
//!
//! Config keys:
//! - `patterns_path`: JSONL dictionary loaded at construction
//! - `validate` (default `true`): also reject unknown keys in entries
//! - `overwrite_ents` (default `false`): replace overlapping entities instead
//!   of skipping the match
//! - `phrase_matcher_attr` (default `ORTH`): `ORTH` or `LOWER` for phrases

pub mod patterns;

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use patterns::{EntityPattern, MatchAttr, PatternBody, TokenSpec};

use crate::pipeline::{
    Capability, Component, ComponentConfig, Doc, Entity, FactoryContext, PipelineError, Result,
    Tokenizer,
};

/// Factory name
pub const ENTITY_RULER: &str = "entity_ruler";

const PATTERNS_FILE: &str = "patterns.jsonl";

/// A pattern compiled against the pipeline tokenizer
#[derive(Debug, Clone)]
struct CompiledPattern {
    tokens: Vec<TokenSpec>,
    label: String,
    id: Option<String>,
}

impl CompiledPattern {
    fn matches_at(&self, doc: &Doc, start: usize) -> bool {
        let tokens = doc.tokens();
        if start + self.tokens.len() > tokens.len() {
            return false;
        }
        self.tokens
            .iter()
            .zip(&tokens[start..])
            .all(|(spec, token)| spec.attr.normalize(&token.text) == spec.value)
    }
}

/// Options controlling ruler construction and matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulerOptions {
    pub validate: bool,
    pub overwrite_ents: bool,
    pub phrase_matcher_attr: MatchAttr,
}

impl Default for RulerOptions {
    fn default() -> Self {
        Self {
            validate: true,
            overwrite_ents: false,
            phrase_matcher_attr: MatchAttr::Orth,
        }
    }
}

impl RulerOptions {
    fn from_config(config: &ComponentConfig) -> Result<Self> {
        let defaults = Self::default();
        let phrase_matcher_attr = match config.get_str("phrase_matcher_attr") {
            Some(attr) => MatchAttr::parse(attr).ok_or_else(|| {
                PipelineError::invalid_config(
                    ENTITY_RULER,
                    format!("unsupported phrase_matcher_attr '{}'", attr),
                )
            })?,
            None => defaults.phrase_matcher_attr,
        };
        Ok(Self {
            validate: config.get_bool("validate").unwrap_or(defaults.validate),
            overwrite_ents: config
                .get_bool("overwrite_ents")
                .unwrap_or(defaults.overwrite_ents),
            phrase_matcher_attr,
        })
    }

    fn write_to(&self, config: &mut ComponentConfig) {
        config.set("validate", self.validate);
        config.set("overwrite_ents", self.overwrite_ents);
        config.set("phrase_matcher_attr", self.phrase_matcher_attr.as_str());
    }
}

/// Dictionary-driven entity matcher
#[derive(Debug)]
pub struct EntityRuler {
    name: String,
    config: ComponentConfig,
    tokenizer: Tokenizer,
    patterns: Vec<EntityPattern>,
    compiled: Vec<CompiledPattern>,
    /// lowercased first token -> compiled pattern indices
    first_token_index: HashMap<String, Vec<usize>>,
}

impl EntityRuler {
    /// Create an empty ruler with the given options
    pub fn new(name: impl Into<String>, tokenizer: Tokenizer, options: RulerOptions) -> Self {
        let mut config = ComponentConfig::new();
        options.write_to(&mut config);
        Self {
            name: name.into(),
            config,
            tokenizer,
            patterns: Vec::new(),
            compiled: Vec::new(),
            first_token_index: HashMap::new(),
        }
    }

    /// Create a ruler from a JSONL dictionary file.
    ///
    /// Fails on the first malformed entry.
    pub fn from_jsonl(
        name: impl Into<String>,
        path: &Path,
        tokenizer: Tokenizer,
        options: RulerOptions,
    ) -> Result<Self> {
        let patterns = patterns::read_jsonl(path, options.validate)?;
        let mut ruler = Self::new(name, tokenizer, options);
        ruler.config.set("patterns_path", path.display().to_string());
        ruler.add_patterns(patterns)?;
        info!(
            ruler = %ruler.name,
            path = %path.display(),
            patterns = ruler.len(),
            labels = ruler.labels().len(),
            "Loaded entity ruler dictionary"
        );
        Ok(ruler)
    }

    /// Factory entry point.
    ///
    /// Patterns come from `patterns.jsonl` in the component data directory
    /// when present, otherwise from the `patterns_path` config key.
    pub fn from_context(ctx: FactoryContext<'_>) -> Result<Self> {
        let options = RulerOptions::from_config(&ctx.config)?;
        let packaged = ctx
            .data_dir
            .map(|dir| dir.join(PATTERNS_FILE))
            .filter(|path| path.is_file());
        let configured = ctx.config.get_str("patterns_path").map(PathBuf::from);

        let mut ruler = match packaged.or(configured) {
            Some(path) => Self::from_jsonl(ctx.name, &path, ctx.tokenizer.clone(), options)?,
            None => Self::new(ctx.name, ctx.tokenizer.clone(), options),
        };
        // Keep the dictionary path the caller configured, not the package copy
        if let Some(path) = ctx.config.get("patterns_path") {
            ruler.config.set("patterns_path", path.clone());
        }
        Ok(ruler)
    }

    /// Add validated patterns; used while building, before the ruler joins a pipeline
    pub fn add_patterns(&mut self, patterns: Vec<EntityPattern>) -> Result<()> {
        let attr = RulerOptions::from_config(&self.config)?.phrase_matcher_attr;
        for pattern in patterns {
            let tokens = match &pattern.pattern {
                PatternBody::Phrase(phrase) => self
                    .tokenizer
                    .words(phrase)
                    .into_iter()
                    .map(|word| TokenSpec {
                        attr,
                        value: attr.normalize(&word),
                    })
                    .collect::<Vec<_>>(),
                PatternBody::Tokens(tokens) => tokens
                    .iter()
                    .map(|t| TokenSpec {
                        attr: t.attr,
                        value: t.attr.normalize(&t.value),
                    })
                    .collect(),
            };
            let Some(first) = tokens.first() else {
                debug!(ruler = %self.name, label = %pattern.label, "Skipping pattern without tokens");
                continue;
            };

            let index = self.compiled.len();
            self.first_token_index
                .entry(first.value.to_lowercase())
                .or_default()
                .push(index);
            self.compiled.push(CompiledPattern {
                tokens,
                label: pattern.label.clone(),
                id: pattern.id.clone(),
            });
            self.patterns.push(pattern);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of dictionary entries
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[EntityPattern] {
        &self.patterns
    }

    /// Distinct labels across all entries
    pub fn labels(&self) -> BTreeSet<&str> {
        self.patterns.iter().map(|p| p.label.as_str()).collect()
    }

    fn overwrite_ents(&self) -> bool {
        self.config.get_bool("overwrite_ents").unwrap_or(false)
    }

    /// All pattern matches as entities, overlaps resolved longest-first
    pub fn matches(&self, doc: &Doc) -> Vec<Entity> {
        let mut found: Vec<(usize, usize, &CompiledPattern)> = Vec::new();
        for (start, token) in doc.tokens().iter().enumerate() {
            let Some(candidates) = self.first_token_index.get(&token.lower()) else {
                continue;
            };
            for &index in candidates {
                let pattern = &self.compiled[index];
                if pattern.matches_at(doc, start) {
                    found.push((start, start + pattern.tokens.len(), pattern));
                }
            }
        }

        found.sort_by(|(sa, ea, _), (sb, eb, _)| (eb - sb).cmp(&(ea - sa)).then(sa.cmp(sb)));

        let mut kept: Vec<Entity> = Vec::new();
        for (start, end, pattern) in found {
            if kept.iter().any(|e| start < e.end_token && e.start_token < end) {
                continue;
            }
            if let Some(mut entity) = doc.make_entity(start, end, &pattern.label, &self.name, 1.0)
            {
                entity.pattern_id = pattern.id.clone();
                kept.push(entity);
            }
        }
        kept.sort_by_key(|e| e.start_token);
        kept
    }
}

impl Component for EntityRuler {
    fn factory(&self) -> &str {
        ENTITY_RULER
    }

    fn capability(&self) -> Capability {
        Capability::EntityRuler
    }

    fn config(&self) -> &ComponentConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ComponentConfig {
        &mut self.config
    }

    fn process(&self, doc: &mut Doc) -> Result<()> {
        let overwrite = self.overwrite_ents();
        for entity in self.matches(doc) {
            if overwrite {
                doc.replace_overlapping(entity);
            } else {
                doc.add_entity(entity);
            }
        }
        Ok(())
    }

    fn to_disk(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        patterns::write_jsonl(&dir.join(PATTERNS_FILE), &self.patterns)
    }
}
