//! `ner`: the builtin entity recognizer.
//!
//! Pretrained statistical models are external; a package that ships one
//! registers its own `ner` factory. The builtin recognizer is driven by
//! labeled regular expressions from its config, so packages without a model
//! still produce entities:
//!
//! ```json
//! {"patterns": [{"label": "PERSON", "regex": "\\b[A-Z][a-z]+\\b", "confidence": 0.6}],
//!  "confidence_threshold": 0.5}
//! ```

use regex::Regex;
use serde::Deserialize;
use tracing::trace;

use crate::pipeline::{
    Capability, Component, ComponentConfig, Doc, Entity, FactoryContext, PipelineError, Result,
};

/// Factory name
pub const NER: &str = "ner";

const DEFAULT_CONFIDENCE: f32 = 0.8;

#[derive(Debug, Deserialize)]
struct LabelPatternConfig {
    label: String,
    regex: String,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug)]
struct LabelPattern {
    label: String,
    regex: Regex,
    confidence: f32,
    /// Lower index wins overlaps
    priority: usize,
}

/// Regex-backed entity recognizer
#[derive(Debug)]
pub struct PatternRecognizer {
    config: ComponentConfig,
    patterns: Vec<LabelPattern>,
}

impl PatternRecognizer {
    pub fn new(config: ComponentConfig) -> Result<Self> {
        let specs: Vec<LabelPatternConfig> = match config.get("patterns") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| PipelineError::invalid_config(NER, e))?,
            None => Vec::new(),
        };

        let patterns = specs
            .into_iter()
            .enumerate()
            .map(|(priority, spec)| {
                let regex = Regex::new(&spec.regex).map_err(|e| {
                    PipelineError::invalid_config(NER, format!("label {}: {}", spec.label, e))
                })?;
                Ok(LabelPattern {
                    label: spec.label,
                    regex,
                    confidence: spec.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
                    priority,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { config, patterns })
    }

    pub fn from_context(ctx: FactoryContext<'_>) -> Result<Self> {
        Self::new(ctx.config)
    }

    /// Labels this recognizer can emit
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.patterns.iter().map(|p| p.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    fn confidence_threshold(&self) -> f32 {
        self.config
            .get_f64("confidence_threshold")
            .map(|t| t as f32)
            .unwrap_or(0.0)
    }

    /// Candidate entities with their pattern priority
    fn candidates(&self, doc: &Doc) -> Vec<(usize, Entity)> {
        let threshold = self.confidence_threshold();
        let mut found = Vec::new();
        for pattern in self.patterns.iter().filter(|p| p.confidence >= threshold) {
            for m in pattern.regex.find_iter(doc.text()) {
                let Some(range) = doc.char_span_to_tokens(m.start(), m.end()) else {
                    continue;
                };
                if let Some(entity) =
                    doc.make_entity(range.start, range.end, &pattern.label, NER, pattern.confidence)
                {
                    found.push((pattern.priority, entity));
                }
            }
        }
        found
    }

    /// Drop overlapping candidates, keeping the higher priority, then the
    /// higher confidence, then the longer span.
    fn remove_overlaps(mut candidates: Vec<(usize, Entity)>) -> Vec<Entity> {
        candidates.sort_by(|(pa, a), (pb, b)| {
            pa.cmp(pb)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| (b.end_token - b.start_token).cmp(&(a.end_token - a.start_token)))
                .then_with(|| a.start_token.cmp(&b.start_token))
        });

        let mut kept: Vec<Entity> = Vec::new();
        for (_, entity) in candidates {
            if kept.iter().all(|k| !k.overlaps(&entity)) {
                kept.push(entity);
            }
        }
        kept.sort_by_key(|e| e.start_token);
        kept
    }
}

impl Component for PatternRecognizer {
    fn factory(&self) -> &str {
        NER
    }

    fn capability(&self) -> Capability {
        Capability::EntityRecognizer
    }

    fn config(&self) -> &ComponentConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ComponentConfig {
        &mut self.config
    }

    fn process(&self, doc: &mut Doc) -> Result<()> {
        let entities = Self::remove_overlaps(self.candidates(doc));
        // Entities set by earlier components (rulers) constrain the recognizer
        for entity in entities {
            let text = entity.text.clone();
            if !doc.add_entity(entity) {
                trace!(text = %text, "Recognizer span overlaps an existing entity");
            }
        }
        Ok(())
    }
}
