//! Processed documents: tokens plus the entity spans components attach to them.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A single token with byte offsets into the document text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// Token text as it appears in the document
    pub text: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Part-of-speech style tag, if a tagger ran
    pub tag: Option<String>,
    /// Whether this token opens a sentence
    pub is_sent_start: bool,
    /// Dense feature vector, if a vectorizer ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

impl Token {
    /// Create a token without annotations
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            tag: None,
            is_sent_start: false,
            vector: None,
        }
    }

    /// Lowercased form used for case-insensitive lookups
    pub fn lower(&self) -> String {
        self.text.to_lowercase()
    }
}

/// A labeled entity span over a contiguous token range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    /// Covered text
    pub text: String,
    /// Entity label (e.g. "PERSON", "ICD")
    pub label: String,
    /// Index of the first token
    pub start_token: usize,
    /// Index one past the last token
    pub end_token: usize,
    /// Byte offset of the first character
    pub start_char: usize,
    /// Byte offset one past the last character
    pub end_char: usize,
    /// Confidence reported by the producing component (1.0 for rules)
    pub confidence: f32,
    /// Name of the component that produced the span
    pub source: String,
    /// Optional pattern id for rule matches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
}

impl Entity {
    /// Token range covered by the entity
    pub fn token_range(&self) -> Range<usize> {
        self.start_token..self.end_token
    }

    /// Check whether two entities share at least one token
    pub fn overlaps(&self, other: &Entity) -> bool {
        self.start_token < other.end_token && other.start_token < self.end_token
    }

    /// Get a formatted string representation of the entity
    pub fn format(&self) -> String {
        format!(
            "{} [{}] ({}..{}, source: {})",
            self.text, self.label, self.start_char, self.end_char, self.source
        )
    }
}

/// A tokenized document flowing through a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doc {
    text: String,
    tokens: Vec<Token>,
    ents: Vec<Entity>,
}

impl Doc {
    /// Create a document from its text and tokens
    pub fn new(text: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            text: text.into(),
            tokens,
            ents: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut [Token] {
        &mut self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Entities sorted by start token
    pub fn ents(&self) -> &[Entity] {
        &self.ents
    }

    /// Text covered by a token range, or `None` if the range is out of bounds
    pub fn span_text(&self, start_token: usize, end_token: usize) -> Option<&str> {
        if start_token >= end_token || end_token > self.tokens.len() {
            return None;
        }
        let start = self.tokens[start_token].start;
        let end = self.tokens[end_token - 1].end;
        self.text.get(start..end)
    }

    /// Build an entity over a token range without attaching it
    pub fn make_entity(
        &self,
        start_token: usize,
        end_token: usize,
        label: impl Into<String>,
        source: impl Into<String>,
        confidence: f32,
    ) -> Option<Entity> {
        let text = self.span_text(start_token, end_token)?.to_string();
        Some(Entity {
            text,
            label: label.into(),
            start_token,
            end_token,
            start_char: self.tokens[start_token].start,
            end_char: self.tokens[end_token - 1].end,
            confidence,
            source: source.into(),
            pattern_id: None,
        })
    }

    /// Token range covering a byte range, expanded outwards to token boundaries
    pub fn char_span_to_tokens(&self, start_char: usize, end_char: usize) -> Option<Range<usize>> {
        let first = self.tokens.iter().position(|t| t.end > start_char)?;
        let last = self.tokens.iter().rposition(|t| t.start < end_char)?;
        if first > last {
            return None;
        }
        Some(first..last + 1)
    }

    /// Check whether a token range overlaps any attached entity
    pub fn overlaps_existing(&self, start_token: usize, end_token: usize) -> bool {
        self.ents
            .iter()
            .any(|e| start_token < e.end_token && e.start_token < end_token)
    }

    /// Attach an entity unless it overlaps an existing one.
    ///
    /// Returns `true` if the entity was attached.
    pub fn add_entity(&mut self, entity: Entity) -> bool {
        if self.overlaps_existing(entity.start_token, entity.end_token) {
            return false;
        }
        self.insert_sorted(entity);
        true
    }

    /// Attach an entity, dropping every existing entity it overlaps.
    ///
    /// Returns the removed entities.
    pub fn replace_overlapping(&mut self, entity: Entity) -> Vec<Entity> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.ents.drain(..).partition(|e| e.overlaps(&entity));
        self.ents = kept;
        self.insert_sorted(entity);
        removed
    }

    fn insert_sorted(&mut self, entity: Entity) {
        let idx = self
            .ents
            .partition_point(|e| e.start_token < entity.start_token);
        self.ents.insert(idx, entity);
    }

    /// Sentences as token ranges, based on `is_sent_start` flags.
    ///
    /// Without sentence boundaries the whole document is one sentence.
    pub fn sentences(&self) -> Vec<Range<usize>> {
        if self.tokens.is_empty() {
            return Vec::new();
        }
        let mut result = Vec::new();
        let mut start = 0;
        for (i, token) in self.tokens.iter().enumerate().skip(1) {
            if token.is_sent_start {
                result.push(start..i);
                start = i;
            }
        }
        result.push(start..self.tokens.len());
        result
    }
}
