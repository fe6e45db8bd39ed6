//! `sentencizer`: punctuation-based sentence boundaries.

use crate::pipeline::{Capability, Component, ComponentConfig, Doc, FactoryContext, Result};

/// Factory name
pub const SENTENCIZER: &str = "sentencizer";

const DEFAULT_PUNCT: &[&str] = &[".", "!", "?"];

/// Marks the token after each sentence-final punctuation as a sentence start
#[derive(Debug)]
pub struct Sentencizer {
    config: ComponentConfig,
}

impl Sentencizer {
    pub fn new(config: ComponentConfig) -> Self {
        Self { config }
    }

    pub fn from_context(ctx: FactoryContext<'_>) -> Result<Self> {
        Ok(Self::new(ctx.config))
    }

    fn punct_chars(&self) -> Vec<String> {
        self.config
            .get("punct_chars")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_PUNCT.iter().map(|p| p.to_string()).collect())
    }
}

impl Component for Sentencizer {
    fn factory(&self) -> &str {
        SENTENCIZER
    }

    fn capability(&self) -> Capability {
        Capability::SentenceBoundary
    }

    fn config(&self) -> &ComponentConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ComponentConfig {
        &mut self.config
    }

    fn process(&self, doc: &mut Doc) -> Result<()> {
        let punct = self.punct_chars();
        let mut next_starts = true;
        for token in doc.tokens_mut() {
            let is_punct = punct.iter().any(|p| *p == token.text);
            // Runs of punctuation ("?!") stay with the sentence they close
            token.is_sent_start = next_starts && !is_punct;
            if token.is_sent_start {
                next_starts = false;
            }
            if is_punct {
                next_starts = true;
            }
        }
        Ok(())
    }
}
