//! `tagger`: lexicon-driven token tags.

use std::collections::HashMap;

use crate::pipeline::{
    Capability, Component, ComponentConfig, Doc, FactoryContext, PipelineError, Result,
};

/// Factory name
pub const TAGGER: &str = "tagger";

/// Assigns tags from a lowercase lexicon, falling back to `default_tag`
#[derive(Debug)]
pub struct LexiconTagger {
    config: ComponentConfig,
    lexicon: HashMap<String, String>,
}

impl LexiconTagger {
    pub fn new(config: ComponentConfig) -> Result<Self> {
        let lexicon = match config.get("lexicon") {
            Some(value) => serde_json::from_value::<HashMap<String, String>>(value.clone())
                .map_err(|e| PipelineError::invalid_config(TAGGER, e))?
                .into_iter()
                .map(|(word, tag)| (word.to_lowercase(), tag))
                .collect(),
            None => HashMap::new(),
        };
        Ok(Self { config, lexicon })
    }

    pub fn from_context(ctx: FactoryContext<'_>) -> Result<Self> {
        Self::new(ctx.config)
    }
}

impl Component for LexiconTagger {
    fn factory(&self) -> &str {
        TAGGER
    }

    fn capability(&self) -> Capability {
        Capability::Tagger
    }

    fn config(&self) -> &ComponentConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut ComponentConfig {
        &mut self.config
    }

    fn process(&self, doc: &mut Doc) -> Result<()> {
        let default_tag = self.config.get_str("default_tag");
        for token in doc.tokens_mut() {
            token.tag = self
                .lexicon
                .get(&token.lower())
                .map(String::as_str)
                .or(default_tag)
                .map(String::from);
        }
        Ok(())
    }
}
