//! Builtin pipeline components and their factories.

pub mod recognizer;
pub mod ruler;
pub mod sentencizer;
pub mod tagger;
pub mod vectorizer;

pub use recognizer::{NER, PatternRecognizer};
pub use ruler::{ENTITY_RULER, EntityPattern, EntityRuler, MatchAttr, RulerOptions};
pub use sentencizer::{SENTENCIZER, Sentencizer};
pub use tagger::{LexiconTagger, TAGGER};
pub use vectorizer::{INCLUDE_STATIC_VECTORS, TOK2VEC, Tok2Vec};

use crate::pipeline::FactoryRegistry;

/// Register the builtin factories on `registry`
pub fn register_builtins(registry: &mut FactoryRegistry) {
    registry
        .register(TOK2VEC, |ctx| Ok(Box::new(Tok2Vec::from_context(ctx)?)))
        .register(TAGGER, |ctx| Ok(Box::new(LexiconTagger::from_context(ctx)?)))
        .register(SENTENCIZER, |ctx| {
            Ok(Box::new(Sentencizer::from_context(ctx)?))
        })
        .register(NER, |ctx| {
            Ok(Box::new(PatternRecognizer::from_context(ctx)?))
        })
        .register(ENTITY_RULER, |ctx| {
            Ok(Box::new(EntityRuler::from_context(ctx)?))
        });
}
