//! Rule-based tokenizer shared by every pipeline.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::doc::{Doc, Token};

lazy_static! {
    // Words keep inner hyphens and apostrophes ("anti-inflammatory", "don't");
    // numbers keep decimal points; every other non-space character stands alone.
    static ref TOKEN_REGEX: Regex =
        Regex::new(r"\d+(?:[.,]\d+)*|\w+(?:[-'’]\w+)*|[^\w\s]").expect("token regex is valid");
}

/// Splits text into word and punctuation tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tokenizer {
    lang: String,
}

impl Tokenizer {
    /// Create a tokenizer for the given language code
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into() }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Tokenize text into an unannotated document
    pub fn tokenize(&self, text: &str) -> Doc {
        let tokens = TOKEN_REGEX
            .find_iter(text)
            .map(|m| Token::new(m.as_str(), m.start(), m.end()))
            .collect();
        Doc::new(text, tokens)
    }

    /// Token texts only, used to compile phrase patterns
    pub fn words(&self, text: &str) -> Vec<String> {
        TOKEN_REGEX
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new("en")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_words_and_punctuation() {
        let tokenizer = Tokenizer::default();
        let doc = tokenizer.tokenize("Alex and Ritesh play cricket.");
        let texts: Vec<&str> = doc.tokens().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Alex", "and", "Ritesh", "play", "cricket", "."]);
        assert_eq!(doc.tokens()[5].start, 28);
    }

    #[test]
    fn test_tokenize_keeps_hyphenated_words() {
        let tokenizer = Tokenizer::default();
        let words = tokenizer.words("type-2 diabetes, 0.5 mg");
        assert_eq!(words, vec!["type-2", "diabetes", ",", "0.5", "mg"]);
    }

    #[test]
    fn test_offsets_slice_original_text() {
        let tokenizer = Tokenizer::default();
        let text = "lidocaine (from protein binding)";
        let doc = tokenizer.tokenize(text);
        for token in doc.tokens() {
            assert_eq!(&text[token.start..token.end], token.text);
        }
    }
}
