//! Tokenize + stem pipeline producing term-frequency maps
//!
//! Sits between the tokenizer and the index store: every surface token is
//! reduced to its Porter2 (English Snowball) stem before counting, so
//! "running", "runs", and "runner" collapse toward one term.

use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;

use crate::tokenizer::Tokenizer;

/// Term statistics for one document.
#[derive(Debug, Clone, Default)]
pub struct ProcessedDocument {
    /// Stemmed term → frequency.
    pub term_frequencies: HashMap<String, u32>,
    /// Sum of all frequencies (the document length for TF normalization).
    pub total_terms: u32,
    /// Number of distinct terms.
    pub unique_terms: u32,
}

impl ProcessedDocument {
    fn from_frequencies(term_frequencies: HashMap<String, u32>) -> Self {
        let total_terms = term_frequencies.values().sum();
        let unique_terms = term_frequencies.len() as u32;
        Self {
            term_frequencies,
            total_terms,
            unique_terms,
        }
    }
}

/// Tokenizer + stemmer front end of the indexer.
pub struct TextProcessor {
    tokenizer: Tokenizer,
    stemmer: Stemmer,
}

impl TextProcessor {
    pub fn new() -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Tokenize and stem, preserving order and duplicates.
    pub fn process(&self, text: &str) -> Vec<String> {
        self.tokenizer
            .tokenize(text)
            .iter()
            .map(|token| self.stemmer.stem(token).into_owned())
            .collect()
    }

    /// Stemmed term → frequency for a single block of text.
    pub fn process_to_frequency(&self, text: &str) -> HashMap<String, u32> {
        let mut freq = HashMap::new();
        for term in self.process(text) {
            *freq.entry(term).or_insert(0) += 1;
        }
        freq
    }

    /// Process a page's fields as one flat text blob.
    pub fn process_document(&self, title: &str, description: &str, content: &str) -> ProcessedDocument {
        let all_text = format!("{} {} {}", title, description, content);
        ProcessedDocument::from_frequencies(self.process_to_frequency(&all_text))
    }

    /// Process each field independently and weight its frequencies before
    /// merging. Empty fields and zero weights contribute nothing.
    pub fn process_document_with_weights(
        &self,
        title: &str,
        description: &str,
        content: &str,
        title_weight: u32,
        description_weight: u32,
        content_weight: u32,
    ) -> ProcessedDocument {
        let mut merged: HashMap<String, u32> = HashMap::new();

        for (field, weight) in [
            (title, title_weight),
            (description, description_weight),
            (content, content_weight),
        ] {
            if field.is_empty() || weight == 0 {
                continue;
            }
            for (term, freq) in self.process_to_frequency(field) {
                *merged.entry(term).or_insert(0) += freq * weight;
            }
        }

        ProcessedDocument::from_frequencies(merged)
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}
