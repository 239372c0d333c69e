//! Unicode text to index-ready tokens
//!
//! The pipeline is deliberately lossy: lowercase, decode the handful of
//! HTML entities that survive content extraction, break hyphenated
//! compounds apart, then keep only runs of `[a-z0-9]` that pass the
//! stop-word, length, and letter/digit filters. Token order (and therefore
//! duplicate tokens) is preserved for the frequency pass downstream.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("valid token regex"));

/// Grammatical function words carrying no retrieval signal.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Articles
        "a", "an", "the",
        // Pronouns
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
        "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
        "it", "its", "itself", "they", "them", "their", "theirs", "themselves",
        // Prepositions
        "of", "at", "by", "for", "with", "about", "against", "between", "into", "through",
        "during", "before", "after", "above", "below", "to", "from", "up", "down", "in", "out",
        "on", "off", "over", "under",
        // Conjunctions
        "and", "or", "but", "if", "while", "because", "as", "until", "than", "so", "nor", "yet",
        // Auxiliaries and common verbs
        "is", "am", "are", "was", "were", "be", "been", "being", "have", "has", "had", "having",
        "do", "does", "did", "doing", "will", "would", "should", "could", "can", "may", "might",
        "must",
        // Determiners and other function words
        "this", "that", "these", "those", "what", "which", "who", "whom", "whose", "when",
        "where", "why", "how", "all", "each", "every", "both", "few", "more", "most", "other",
        "some", "such", "no", "not", "only", "own", "same", "then", "there", "too", "very",
    ]
    .into_iter()
    .collect()
});

/// Splits text into filtered lowercase tokens.
pub struct Tokenizer {
    min_length: usize,
    max_length: usize,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            min_length: 2,
            max_length: 50,
        }
    }

    /// Tokenize into an ordered sequence; duplicates are preserved.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = Self::normalize(text);

        TOKEN_RE
            .find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|word| {
                !STOP_WORDS.contains(word)
                    && word.len() >= self.min_length
                    && word.len() <= self.max_length
                    && Self::is_valid_token(word)
            })
            .map(str::to_string)
            .collect()
    }

    /// Convenience sibling of [`tokenize`](Self::tokenize): token → count.
    pub fn token_counts(&self, text: &str) -> HashMap<String, u32> {
        let mut counts = HashMap::new();
        for token in self.tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }
        counts
    }

    fn normalize(text: &str) -> String {
        text.to_lowercase()
            .replace("&nbsp;", " ")
            .replace("&amp;", "and")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace(['-', '_'], " ")
    }

    /// A token must contain at least one letter and no more digits than
    /// letters; this drops ids, hashes, and timestamps masquerading as
    /// words.
    fn is_valid_token(word: &str) -> bool {
        let letters = word.chars().filter(|c| c.is_ascii_alphabetic()).count();
        let digits = word.chars().filter(|c| c.is_ascii_digit()).count();
        letters > 0 && digits <= letters
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_sentence() {
        let t = Tokenizer::new();
        assert_eq!(
            t.tokenize("The quick brown fox jumps over the lazy dog"),
            vec!["quick", "brown", "fox", "jumps", "lazy", "dog"]
        );
    }

    #[test]
    fn test_hyphens_split_compounds() {
        let t = Tokenizer::new();
        assert_eq!(
            t.tokenize("machine-learning and deep-learning are cool"),
            vec!["machine", "learning", "deep", "learning", "cool"]
        );
    }

    #[test]
    fn test_html_entities() {
        let t = Tokenizer::new();
        assert_eq!(
            t.tokenize("This&nbsp;is&amp;test&lt;html&gt;"),
            vec!["isandtest", "html"]
        );
    }

    #[test]
    fn test_empty_and_stop_word_only_text() {
        let t = Tokenizer::new();
        assert!(t.tokenize("").is_empty());
        assert!(t.tokenize("the of and or but").is_empty());
    }

    #[test]
    fn test_length_bounds() {
        let t = Tokenizer::new();
        assert!(t.tokenize("x").is_empty());
        let long = "a".repeat(51);
        assert!(t.tokenize(&long).is_empty());
        let max = "a".repeat(50);
        assert_eq!(t.tokenize(&max), vec![max.clone()]);
    }

    #[test]
    fn test_digit_heavy_tokens_dropped() {
        let t = Tokenizer::new();
        // Only digits
        assert!(t.tokenize("12345").is_empty());
        // More digits than letters
        assert!(t.tokenize("ab12345").is_empty());
        // Balanced is fine
        assert_eq!(t.tokenize("abc123"), vec!["abc123"]);
    }

    #[test]
    fn test_token_counts() {
        let t = Tokenizer::new();
        let counts = t.token_counts("rust loves rust");
        assert_eq!(counts.get("rust"), Some(&2));
        assert_eq!(counts.get("loves"), Some(&1));
    }
}
