use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

/// URL-like substrings are removed before tokenization, not kept.
static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("valid URL pattern"));

/// Email-like substrings (whitespace-delimited tokens containing `@`).
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+@\S+").expect("valid email pattern"));

/// Static set of common English stop words
static ENGLISH_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a",
        "about",
        "above",
        "after",
        "again",
        "against",
        "all",
        "am",
        "an",
        "and",
        "any",
        "are",
        "aren't",
        "as",
        "at",
        "be",
        "because",
        "been",
        "before",
        "being",
        "below",
        "between",
        "both",
        "but",
        "by",
        "can't",
        "cannot",
        "could",
        "couldn't",
        "did",
        "didn't",
        "do",
        "does",
        "doesn't",
        "doing",
        "don't",
        "down",
        "during",
        "each",
        "few",
        "for",
        "from",
        "further",
        "had",
        "hadn't",
        "has",
        "hasn't",
        "have",
        "haven't",
        "having",
        "he",
        "he'd",
        "he'll",
        "he's",
        "her",
        "here",
        "here's",
        "hers",
        "herself",
        "him",
        "himself",
        "his",
        "how",
        "how's",
        "i",
        "i'd",
        "i'll",
        "i'm",
        "i've",
        "if",
        "in",
        "into",
        "is",
        "isn't",
        "it",
        "it's",
        "its",
        "itself",
        "let's",
        "me",
        "more",
        "most",
        "mustn't",
        "my",
        "myself",
        "no",
        "nor",
        "not",
        "of",
        "off",
        "on",
        "once",
        "only",
        "or",
        "other",
        "ought",
        "our",
        "ours",
        "ourselves",
        "out",
        "over",
        "own",
        "same",
        "shan't",
        "she",
        "she'd",
        "she'll",
        "she's",
        "should",
        "shouldn't",
        "so",
        "some",
        "such",
        "than",
        "that",
        "that's",
        "the",
        "their",
        "theirs",
        "them",
        "themselves",
        "then",
        "there",
        "there's",
        "these",
        "they",
        "they'd",
        "they'll",
        "they're",
        "they've",
        "this",
        "those",
        "through",
        "to",
        "too",
        "under",
        "until",
        "up",
        "very",
        "was",
        "wasn't",
        "we",
        "we'd",
        "we'll",
        "we're",
        "we've",
        "were",
        "weren't",
        "what",
        "what's",
        "when",
        "when's",
        "where",
        "where's",
        "which",
        "while",
        "who",
        "who's",
        "whom",
        "why",
        "why's",
        "with",
        "won't",
        "would",
        "wouldn't",
        "you",
        "you'd",
        "you'll",
        "you're",
        "you've",
        "your",
        "yours",
        "yourself",
        "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Returns a reference to the global stemmer instance
pub fn get_stemmer() -> &'static Stemmer {
    static STEMMER: OnceLock<Stemmer> = OnceLock::new();
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::English))
}

/// Analyzer configuration, fixed at index creation. The writer path and any
/// later query analyzer for the same index must agree on both toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerOptions {
    pub use_stopwords: bool,
    pub use_stemming: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            use_stopwords: true,
            use_stemming: true,
        }
    }
}

/// Deterministic text analysis pipeline: lowercase, strip URLs and emails,
/// sweep punctuation, split on whitespace, trim edge punctuation, then
/// optionally drop stop words and apply Porter stemming.
///
/// Token positions are assigned in the order tokens emerge from the full
/// pipeline, so stopword removal shifts subsequent positions downward.
#[derive(Debug, Clone)]
pub struct Analyzer {
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Analyzer { options }
    }

    pub fn options(&self) -> AnalyzerOptions {
        self.options
    }

    /// Analyze raw text into an ordered token sequence.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let stripped = URL_PATTERN.replace_all(&lowered, "");
        let stripped = EMAIL_PATTERN.replace_all(&stripped, "");

        // Keep alphanumerics, whitespace, apostrophes, and internal hyphens;
        // everything else becomes a token boundary.
        let swept: String = stripped
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() || c == '\'' || c == '-' {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        let mut tokens = Vec::new();
        for raw in swept.split_whitespace() {
            let token = raw.trim_matches(|c: char| c.is_ascii_punctuation());
            if token.is_empty() {
                continue;
            }
            if self.options.use_stopwords && ENGLISH_STOP_WORDS.contains(token) {
                continue;
            }
            if self.options.use_stemming {
                tokens.push(get_stemmer().stem(token).into_owned());
            } else {
                tokens.push(token.to_string());
            }
        }
        tokens
    }

    /// Token counts for one document, keyed by analyzed term.
    pub fn term_frequencies(&self, text: &str) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for term in self.analyze(text) {
            *counts.entry(term).or_insert(0) += 1;
        }
        counts
    }

    /// Positions of each analyzed term, grouped by term. Positions index the
    /// analyzed token stream and are ascending within each term.
    pub fn term_positions(&self, text: &str) -> BTreeMap<String, Vec<usize>> {
        let mut positions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (position, term) in self.analyze(text).into_iter().enumerate() {
            positions.entry(term).or_default().push(position);
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    include!("analysis_tests.rs");
}
