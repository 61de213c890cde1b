use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Opaque per-document attribute map. Values are not interpreted by the
/// engine; they round-trip through storage unchanged.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One term's occurrences in one document: the term frequency and the
/// zero-based token positions, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub tf: usize,
    pub positions: Vec<usize>,
}

impl Posting {
    pub fn from_positions(positions: Vec<usize>) -> Self {
        Posting {
            tf: positions.len(),
            positions,
        }
    }

    /// Check the posting invariants: `tf` equals the position count and
    /// positions are strictly ascending within `[0, doc_length)`.
    pub fn validate(&self, doc_length: usize) -> Result<(), String> {
        if self.tf != self.positions.len() {
            return Err(format!(
                "tf {} does not match position count {}",
                self.tf,
                self.positions.len()
            ));
        }
        if self.tf == 0 {
            return Err("posting with no positions".to_string());
        }
        let mut prev: Option<usize> = None;
        for &pos in &self.positions {
            if pos >= doc_length {
                return Err(format!(
                    "position {pos} outside document of length {doc_length}"
                ));
            }
            if let Some(p) = prev {
                if pos <= p {
                    return Err(format!("positions not strictly ascending at {pos}"));
                }
            }
            prev = Some(pos);
        }
        Ok(())
    }
}

/// A stored document record: raw body, opaque metadata, and the analyzed
/// token length used for score normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub body: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub length: usize,
}

/// The persisted counter record. Carries the analyzer toggles alongside the
/// counters so that a reader opening an existing index with different
/// toggles is rejected at open time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub doc_count: usize,
    pub term_count: usize,
    pub version: String,
    pub use_stopwords: bool,
    pub use_stemming: bool,
}

/// A single query result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub body: String,
    pub metadata: Metadata,
    pub score: f64,
}

/// Posting list for a single term: doc_id -> posting. `BTreeMap` keeps
/// iteration order deterministic across backends.
pub type PostingList = BTreeMap<String, Posting>;

/// Shared cancellation flag. Queries observe it between posting fetches;
/// writes do not.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
