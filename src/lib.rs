//! # Quarry
//!
//! Quarry is a positional inverted-index search engine. It ingests a stream
//! of text documents, maintains a term -> document mapping with
//! per-occurrence positions, and answers ranked (TF-IDF), boolean
//! (`AND`/`OR`/`NOT` with parentheses), and exact-phrase queries.
//!
//! The same logical index can live in process memory, in an embedded
//! key-value store, on a remote key-value server, or in a relational table
//! set; backends implement one storage trait and the query engine never
//! branches on which one is underneath.
//!
//! ## Examples
//!
//! ```no_run
//! use quarry::{IndexConfig, SearchIndex};
//!
//! let index = SearchIndex::open(IndexConfig::in_memory("articles")).unwrap();
//! index
//!     .add_document("doc1", "Machine learning is a subset of artificial intelligence", None)
//!     .unwrap();
//! index
//!     .add_document("doc2", "Deep learning is a subset of machine learning", None)
//!     .unwrap();
//!
//! for hit in index.search("machine learning", 10).unwrap() {
//!     println!("{} {:.4}", hit.doc_id, hit.score);
//! }
//!
//! let matches = index.boolean_search("\"machine\" AND NOT \"neural\"").unwrap();
//! println!("{} boolean matches", matches.len());
//! ```

pub mod analysis;
pub mod error;
pub mod index;
pub mod metrics;
pub mod query;
pub mod scoring;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use analysis::{Analyzer, AnalyzerOptions};
pub use error::{EngineError, StoreError};
pub use index::{IndexConfig, SearchIndex};
pub use metrics::MetricsReport;
pub use query::{parse_query, QueryNode};
pub use store::{BackendConfig, PostingStore};
pub use types::{CancelToken, Metadata, Posting, SearchHit, StoredDocument};

// Tests are defined in their respective modules with #[cfg(test)]
