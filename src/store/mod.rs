use crate::error::StoreError;
use crate::types::{IndexMetadata, Posting, PostingList, StoredDocument};
use std::collections::BTreeMap;
use std::path::PathBuf;

mod embedded;
mod memory;
mod relational;
mod remote;

pub use embedded::EmbeddedStore;
pub use memory::{MemoryStore, Snapshot, SNAPSHOT_FORMAT_VERSION};
pub use relational::RelationalStore;
pub use remote::RemoteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend selection plus the parameters that backend needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Posting tables in process memory; persisted only through whole-index
    /// snapshots.
    Memory,
    /// Embedded key-value store (sled) rooted at a directory.
    Embedded { path: PathBuf },
    /// Remote key-value server, e.g. `redis://127.0.0.1:6379/0`. All keys
    /// are prefixed by the index name.
    Remote { url: String },
    /// Relational table set in a SQLite database file.
    Relational { path: PathBuf },
}

/// Storage contract shared by every backend. The evaluator never branches on
/// the backend type; anything it needs must be expressible through these
/// operations. Implementations are safe for one writer with concurrent
/// readers; per-document writes are atomic from a reader's point of view.
pub trait PostingStore: Send + Sync {
    /// Write the document record, replacing an existing one with the same id.
    fn put_document(&self, doc_id: &str, document: &StoredDocument) -> StoreResult<()>;

    /// Append or replace this document's contribution to the inverted index.
    fn put_postings(&self, doc_id: &str, postings: &BTreeMap<String, Posting>) -> StoreResult<()>;

    /// Write the document record and its postings so that a concurrent
    /// reader observes either none or all of them. Backends override this
    /// with their native batching primitive.
    fn write_document(
        &self,
        doc_id: &str,
        document: &StoredDocument,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        self.put_document(doc_id, document)?;
        self.put_postings(doc_id, postings)
    }

    /// Remove this document's contribution from the given terms' posting
    /// lists, dropping any list that becomes empty.
    fn remove_postings(&self, doc_id: &str, terms: &[String]) -> StoreResult<()>;

    /// Replace an existing document: drop its old postings and write the new
    /// record and postings as one observable transition.
    fn replace_document(
        &self,
        doc_id: &str,
        old_terms: &[String],
        document: &StoredDocument,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        self.remove_postings(doc_id, old_terms)?;
        self.write_document(doc_id, document, postings)
    }

    fn get_document(&self, doc_id: &str) -> StoreResult<Option<StoredDocument>>;

    /// Posting list for `term`: every document currently containing it.
    /// Probing an unknown term yields an empty list and creates nothing.
    fn get_posting_list(&self, term: &str) -> StoreResult<PostingList>;

    /// Point lookup of one `(term, doc_id)` posting.
    fn get_tf_and_positions(&self, term: &str, doc_id: &str) -> StoreResult<Option<Posting>>;

    /// Number of documents containing `term`. May iterate the posting list
    /// when the backend cannot answer in O(1).
    fn document_frequency(&self, term: &str) -> StoreResult<usize> {
        Ok(self.get_posting_list(term)?.len())
    }

    fn get_metadata(&self) -> StoreResult<Option<IndexMetadata>>;
    fn put_metadata(&self, metadata: &IndexMetadata) -> StoreResult<()>;

    /// All document identifiers. Required for boolean `NOT`.
    fn document_ids(&self) -> StoreResult<Vec<String>>;

    /// Number of distinct terms with at least one posting.
    fn distinct_term_count(&self) -> StoreResult<usize>;
}

/// Project a posting list down to doc_id -> positions, the shape returned
/// by the public posting-list probe.
pub fn positions_by_document(list: &PostingList) -> BTreeMap<String, Vec<usize>> {
    list.iter()
        .map(|(doc_id, posting)| (doc_id.clone(), posting.positions.clone()))
        .collect()
}
