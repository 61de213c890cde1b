use crate::error::StoreError;
use crate::store::{PostingStore, StoreResult};
use crate::types::{IndexMetadata, Posting, PostingList, StoredDocument};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Self-describing serialized image of an in-memory index. Restoring a
/// snapshot reproduces every observable query result exactly.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub metadata: IndexMetadata,
    pub documents: BTreeMap<String, StoredDocument>,
    pub postings: BTreeMap<String, PostingList>,
    pub indexing_time_secs: f64,
    pub query_time_secs: Vec<f64>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    /// term -> (doc_id -> posting). Lookups never create entries.
    postings: BTreeMap<String, PostingList>,
    documents: BTreeMap<String, StoredDocument>,
    metadata: Option<IndexMetadata>,
}

/// Reference backend: posting lists and documents in process memory behind a
/// single reader-writer lock, so every write is atomic to readers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy out the document and posting tables for snapshotting.
    pub fn dump_tables(
        &self,
    ) -> (
        BTreeMap<String, StoredDocument>,
        BTreeMap<String, PostingList>,
    ) {
        let inner = self.read();
        (inner.documents.clone(), inner.postings.clone())
    }

    /// Replace the store contents from a snapshot's tables.
    pub fn load_tables(
        &self,
        documents: BTreeMap<String, StoredDocument>,
        postings: BTreeMap<String, PostingList>,
        metadata: IndexMetadata,
    ) {
        let mut inner = self.write();
        inner.documents = documents;
        inner.postings = postings;
        inner.metadata = Some(metadata);
    }

    fn remove_doc_from_terms(inner: &mut MemoryInner, doc_id: &str, terms: &[String]) {
        for term in terms {
            if let Some(list) = inner.postings.get_mut(term) {
                list.remove(doc_id);
                if list.is_empty() {
                    inner.postings.remove(term);
                }
            }
        }
    }
}

impl PostingStore for MemoryStore {
    fn put_document(&self, doc_id: &str, document: &StoredDocument) -> StoreResult<()> {
        self.write()
            .documents
            .insert(doc_id.to_string(), document.clone());
        Ok(())
    }

    fn put_postings(&self, doc_id: &str, postings: &BTreeMap<String, Posting>) -> StoreResult<()> {
        let mut inner = self.write();
        for (term, posting) in postings {
            inner
                .postings
                .entry(term.clone())
                .or_default()
                .insert(doc_id.to_string(), posting.clone());
        }
        Ok(())
    }

    fn write_document(
        &self,
        doc_id: &str,
        document: &StoredDocument,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        let mut inner = self.write();
        inner.documents.insert(doc_id.to_string(), document.clone());
        for (term, posting) in postings {
            inner
                .postings
                .entry(term.clone())
                .or_default()
                .insert(doc_id.to_string(), posting.clone());
        }
        Ok(())
    }

    fn remove_postings(&self, doc_id: &str, terms: &[String]) -> StoreResult<()> {
        let mut inner = self.write();
        MemoryStore::remove_doc_from_terms(&mut inner, doc_id, terms);
        Ok(())
    }

    fn replace_document(
        &self,
        doc_id: &str,
        old_terms: &[String],
        document: &StoredDocument,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        let mut inner = self.write();
        MemoryStore::remove_doc_from_terms(&mut inner, doc_id, old_terms);
        inner.documents.insert(doc_id.to_string(), document.clone());
        for (term, posting) in postings {
            inner
                .postings
                .entry(term.clone())
                .or_default()
                .insert(doc_id.to_string(), posting.clone());
        }
        Ok(())
    }

    fn get_document(&self, doc_id: &str) -> StoreResult<Option<StoredDocument>> {
        Ok(self.read().documents.get(doc_id).cloned())
    }

    fn get_posting_list(&self, term: &str) -> StoreResult<PostingList> {
        Ok(self.read().postings.get(term).cloned().unwrap_or_default())
    }

    fn get_tf_and_positions(&self, term: &str, doc_id: &str) -> StoreResult<Option<Posting>> {
        Ok(self
            .read()
            .postings
            .get(term)
            .and_then(|list| list.get(doc_id))
            .cloned())
    }

    fn document_frequency(&self, term: &str) -> StoreResult<usize> {
        Ok(self.read().postings.get(term).map_or(0, PostingList::len))
    }

    fn get_metadata(&self) -> StoreResult<Option<IndexMetadata>> {
        Ok(self.read().metadata.clone())
    }

    fn put_metadata(&self, metadata: &IndexMetadata) -> StoreResult<()> {
        self.write().metadata = Some(metadata.clone());
        Ok(())
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.read().documents.keys().cloned().collect())
    }

    fn distinct_term_count(&self) -> StoreResult<usize> {
        Ok(self.read().postings.len())
    }
}

impl Snapshot {
    pub fn write_to(&self, path: &std::path::Path) -> Result<(), StoreError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn read_from(path: &std::path::Path) -> Result<Snapshot, StoreError> {
        let file = std::fs::File::open(path)?;
        let snapshot: Snapshot = serde_json::from_reader(std::io::BufReader::new(file))?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::Other(format!(
                "unsupported snapshot format version {}",
                snapshot.format_version
            )));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str, length: usize) -> StoredDocument {
        StoredDocument {
            body: body.to_string(),
            metadata: Default::default(),
            length,
        }
    }

    #[test]
    fn probing_unknown_terms_creates_nothing() {
        let store = MemoryStore::new();
        assert!(store.get_posting_list("ghost").unwrap().is_empty());
        assert_eq!(store.document_frequency("ghost").unwrap(), 0);
        assert_eq!(store.distinct_term_count().unwrap(), 0);
    }

    #[test]
    fn write_and_point_lookup() {
        let store = MemoryStore::new();
        let mut postings = BTreeMap::new();
        postings.insert("rust".to_string(), Posting::from_positions(vec![0, 3]));
        store
            .write_document("d1", &doc("rust loves rust", 3), &postings)
            .unwrap();

        let posting = store.get_tf_and_positions("rust", "d1").unwrap().unwrap();
        assert_eq!(posting.tf, 2);
        assert_eq!(store.document_frequency("rust").unwrap(), 1);
        assert_eq!(store.document_ids().unwrap(), vec!["d1".to_string()]);
    }

    #[test]
    fn replace_drops_stale_terms() {
        let store = MemoryStore::new();
        let mut old = BTreeMap::new();
        old.insert("alpha".to_string(), Posting::from_positions(vec![0]));
        store.write_document("d1", &doc("alpha", 1), &old).unwrap();

        let mut new = BTreeMap::new();
        new.insert("beta".to_string(), Posting::from_positions(vec![0]));
        store
            .replace_document("d1", &["alpha".to_string()], &doc("beta", 1), &new)
            .unwrap();

        assert!(store.get_posting_list("alpha").unwrap().is_empty());
        assert_eq!(store.document_frequency("beta").unwrap(), 1);
        // The emptied term must not linger in the term table.
        assert_eq!(store.distinct_term_count().unwrap(), 1);
    }
}
