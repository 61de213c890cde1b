use crate::error::StoreError;
use crate::store::{PostingStore, StoreResult};
use crate::types::{IndexMetadata, Posting, PostingList, StoredDocument};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const METADATA_KEY: &str = "__metadata__";
const DOC_PREFIX: &str = "doc:";
const DOCLEN_PREFIX: &str = "doclen:";
const TERM_PREFIX: &str = "term:";

/// Embedded key-value backend on sled. Postings are serialized per term
/// under `term:<t>`, document records under `doc:<id>`, lengths under
/// `doclen:<id>`, counters under a reserved `__metadata__` key. All writes
/// for one document go through a single atomic batch.
pub struct EmbeddedStore {
    db: sled::Db,
}

impl EmbeddedStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        debug!(path = %path.display(), "opening embedded store");
        let db = sled::open(path)?;
        Ok(EmbeddedStore { db })
    }

    fn doc_key(doc_id: &str) -> String {
        format!("{DOC_PREFIX}{doc_id}")
    }

    fn len_key(doc_id: &str) -> String {
        format!("{DOCLEN_PREFIX}{doc_id}")
    }

    fn term_key(term: &str) -> String {
        format!("{TERM_PREFIX}{term}")
    }

    fn read_posting_list(&self, term: &str) -> StoreResult<PostingList> {
        match self.db.get(EmbeddedStore::term_key(term))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(PostingList::new()),
        }
    }

    /// Load the term maps a write touches, apply removals then additions,
    /// and stage the results into `batch`. Lists that end up empty are
    /// deleted rather than written back.
    fn stage_term_updates(
        &self,
        batch: &mut sled::Batch,
        doc_id: &str,
        removed_terms: &[String],
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        let mut touched: BTreeMap<String, PostingList> = BTreeMap::new();
        for term in removed_terms {
            if !touched.contains_key(term) {
                touched.insert(term.clone(), self.read_posting_list(term)?);
            }
        }
        for term in postings.keys() {
            if !touched.contains_key(term) {
                touched.insert(term.clone(), self.read_posting_list(term)?);
            }
        }

        for term in removed_terms {
            if let Some(list) = touched.get_mut(term) {
                list.remove(doc_id);
            }
        }
        for (term, posting) in postings {
            if let Some(list) = touched.get_mut(term) {
                list.insert(doc_id.to_string(), posting.clone());
            }
        }

        for (term, list) in touched {
            let key = EmbeddedStore::term_key(&term);
            if list.is_empty() {
                batch.remove(key.as_bytes());
            } else {
                batch.insert(key.as_bytes(), serde_json::to_vec(&list)?);
            }
        }
        Ok(())
    }
}

impl PostingStore for EmbeddedStore {
    fn put_document(&self, doc_id: &str, document: &StoredDocument) -> StoreResult<()> {
        let mut batch = sled::Batch::default();
        batch.insert(
            EmbeddedStore::doc_key(doc_id).as_bytes(),
            serde_json::to_vec(document)?,
        );
        batch.insert(
            EmbeddedStore::len_key(doc_id).as_bytes(),
            document.length.to_string().as_bytes(),
        );
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn put_postings(&self, doc_id: &str, postings: &BTreeMap<String, Posting>) -> StoreResult<()> {
        let mut batch = sled::Batch::default();
        self.stage_term_updates(&mut batch, doc_id, &[], postings)?;
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn write_document(
        &self,
        doc_id: &str,
        document: &StoredDocument,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        let mut batch = sled::Batch::default();
        batch.insert(
            EmbeddedStore::doc_key(doc_id).as_bytes(),
            serde_json::to_vec(document)?,
        );
        batch.insert(
            EmbeddedStore::len_key(doc_id).as_bytes(),
            document.length.to_string().as_bytes(),
        );
        self.stage_term_updates(&mut batch, doc_id, &[], postings)?;
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn remove_postings(&self, doc_id: &str, terms: &[String]) -> StoreResult<()> {
        let mut batch = sled::Batch::default();
        self.stage_term_updates(&mut batch, doc_id, terms, &BTreeMap::new())?;
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn replace_document(
        &self,
        doc_id: &str,
        old_terms: &[String],
        document: &StoredDocument,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        let mut batch = sled::Batch::default();
        batch.insert(
            EmbeddedStore::doc_key(doc_id).as_bytes(),
            serde_json::to_vec(document)?,
        );
        batch.insert(
            EmbeddedStore::len_key(doc_id).as_bytes(),
            document.length.to_string().as_bytes(),
        );
        self.stage_term_updates(&mut batch, doc_id, old_terms, postings)?;
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn get_document(&self, doc_id: &str) -> StoreResult<Option<StoredDocument>> {
        match self.db.get(EmbeddedStore::doc_key(doc_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_posting_list(&self, term: &str) -> StoreResult<PostingList> {
        self.read_posting_list(term)
    }

    fn get_tf_and_positions(&self, term: &str, doc_id: &str) -> StoreResult<Option<Posting>> {
        let mut list = self.read_posting_list(term)?;
        Ok(list.remove(doc_id))
    }

    fn get_metadata(&self) -> StoreResult<Option<IndexMetadata>> {
        match self.db.get(METADATA_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_metadata(&self, metadata: &IndexMetadata) -> StoreResult<()> {
        self.db.insert(METADATA_KEY, serde_json::to_vec(metadata)?)?;
        self.db.flush()?;
        Ok(())
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in self.db.scan_prefix(DOC_PREFIX) {
            let (key, _) = entry?;
            let key = String::from_utf8_lossy(&key);
            if let Some(id) = key.strip_prefix(DOC_PREFIX) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    fn distinct_term_count(&self) -> StoreResult<usize> {
        let mut count = 0;
        for entry in self.db.scan_prefix(TERM_PREFIX) {
            entry?;
            count += 1;
        }
        Ok(count)
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
    fn round_trips_documents_and_postings() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedStore::open(dir.path()).unwrap();

        let mut postings = BTreeMap::new();
        postings.insert("search".to_string(), Posting::from_positions(vec![1]));
        postings.insert("engine".to_string(), Posting::from_positions(vec![0, 2]));
        store
            .write_document("d1", &doc("engine search engine", 3), &postings)
            .unwrap();

        assert_eq!(store.document_frequency("engine").unwrap(), 1);
        assert_eq!(store.distinct_term_count().unwrap(), 2);
        assert_eq!(
            store
                .get_tf_and_positions("engine", "d1")
                .unwrap()
                .unwrap()
                .positions,
            vec![0, 2]
        );
        assert_eq!(store.document_ids().unwrap(), vec!["d1".to_string()]);

        let fetched = store.get_document("d1").unwrap().unwrap();
        assert_eq!(fetched.length, 3);
    }

    #[test]
    fn replace_rewrites_the_term_space() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedStore::open(dir.path()).unwrap();

        let mut old = BTreeMap::new();
        old.insert("alpha".to_string(), Posting::from_positions(vec![0]));
        store.write_document("d1", &doc("alpha", 1), &old).unwrap();

        let mut new = BTreeMap::new();
        new.insert("beta".to_string(), Posting::from_positions(vec![0]));
        store
            .replace_document("d1", &["alpha".to_string()], &doc("beta", 1), &new)
            .unwrap();

        assert_eq!(store.document_frequency("alpha").unwrap(), 0);
        assert_eq!(store.distinct_term_count().unwrap(), 1);
    }

    #[test]
    fn metadata_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = IndexMetadata {
            doc_count: 7,
            term_count: 42,
            version: "v1.0".to_string(),
            use_stopwords: true,
            use_stemming: false,
        };
        {
            let store = EmbeddedStore::open(dir.path()).unwrap();
            store.put_metadata(&metadata).unwrap();
        }
        let store = EmbeddedStore::open(dir.path()).unwrap();
        assert_eq!(store.get_metadata().unwrap(), Some(metadata));
    }
}
