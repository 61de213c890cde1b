use crate::error::StoreError;
use crate::store::{PostingStore, StoreResult};
use crate::types::{IndexMetadata, Posting, PostingList, StoredDocument};
use redis::Commands;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Remote key-value backend on a Redis-compatible server. Per-term postings
/// live in a hash whose fields are doc_ids and whose values are JSON-encoded
/// postings; documents and lengths are top-level keys; counters sit in a
/// dedicated metadata key. Every key is prefixed with the index name so
/// several indexes can share one server.
pub struct RemoteStore {
    prefix: String,
    conn: Mutex<redis::Connection>,
}

impl RemoteStore {
    pub fn connect(index_name: &str, url: &str) -> Result<Self, StoreError> {
        debug!(url, index_name, "connecting remote store");
        let client = redis::Client::open(url)?;
        let mut conn = client.get_connection()?;
        redis::cmd("PING").query::<String>(&mut conn)?;
        Ok(RemoteStore {
            prefix: format!("{index_name}:"),
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> MutexGuard<'_, redis::Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn doc_key(&self, doc_id: &str) -> String {
        format!("{}doc:{doc_id}", self.prefix)
    }

    fn len_key(&self, doc_id: &str) -> String {
        format!("{}len:{doc_id}", self.prefix)
    }

    fn term_key(&self, term: &str) -> String {
        format!("{}inv:{term}", self.prefix)
    }

    fn metadata_key(&self) -> String {
        format!("{}metadata", self.prefix)
    }

    fn parse_posting_fields(fields: HashMap<String, String>) -> StoreResult<PostingList> {
        let mut list = PostingList::new();
        for (doc_id, raw) in fields {
            let posting: Posting = serde_json::from_str(&raw)?;
            list.insert(doc_id, posting);
        }
        Ok(list)
    }
}

impl PostingStore for RemoteStore {
    fn put_document(&self, doc_id: &str, document: &StoredDocument) -> StoreResult<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.set(self.doc_key(doc_id), serde_json::to_string(document)?)
            .ignore();
        pipe.set(self.len_key(doc_id), document.length).ignore();
        pipe.query::<()>(&mut *self.connection())?;
        Ok(())
    }

    fn put_postings(&self, doc_id: &str, postings: &BTreeMap<String, Posting>) -> StoreResult<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (term, posting) in postings {
            pipe.hset(self.term_key(term), doc_id, serde_json::to_string(posting)?)
                .ignore();
        }
        pipe.query::<()>(&mut *self.connection())?;
        Ok(())
    }

    fn write_document(
        &self,
        doc_id: &str,
        document: &StoredDocument,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.set(self.doc_key(doc_id), serde_json::to_string(document)?)
            .ignore();
        pipe.set(self.len_key(doc_id), document.length).ignore();
        for (term, posting) in postings {
            pipe.hset(self.term_key(term), doc_id, serde_json::to_string(posting)?)
                .ignore();
        }
        pipe.query::<()>(&mut *self.connection())?;
        Ok(())
    }

    fn remove_postings(&self, doc_id: &str, terms: &[String]) -> StoreResult<()> {
        // Redis drops a hash key once its last field is removed, so emptied
        // posting lists need no separate cleanup.
        let mut pipe = redis::pipe();
        pipe.atomic();
        for term in terms {
            pipe.hdel(self.term_key(term), doc_id).ignore();
        }
        pipe.query::<()>(&mut *self.connection())?;
        Ok(())
    }

    fn replace_document(
        &self,
        doc_id: &str,
        old_terms: &[String],
        document: &StoredDocument,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for term in old_terms {
            pipe.hdel(self.term_key(term), doc_id).ignore();
        }
        pipe.set(self.doc_key(doc_id), serde_json::to_string(document)?)
            .ignore();
        pipe.set(self.len_key(doc_id), document.length).ignore();
        for (term, posting) in postings {
            pipe.hset(self.term_key(term), doc_id, serde_json::to_string(posting)?)
                .ignore();
        }
        pipe.query::<()>(&mut *self.connection())?;
        Ok(())
    }

    fn get_document(&self, doc_id: &str) -> StoreResult<Option<StoredDocument>> {
        let raw: Option<String> = self.connection().get(self.doc_key(doc_id))?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn get_posting_list(&self, term: &str) -> StoreResult<PostingList> {
        let fields: HashMap<String, String> = self.connection().hgetall(self.term_key(term))?;
        RemoteStore::parse_posting_fields(fields)
    }

    fn get_tf_and_positions(&self, term: &str, doc_id: &str) -> StoreResult<Option<Posting>> {
        let raw: Option<String> = self.connection().hget(self.term_key(term), doc_id)?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn document_frequency(&self, term: &str) -> StoreResult<usize> {
        let df: usize = self.connection().hlen(self.term_key(term))?;
        Ok(df)
    }

    fn get_metadata(&self) -> StoreResult<Option<IndexMetadata>> {
        let raw: Option<String> = self.connection().get(self.metadata_key())?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put_metadata(&self, metadata: &IndexMetadata) -> StoreResult<()> {
        let _: () = self
            .connection()
            .set(self.metadata_key(), serde_json::to_string(metadata)?)?;
        Ok(())
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        let pattern = format!("{}doc:*", self.prefix);
        let keys: Vec<String> = self.connection().keys(pattern)?;
        let strip = format!("{}doc:", self.prefix);
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(&strip).map(str::to_string))
            .collect())
    }

    fn distinct_term_count(&self) -> StoreResult<usize> {
        let pattern = format!("{}inv:*", self.prefix);
        let keys: Vec<String> = self.connection().keys(pattern)?;
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a live server; run with REDIS_URL set and --ignored.
    #[test]
    #[ignore = "requires a running Redis server"]
    fn round_trips_against_live_server() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let store = RemoteStore::connect("quarry_test", &url).unwrap();

        let mut postings = BTreeMap::new();
        postings.insert("kv".to_string(), Posting::from_positions(vec![0]));
        let document = StoredDocument {
            body: "kv".to_string(),
            metadata: Default::default(),
            length: 1,
        };
        store.write_document("d1", &document, &postings).unwrap();

        assert_eq!(store.document_frequency("kv").unwrap(), 1);
        assert_eq!(
            store.get_tf_and_positions("kv", "d1").unwrap().unwrap().tf,
            1
        );

        store.remove_postings("d1", &["kv".to_string()]).unwrap();
        assert_eq!(store.document_frequency("kv").unwrap(), 0);
    }
}
