use crate::error::StoreError;
use crate::store::{PostingStore, StoreResult};
use crate::types::{IndexMetadata, Posting, PostingList, StoredDocument};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

const METADATA_ROW: &str = "__metadata__";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    doc_id   TEXT PRIMARY KEY,
    body     TEXT NOT NULL,
    metadata TEXT NOT NULL,
    length   INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS postings (
    term      TEXT NOT NULL,
    doc_id    TEXT NOT NULL,
    tf        INTEGER NOT NULL,
    positions TEXT NOT NULL,
    PRIMARY KEY (term, doc_id)
);
CREATE INDEX IF NOT EXISTS idx_postings_term ON postings(term);
CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Relational backend on SQLite: `documents`, `postings` (btree-indexed by
/// term), and a `metadata` key-value table. Position lists are stored as a
/// JSON-encoded integer array column. Each document write runs in one
/// transaction.
pub struct RelationalStore {
    conn: Mutex<Connection>,
}

impl RelationalStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        debug!(path = %path.display(), "opening relational store");
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(RelationalStore {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_document(tx: &rusqlite::Transaction<'_>, doc_id: &str, document: &StoredDocument) -> StoreResult<()> {
        tx.execute(
            "INSERT OR REPLACE INTO documents (doc_id, body, metadata, length) VALUES (?1, ?2, ?3, ?4)",
            params![
                doc_id,
                document.body,
                serde_json::to_string(&document.metadata)?,
                document.length as i64
            ],
        )?;
        Ok(())
    }

    fn insert_postings(
        tx: &rusqlite::Transaction<'_>,
        doc_id: &str,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO postings (term, doc_id, tf, positions) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (term, posting) in postings {
            stmt.execute(params![
                term,
                doc_id,
                posting.tf as i64,
                serde_json::to_string(&posting.positions)?
            ])?;
        }
        Ok(())
    }

    fn delete_postings(
        tx: &rusqlite::Transaction<'_>,
        doc_id: &str,
        terms: &[String],
    ) -> StoreResult<()> {
        let mut stmt = tx.prepare("DELETE FROM postings WHERE term = ?1 AND doc_id = ?2")?;
        for term in terms {
            stmt.execute(params![term, doc_id])?;
        }
        Ok(())
    }
}

impl PostingStore for RelationalStore {
    fn put_document(&self, doc_id: &str, document: &StoredDocument) -> StoreResult<()> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        RelationalStore::insert_document(&tx, doc_id, document)?;
        tx.commit()?;
        Ok(())
    }

    fn put_postings(&self, doc_id: &str, postings: &BTreeMap<String, Posting>) -> StoreResult<()> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        RelationalStore::insert_postings(&tx, doc_id, postings)?;
        tx.commit()?;
        Ok(())
    }

    fn write_document(
        &self,
        doc_id: &str,
        document: &StoredDocument,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        RelationalStore::insert_document(&tx, doc_id, document)?;
        RelationalStore::insert_postings(&tx, doc_id, postings)?;
        tx.commit()?;
        Ok(())
    }

    fn remove_postings(&self, doc_id: &str, terms: &[String]) -> StoreResult<()> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        RelationalStore::delete_postings(&tx, doc_id, terms)?;
        tx.commit()?;
        Ok(())
    }

    fn replace_document(
        &self,
        doc_id: &str,
        old_terms: &[String],
        document: &StoredDocument,
        postings: &BTreeMap<String, Posting>,
    ) -> StoreResult<()> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        RelationalStore::delete_postings(&tx, doc_id, old_terms)?;
        RelationalStore::insert_document(&tx, doc_id, document)?;
        RelationalStore::insert_postings(&tx, doc_id, postings)?;
        tx.commit()?;
        Ok(())
    }

    fn get_document(&self, doc_id: &str) -> StoreResult<Option<StoredDocument>> {
        let conn = self.connection();
        let row = conn
            .query_row(
                "SELECT body, metadata, length FROM documents WHERE doc_id = ?1",
                params![doc_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((body, metadata, length)) => Ok(Some(StoredDocument {
                body,
                metadata: serde_json::from_str(&metadata)?,
                length: length as usize,
            })),
            None => Ok(None),
        }
    }

    fn get_posting_list(&self, term: &str) -> StoreResult<PostingList> {
        let conn = self.connection();
        let mut stmt =
            conn.prepare("SELECT doc_id, tf, positions FROM postings WHERE term = ?1")?;
        let rows = stmt.query_map(params![term], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut list = PostingList::new();
        for row in rows {
            let (doc_id, tf, positions) = row?;
            list.insert(
                doc_id,
                Posting {
                    tf: tf as usize,
                    positions: serde_json::from_str(&positions)?,
                },
            );
        }
        Ok(list)
    }

    fn get_tf_and_positions(&self, term: &str, doc_id: &str) -> StoreResult<Option<Posting>> {
        let conn = self.connection();
        let row = conn
            .query_row(
                "SELECT tf, positions FROM postings WHERE term = ?1 AND doc_id = ?2",
                params![term, doc_id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        match row {
            Some((tf, positions)) => Ok(Some(Posting {
                tf: tf as usize,
                positions: serde_json::from_str(&positions)?,
            })),
            None => Ok(None),
        }
    }

    fn document_frequency(&self, term: &str) -> StoreResult<usize> {
        let conn = self.connection();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM postings WHERE term = ?1",
            params![term],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn get_metadata(&self) -> StoreResult<Option<IndexMetadata>> {
        let conn = self.connection();
        let raw = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![METADATA_ROW],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put_metadata(&self, metadata: &IndexMetadata) -> StoreResult<()> {
        let conn = self.connection();
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![METADATA_ROW, serde_json::to_string(metadata)?],
        )?;
        Ok(())
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        let conn = self.connection();
        let mut stmt = conn.prepare("SELECT doc_id FROM documents ORDER BY doc_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn distinct_term_count(&self) -> StoreResult<usize> {
        let conn = self.connection();
        let count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT term) FROM postings", [], |row| {
                row.get(0)
            })?;
        Ok(count as usize)
    }
}
