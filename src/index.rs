use crate::analysis::{Analyzer, AnalyzerOptions};
use crate::error::{EngineError, Result};
use crate::metrics::{MetricsRecorder, MetricsReport};
use crate::query::evaluate::Evaluator;
use crate::query::parser::parse_query;
use crate::scoring::IdfCache;
use crate::store::{
    BackendConfig, EmbeddedStore, MemoryStore, PostingStore, RelationalStore, RemoteStore,
    Snapshot, SNAPSHOT_FORMAT_VERSION,
};
use crate::types::{CancelToken, IndexMetadata, Metadata, Posting, SearchHit, StoredDocument};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Everything needed to create or open an index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub name: String,
    pub version: String,
    pub backend: BackendConfig,
    pub analyzer: AnalyzerOptions,
    /// Snapshot file to restore on open; in-memory backend only.
    pub snapshot: Option<PathBuf>,
}

impl IndexConfig {
    pub fn in_memory(name: impl Into<String>) -> Self {
        IndexConfig {
            name: name.into(),
            version: "v1.0".to_string(),
            backend: BackendConfig::Memory,
            analyzer: AnalyzerOptions::default(),
            snapshot: None,
        }
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_analyzer(mut self, analyzer: AnalyzerOptions) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(path.into());
        self
    }
}

/// A handle to one logical index: the analyzer, the storage backend, the
/// shared IDF cache, and the metrics recorder. Single writer with concurrent
/// readers; all methods take `&self`.
pub struct SearchIndex {
    name: String,
    version: String,
    analyzer: Analyzer,
    store: Arc<dyn PostingStore>,
    memory: Option<Arc<MemoryStore>>,
    idf_cache: IdfCache,
    metrics: MetricsRecorder,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl SearchIndex {
    /// Create or open an index. Opening an existing index with analyzer
    /// toggles different from the ones it was written with is a
    /// `ConfigError`: positions and terms in storage would not line up with
    /// query-side analysis.
    pub fn open(config: IndexConfig) -> Result<SearchIndex> {
        let (store, memory): (Arc<dyn PostingStore>, Option<Arc<MemoryStore>>) =
            match &config.backend {
                BackendConfig::Memory => {
                    let memory = Arc::new(MemoryStore::new());
                    (memory.clone() as Arc<dyn PostingStore>, Some(memory))
                }
                BackendConfig::Embedded { path } => (Arc::new(EmbeddedStore::open(path)?), None),
                BackendConfig::Remote { url } => {
                    (Arc::new(RemoteStore::connect(&config.name, url)?), None)
                }
                BackendConfig::Relational { path } => {
                    (Arc::new(RelationalStore::open(path)?), None)
                }
            };

        let index = SearchIndex {
            name: config.name,
            version: config.version,
            analyzer: Analyzer::new(config.analyzer),
            store,
            memory,
            idf_cache: IdfCache::new(),
            metrics: MetricsRecorder::new(),
        };

        if let Some(snapshot_path) = &config.snapshot {
            index.restore(snapshot_path)?;
        }

        match index.store.get_metadata()? {
            Some(meta) => {
                let options = index.analyzer.options();
                if meta.use_stopwords != options.use_stopwords
                    || meta.use_stemming != options.use_stemming
                {
                    return Err(EngineError::Config(format!(
                        "index '{}' was written with use_stopwords={}, use_stemming={}",
                        index.name, meta.use_stopwords, meta.use_stemming
                    )));
                }
            }
            None => {
                index.store.put_metadata(&index.fresh_metadata())?;
            }
        }

        info!(name = %index.name, "index opened");
        Ok(index)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    fn fresh_metadata(&self) -> IndexMetadata {
        let options = self.analyzer.options();
        IndexMetadata {
            doc_count: 0,
            term_count: 0,
            version: self.version.clone(),
            use_stopwords: options.use_stopwords,
            use_stemming: options.use_stemming,
        }
    }

    fn evaluator<'a>(&'a self, cancel: Option<&'a CancelToken>) -> Result<Evaluator<'a>> {
        Evaluator::new(self.store.as_ref(), &self.analyzer, &self.idf_cache, cancel)
    }

    /// Ingest one document. An existing identifier is replaced: the old
    /// version's postings are removed and the new record and postings become
    /// visible together.
    pub fn add_document(
        &self,
        doc_id: &str,
        text: &str,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        let start = Instant::now();

        let tokens = self.analyzer.analyze(text);
        let length = tokens.len();
        let mut grouped: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (position, term) in tokens.into_iter().enumerate() {
            grouped.entry(term).or_default().push(position);
        }
        let mut postings: BTreeMap<String, Posting> = BTreeMap::new();
        for (term, positions) in grouped {
            let posting = Posting::from_positions(positions);
            posting
                .validate(length)
                .map_err(EngineError::InvariantViolation)?;
            postings.insert(term, posting);
        }

        let document = StoredDocument {
            body: text.to_string(),
            metadata: metadata.unwrap_or_default(),
            length,
        };

        let existing = self.store.get_document(doc_id)?;
        let replaced = existing.is_some();
        match existing {
            Some(old) => {
                // The analyzer is deterministic and its toggles are fixed per
                // index, so the old term set is recoverable from the old body.
                let old_terms: Vec<String> =
                    self.analyzer.term_positions(&old.body).into_keys().collect();
                self.store
                    .replace_document(doc_id, &old_terms, &document, &postings)?;
            }
            None => {
                self.store.write_document(doc_id, &document, &postings)?;
            }
        }

        let mut meta = self
            .store
            .get_metadata()?
            .unwrap_or_else(|| self.fresh_metadata());
        if !replaced {
            meta.doc_count += 1;
        }
        meta.term_count = self.store.distinct_term_count()?;
        self.store.put_metadata(&meta)?;

        // Must be visible before this call returns; N and df have changed.
        self.idf_cache.invalidate();

        self.metrics.record_ingest(start.elapsed());
        debug!(doc_id, length, replaced, "document indexed");
        Ok(())
    }

    /// Ranked retrieval over the analyzed query terms (TAAT engine).
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        self.search_with_cancel(query, top_k, None)
    }

    pub fn search_with_cancel(
        &self,
        query: &str,
        top_k: usize,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        let terms = self.analyzer.analyze(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let hits = self.evaluator(cancel)?.ranked(&terms, top_k)?;
        self.metrics.record_query(start.elapsed());
        Ok(hits)
    }

    /// Term-at-a-time ranked evaluation over a pre-analyzed term list.
    pub fn search_taat(&self, terms: &[String], top_k: usize) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        let hits = self.evaluator(None)?.term_at_a_time(terms, top_k)?;
        self.metrics.record_query(start.elapsed());
        Ok(hits)
    }

    /// Document-at-a-time ranked evaluation over a pre-analyzed term list.
    pub fn search_daat(&self, terms: &[String], top_k: usize) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        let hits = self.evaluator(None)?.document_at_a_time(terms, top_k)?;
        self.metrics.record_query(start.elapsed());
        Ok(hits)
    }

    /// Exact phrase match over the analyzed phrase terms.
    pub fn phrase_search(&self, phrase: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        let terms = self.analyzer.analyze(phrase);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let hits = self.evaluator(None)?.phrase(&terms, top_k)?;
        self.metrics.record_query(start.elapsed());
        Ok(hits)
    }

    /// Boolean retrieval. The result set is materialized with score 1.0 in
    /// ascending doc_id order.
    pub fn boolean_search(&self, query: &str) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let node = parse_query(query)?;
        let hits = self.evaluator(None)?.boolean(&node)?;
        self.metrics.record_query(start.elapsed());
        Ok(hits)
    }

    /// Posting-list probe: analyze the input, look up the first resulting
    /// term, and return doc_id -> positions.
    pub fn posting_list(&self, term: &str) -> Result<BTreeMap<String, Vec<usize>>> {
        let analyzed = self.analyzer.analyze(term);
        let Some(first) = analyzed.first() else {
            return Ok(BTreeMap::new());
        };
        let list = self.store.get_posting_list(first)?;
        Ok(crate::store::positions_by_document(&list))
    }

    /// Point lookup of a document record. Absence is an error here, unlike
    /// in query results.
    pub fn get_document(&self, doc_id: &str) -> Result<StoredDocument> {
        self.store
            .get_document(doc_id)?
            .ok_or_else(|| EngineError::NotFound(format!("document '{doc_id}'")))
    }

    /// Counters plus latency percentiles.
    pub fn metrics(&self) -> Result<MetricsReport> {
        let meta = self
            .store
            .get_metadata()?
            .unwrap_or_else(|| self.fresh_metadata());
        Ok(self.metrics.report(meta.doc_count, meta.term_count))
    }

    /// Dump the whole index to a self-describing snapshot file. In-memory
    /// backend only.
    pub fn snapshot(&self, path: &Path) -> Result<()> {
        let memory = self.memory.as_ref().ok_or_else(|| {
            EngineError::Config("snapshot is only supported by the in-memory backend".to_string())
        })?;
        let (documents, postings) = memory.dump_tables();
        let metadata = self
            .store
            .get_metadata()?
            .unwrap_or_else(|| self.fresh_metadata());
        let snapshot = Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            metadata,
            documents,
            postings,
            indexing_time_secs: self.metrics.indexing_time_secs(),
            query_time_secs: self.metrics.query_samples(),
        };
        snapshot.write_to(path).map_err(EngineError::Backend)?;
        info!(name = %self.name, path = %path.display(), "snapshot written");
        Ok(())
    }

    fn restore(&self, path: &Path) -> Result<()> {
        let memory = self.memory.as_ref().ok_or_else(|| {
            EngineError::Config("restore is only supported by the in-memory backend".to_string())
        })?;
        let snapshot = Snapshot::read_from(path).map_err(EngineError::Backend)?;
        self.metrics
            .restore(snapshot.indexing_time_secs, &snapshot.query_time_secs);
        memory.load_tables(snapshot.documents, snapshot.postings, snapshot.metadata);
        self.idf_cache.invalidate();
        info!(name = %self.name, path = %path.display(), "snapshot restored");
        Ok(())
    }
}
