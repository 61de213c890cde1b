use crate::analysis::Analyzer;
use crate::error::{EngineError, Result};
use crate::query::parser::QueryNode;
use crate::scoring::{tf_idf, IdfCache};
use crate::store::PostingStore;
use crate::types::{CancelToken, PostingList, SearchHit, StoredDocument};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Executes one query against a posting store. The document counter is read
/// once at construction, so scores stay internally consistent even when
/// writes interleave with the query.
pub struct Evaluator<'a> {
    store: &'a dyn PostingStore,
    analyzer: &'a Analyzer,
    idf_cache: &'a IdfCache,
    doc_count: usize,
    cancel: Option<&'a CancelToken>,
    /// Documents fetched during scoring, reused for hit materialization.
    fetched: RefCell<HashMap<String, StoredDocument>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        store: &'a dyn PostingStore,
        analyzer: &'a Analyzer,
        idf_cache: &'a IdfCache,
        cancel: Option<&'a CancelToken>,
    ) -> Result<Self> {
        let doc_count = store.get_metadata()?.map_or(0, |meta| meta.doc_count);
        Ok(Evaluator {
            store,
            analyzer,
            idf_cache,
            doc_count,
            cancel,
            fetched: RefCell::new(HashMap::new()),
        })
    }

    /// Cancellation is observed at posting-fetch granularity; partial work
    /// is discarded by returning early.
    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    /// Query-side set semantics: duplicates collapse, first-seen order kept.
    fn unique_terms(terms: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        terms
            .iter()
            .filter(|term| seen.insert(term.as_str()))
            .cloned()
            .collect()
    }

    fn document(&self, doc_id: &str) -> Result<StoredDocument> {
        if let Some(document) = self.fetched.borrow().get(doc_id) {
            return Ok(document.clone());
        }
        let document = self.store.get_document(doc_id)?.ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "document '{doc_id}' has postings but no record"
            ))
        })?;
        self.fetched
            .borrow_mut()
            .insert(doc_id.to_string(), document.clone());
        Ok(document)
    }

    /// Ranked retrieval, default engine (term-at-a-time).
    pub fn ranked(&self, terms: &[String], top_k: usize) -> Result<Vec<SearchHit>> {
        self.term_at_a_time(terms, top_k)
    }

    /// TAAT: outer loop over query terms, adding each term's contribution
    /// into a doc_id -> score accumulator.
    pub fn term_at_a_time(&self, terms: &[String], top_k: usize) -> Result<Vec<SearchHit>> {
        let scores = self.accumulate_scores(terms)?;
        self.materialize_ranked(scores, top_k)
    }

    /// DAAT: compute the candidate union first, then score one document at a
    /// time through point lookups.
    pub fn document_at_a_time(&self, terms: &[String], top_k: usize) -> Result<Vec<SearchHit>> {
        let unique = Evaluator::unique_terms(terms);
        let mut dfs: HashMap<String, usize> = HashMap::new();
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        for term in &unique {
            self.checkpoint()?;
            let list = self.store.get_posting_list(term)?;
            dfs.insert(term.clone(), list.len());
            candidates.extend(list.keys().cloned());
        }

        let mut scores: HashMap<String, f64> = HashMap::new();
        for doc_id in candidates {
            self.checkpoint()?;
            let length = self.document(&doc_id)?.length;
            let mut score = 0.0;
            for term in &unique {
                let df = dfs.get(term).copied().unwrap_or(0);
                if df == 0 {
                    continue;
                }
                if let Some(posting) = self.store.get_tf_and_positions(term, &doc_id)? {
                    let idf = self.idf_cache.idf(term, df, self.doc_count);
                    score += tf_idf(posting.tf, length, idf);
                }
            }
            scores.insert(doc_id, score);
        }
        self.materialize_ranked(scores, top_k)
    }

    /// Exact phrase match over the analyzed term sequence. Each document
    /// contributes at most one hit (the first matching start position);
    /// phrase hits score 1.0 uniformly.
    pub fn phrase(&self, terms: &[String], top_k: usize) -> Result<Vec<SearchHit>> {
        let matched = self.phrase_doc_ids(terms)?;
        let scores: HashMap<String, f64> = matched.into_iter().map(|id| (id, 1.0)).collect();
        self.materialize_ranked(scores, top_k)
    }

    /// Boolean evaluation over the parser tree, materialized with score 1.0
    /// in ascending doc_id order.
    pub fn boolean(&self, node: &QueryNode) -> Result<Vec<SearchHit>> {
        let ids = self.eval_node(node)?;
        let mut hits = Vec::with_capacity(ids.len());
        for doc_id in ids {
            let document = self.document(&doc_id)?;
            hits.push(SearchHit {
                doc_id,
                body: document.body,
                metadata: document.metadata,
                score: 1.0,
            });
        }
        Ok(hits)
    }

    fn eval_node(&self, node: &QueryNode) -> Result<BTreeSet<String>> {
        match node {
            QueryNode::Term(raw) => {
                let terms = self.analyzer.analyze(raw);
                Ok(self.accumulate_scores(&terms)?.into_keys().collect())
            }
            QueryNode::Phrase(raw) => {
                let terms = self.analyzer.analyze(raw);
                self.phrase_doc_ids(&terms)
            }
            QueryNode::Not(child) => {
                let excluded = self.eval_node(child)?;
                let mut ids: BTreeSet<String> = self.store.document_ids()?.into_iter().collect();
                ids.retain(|id| !excluded.contains(id));
                Ok(ids)
            }
            QueryNode::And(left, right) => {
                let left_ids = self.eval_node(left)?;
                let right_ids = self.eval_node(right)?;
                Ok(left_ids.intersection(&right_ids).cloned().collect())
            }
            QueryNode::Or(left, right) => {
                let left_ids = self.eval_node(left)?;
                let right_ids = self.eval_node(right)?;
                Ok(left_ids.union(&right_ids).cloned().collect())
            }
        }
    }

    /// Shared TAAT accumulator: doc_id -> summed tf-idf over unique terms.
    fn accumulate_scores(&self, terms: &[String]) -> Result<HashMap<String, f64>> {
        let mut scores: HashMap<String, f64> = HashMap::new();
        for term in Evaluator::unique_terms(terms) {
            self.checkpoint()?;
            let list = self.store.get_posting_list(&term)?;
            if list.is_empty() {
                // Unknown term: df = 0, contributes nothing.
                continue;
            }
            let idf = self.idf_cache.idf(&term, list.len(), self.doc_count);
            for (doc_id, posting) in &list {
                let length = self.document(doc_id)?.length;
                *scores.entry(doc_id.clone()).or_insert(0.0) += tf_idf(posting.tf, length, idf);
            }
        }
        Ok(scores)
    }

    fn phrase_doc_ids(&self, terms: &[String]) -> Result<BTreeSet<String>> {
        if terms.is_empty() {
            return Ok(BTreeSet::new());
        }

        let mut lists: HashMap<String, PostingList> = HashMap::new();
        for term in Evaluator::unique_terms(terms) {
            self.checkpoint()?;
            let list = self.store.get_posting_list(&term)?;
            if list.is_empty() {
                return Ok(BTreeSet::new());
            }
            lists.insert(term, list);
        }

        fn positions_of<'m>(
            lists: &'m HashMap<String, PostingList>,
            term: &str,
            doc_id: &str,
        ) -> &'m [usize] {
            lists
                .get(term)
                .and_then(|list| list.get(doc_id))
                .map_or(&[], |posting| posting.positions.as_slice())
        }

        // Candidate set: documents containing every phrase term.
        let mut candidates: Option<BTreeSet<String>> = None;
        for term in terms {
            let docs: BTreeSet<String> = lists
                .get(term.as_str())
                .map(|list| list.keys().cloned().collect())
                .unwrap_or_default();
            candidates = Some(match candidates {
                Some(current) => current.intersection(&docs).cloned().collect(),
                None => docs,
            });
        }
        let candidates = candidates.unwrap_or_default();

        let mut matched = BTreeSet::new();
        for doc_id in candidates {
            'starts: for &start in positions_of(&lists, &terms[0], &doc_id) {
                for (offset, term) in terms.iter().enumerate().skip(1) {
                    let expected = start + offset;
                    if positions_of(&lists, term, &doc_id)
                        .binary_search(&expected)
                        .is_err()
                    {
                        continue 'starts;
                    }
                }
                matched.insert(doc_id.clone());
                break; // first match per document
            }
        }
        debug!(terms = terms.len(), matches = matched.len(), "phrase evaluated");
        Ok(matched)
    }

    /// Sort by descending score, break ties by ascending doc_id, truncate to
    /// `top_k`, then attach document bodies and metadata.
    fn materialize_ranked(
        &self,
        scores: HashMap<String, f64>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut ranked: Vec<(String, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);

        let mut hits = Vec::with_capacity(ranked.len());
        for (doc_id, score) in ranked {
            let document = self.document(&doc_id)?;
            hits.push(SearchHit {
                doc_id,
                body: document.body,
                metadata: document.metadata,
                score,
            });
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    include!("evaluate_tests.rs");
}
