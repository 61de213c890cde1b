use quarry::{AnalyzerOptions, EngineError, IndexConfig, SearchIndex};
use std::collections::BTreeSet;

fn open_memory(name: &str) -> SearchIndex {
    SearchIndex::open(IndexConfig::in_memory(name)).unwrap()
}

fn doc_ids(hits: &[quarry::SearchHit]) -> Vec<&str> {
    hits.iter().map(|h| h.doc_id.as_str()).collect()
}

fn id_set(hits: &[quarry::SearchHit]) -> BTreeSet<&str> {
    hits.iter().map(|h| h.doc_id.as_str()).collect()
}

/// Small deterministic corpus generator. Spreads a fixed vocabulary across
/// documents so that term frequencies and document frequencies vary.
fn synthetic_corpus(index: &SearchIndex, size: usize) {
    const VOCAB: &[&str] = &[
        "engine", "index", "search", "query", "token", "ranking", "score", "storage", "backend",
        "memory", "disk", "network", "server", "parser", "boolean", "phrase", "position",
        "document", "term", "frequency", "cache", "metric", "latency", "snapshot", "cluster",
        "stream", "batch", "vector", "matrix", "graph",
    ];
    for i in 0..size {
        let mut words = Vec::new();
        let length = 5 + (i % 11);
        for j in 0..length {
            words.push(VOCAB[(i * 7 + j * 3 + i * j) % VOCAB.len()]);
        }
        let text = words.join(" ");
        index
            .add_document(&format!("doc{i:04}"), &text, None)
            .unwrap();
    }
}

#[test]
fn s1_basic_ranked_search() {
    let index = open_memory("s1");
    index
        .add_document(
            "doc1",
            "Machine learning is a subset of artificial intelligence",
            None,
        )
        .unwrap();
    index
        .add_document("doc2", "Deep learning is a subset of machine learning", None)
        .unwrap();
    index
        .add_document("doc3", "Neural networks are used in deep learning", None)
        .unwrap();
    // Background document without either query term, so both terms carry
    // signal (df < N) and all three scenario documents score above zero.
    index
        .add_document("doc4", "Symbolic reasoning systems predate statistics", None)
        .unwrap();

    let hits = index.search("machine learning", 3).unwrap();
    assert_eq!(doc_ids(&hits), vec!["doc2", "doc1", "doc3"]);
    assert!(hits[0].score > hits[1].score);
    assert!(hits[1].score > hits[2].score);
    assert!(hits[2].score > 0.0);
}

fn phone_corpus(index: &SearchIndex) {
    index
        .add_document("p1", "Apple released a new iPhone with a better camera", None)
        .unwrap();
    index
        .add_document("p2", "Apple updated its MacBook lineup this spring", None)
        .unwrap();
    index
        .add_document("p3", "Samsung launched a new Galaxy phone", None)
        .unwrap();
    index
        .add_document("p4", "Samsung and Apple compete in the phone market", None)
        .unwrap();
    index
        .add_document("p5", "Nokia phones were famously durable", None)
        .unwrap();
}

#[test]
fn s2_boolean_and_not() {
    let index = open_memory("s2");
    phone_corpus(&index);

    let hits = index.boolean_search("\"Apple\" AND NOT \"iPhone\"").unwrap();
    assert_eq!(doc_ids(&hits), vec!["p2", "p4"]);
    assert!(hits.iter().all(|h| h.score == 1.0));
}

#[test]
fn s3_phrase_search_with_stopwords() {
    let index = open_memory("s3");
    index
        .add_document("doc1", "the cat sat on the mat", None)
        .unwrap();
    index.add_document("doc2", "cat sat on mat", None).unwrap();
    index.add_document("doc3", "mat sat on cat", None).unwrap();

    // Stopwords vanish symmetrically from documents and phrase, so doc1 and
    // doc2 analyze to the same stream and both match.
    let hits = index.phrase_search("cat sat on the mat", 10).unwrap();
    assert_eq!(doc_ids(&hits), vec!["doc1", "doc2"]);
}

#[test]
fn s4_precedence_with_parentheses() {
    let index = open_memory("s4");
    phone_corpus(&index);

    let combined_hits = index
        .boolean_search("(\"Apple\" OR \"Samsung\") AND \"phone\"")
        .unwrap();
    let combined = id_set(&combined_hits);
    let either_hits = index.boolean_search("\"Apple\" OR \"Samsung\"").unwrap();
    let either = id_set(&either_hits);
    let phone_hits = index.boolean_search("\"phone\"").unwrap();
    let phone = id_set(&phone_hits);

    assert!(!combined.is_empty());
    assert!(combined.is_subset(&either) && combined != either);
    assert!(combined.is_subset(&phone) && combined != phone);
}

#[test]
fn s5_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.snapshot");

    let index = open_memory("s5");
    synthetic_corpus(&index, 120);
    index.search("engine ranking", 10).unwrap();
    index.snapshot(&path).unwrap();

    let restored =
        SearchIndex::open(IndexConfig::in_memory("s5-restored").with_snapshot(&path)).unwrap();

    let queries = [
        "engine",
        "index storage",
        "search query token",
        "ranking score",
        "backend memory disk",
        "network server",
        "parser boolean phrase",
        "position document",
        "term frequency",
        "cache metric latency",
        "snapshot cluster",
        "stream batch",
        "vector matrix graph",
        "engine engine index",
        "score latency stream",
    ];
    for query in queries {
        let original = index.search(query, 10).unwrap();
        let replayed = restored.search(query, 10).unwrap();
        assert_eq!(original.len(), replayed.len(), "query {query:?}");
        for (left, right) in original.iter().zip(replayed.iter()) {
            assert_eq!(left.doc_id, right.doc_id, "query {query:?}");
            assert_eq!(left.body, right.body);
            assert!((left.score - right.score).abs() < 1e-12, "query {query:?}");
        }
    }

    let before = index.metrics().unwrap();
    let after = restored.metrics().unwrap();
    assert_eq!(before.doc_count, after.doc_count);
    assert_eq!(before.term_count, after.term_count);
    assert_eq!(before.query_count, after.query_count);
}

#[test]
fn s6_taat_daat_equivalence_on_large_corpus() {
    let index = open_memory("s6");
    synthetic_corpus(&index, 1000);

    let queries = [
        "engine index",
        "search query token ranking",
        "storage backend memory",
        "parser boolean phrase position score",
        "cache latency",
    ];
    for query in queries {
        let terms = index.analyzer().analyze(query);
        assert!((2..=5).contains(&terms.len()));
        let taat = index.search_taat(&terms, 10).unwrap();
        let daat = index.search_daat(&terms, 10).unwrap();

        assert_eq!(taat.len(), daat.len(), "query {query:?}");
        for (left, right) in taat.iter().zip(daat.iter()) {
            assert_eq!(left.doc_id, right.doc_id, "query {query:?}");
            assert!(
                (left.score - right.score).abs() < 1e-10,
                "query {query:?}: {} vs {}",
                left.score,
                right.score
            );
        }
    }
}

#[test]
fn boolean_identities_hold() {
    let index = open_memory("identities");
    phone_corpus(&index);

    let x_hits = index.boolean_search("\"phone\"").unwrap();
    let x = id_set(&x_hits);
    let not_not_hits = index.boolean_search("NOT NOT \"phone\"").unwrap();
    assert_eq!(id_set(&not_not_hits), x);
    assert_eq!(
        id_set(&index.boolean_search("\"phone\" AND \"phone\"").unwrap()),
        x
    );
    assert_eq!(
        id_set(&index.boolean_search("\"phone\" OR \"phone\"").unwrap()),
        x
    );

    // De Morgan's laws.
    assert_eq!(
        id_set(&index.boolean_search("NOT (\"Apple\" OR \"Samsung\")").unwrap()),
        id_set(
            &index
                .boolean_search("NOT \"Apple\" AND NOT \"Samsung\"")
                .unwrap()
        )
    );
    assert_eq!(
        id_set(&index.boolean_search("NOT (\"Apple\" AND \"Samsung\")").unwrap()),
        id_set(
            &index
                .boolean_search("NOT \"Apple\" OR NOT \"Samsung\"")
                .unwrap()
        )
    );
}

#[test]
fn phrase_monotonicity() {
    let index = open_memory("monotonic");
    index
        .add_document("d1", "distributed search engine design", None)
        .unwrap();
    index
        .add_document("d2", "search engine internals", None)
        .unwrap();
    index.add_document("d3", "engine design notes", None).unwrap();

    let long_hits = index.phrase_search("search engine design", 10).unwrap();
    let long = id_set(&long_hits);
    let short_hits = index.phrase_search("search engine", 10).unwrap();
    let short = id_set(&short_hits);
    // Adding a term can only shrink the phrase match set.
    assert!(long.is_subset(&short));

    // Removing a term can only grow (or hold) the ranked result set.
    let ranked_long_hits = index.search("search engine design", 10).unwrap();
    let ranked_long = id_set(&ranked_long_hits);
    let ranked_short_hits = index.search("search engine", 10).unwrap();
    let ranked_short = id_set(&ranked_short_hits);
    assert!(ranked_short.is_subset(&ranked_long));
}

#[test]
fn replace_keeps_doc_count_and_drops_stale_terms() {
    let index = open_memory("replace");
    index
        .add_document("d1", "obsolete mainframe terminal", None)
        .unwrap();
    index
        .add_document("d2", "modern laptop hardware", None)
        .unwrap();
    index
        .add_document("d1", "modern tablet hardware", None)
        .unwrap();

    let report = index.metrics().unwrap();
    assert_eq!(report.doc_count, 2);

    assert!(index.search("mainframe", 10).unwrap().is_empty());
    let hits = index.search("tablet", 10).unwrap();
    assert_eq!(doc_ids(&hits), vec!["d1"]);
    assert_eq!(index.get_document("d1").unwrap().body, "modern tablet hardware");
}

#[test]
fn empty_query_is_not_an_error() {
    let index = open_memory("empty");
    phone_corpus(&index);

    assert!(index.search("", 10).unwrap().is_empty());
    // Pure-stopword query analyzes to nothing.
    assert!(index.search("the of and", 10).unwrap().is_empty());
    assert!(index.boolean_search("   ").unwrap().is_empty());
}

#[test]
fn malformed_boolean_query_reports_position() {
    let index = open_memory("malformed");
    phone_corpus(&index);

    // Unmatched parenthesis anchors the error at the opening '('.
    match index.boolean_search("(\"Apple\" OR \"Samsung\"") {
        Err(EngineError::Parse { position, .. }) => assert_eq!(position, 0),
        other => panic!("expected parse error, got {other:?}"),
    }
    // A dangling operator fails too; no partial result list is emitted.
    assert!(matches!(
        index.boolean_search("\"Apple\" AND"),
        Err(EngineError::Parse { .. })
    ));
}

#[test]
fn missing_document_lookup_is_not_found() {
    let index = open_memory("missing");
    match index.get_document("ghost") {
        Err(EngineError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn posting_list_probe_reports_positions() {
    let index = open_memory("probe");
    index
        .add_document("d1", "token stream token", None)
        .unwrap();
    index.add_document("d2", "token soup", None).unwrap();

    let probe = index.posting_list("token").unwrap();
    assert_eq!(probe.len(), 2);
    assert_eq!(probe["d1"], vec![0, 2]);
    assert_eq!(probe["d2"], vec![0]);
}

#[test]
fn snapshot_refused_on_disk_backends() {
    let dir = tempfile::tempdir().unwrap();
    let index = SearchIndex::open(
        IndexConfig::in_memory("disk").with_backend(quarry::BackendConfig::Embedded {
            path: dir.path().join("db"),
        }),
    )
    .unwrap();

    match index.snapshot(&dir.path().join("x.snapshot")) {
        Err(EngineError::Config(_)) => {}
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn mismatched_analyzer_toggles_fail_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let config = IndexConfig::in_memory("toggles").with_backend(quarry::BackendConfig::Embedded {
        path: path.clone(),
    });
    {
        let index = SearchIndex::open(config.clone()).unwrap();
        index.add_document("d1", "tokenized once", None).unwrap();
    }

    let mismatched = config.with_analyzer(AnalyzerOptions {
        use_stopwords: false,
        use_stemming: false,
    });
    match SearchIndex::open(mismatched) {
        Err(EngineError::Config(_)) => {}
        other => panic!("expected ConfigError, got {other:?}"),
    }
}
