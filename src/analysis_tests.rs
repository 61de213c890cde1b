use super::*;

fn plain() -> Analyzer {
    Analyzer::new(AnalyzerOptions {
        use_stopwords: false,
        use_stemming: false,
    })
}

fn full() -> Analyzer {
    Analyzer::new(AnalyzerOptions::default())
}

#[test]
fn lowercases_input() {
    assert_eq!(plain().analyze("Hello WORLD"), vec!["hello", "world"]);
}

#[test]
fn strips_urls_and_emails() {
    let tokens = plain().analyze("see https://example.com/page and mail bob@example.com now");
    assert_eq!(tokens, vec!["see", "and", "mail", "now"]);
}

#[test]
fn sweeps_punctuation_to_spaces() {
    assert_eq!(
        plain().analyze("rock&roll, jazz/blues; funk!"),
        vec!["rock", "roll", "jazz", "blues", "funk"]
    );
}

#[test]
fn keeps_internal_hyphens_and_apostrophes() {
    assert_eq!(
        plain().analyze("state-of-the-art isn't obsolete"),
        vec!["state-of-the-art", "isn't", "obsolete"]
    );
}

#[test]
fn trims_edge_punctuation() {
    // Leading and trailing hyphens/apostrophes go, internal ones stay.
    assert_eq!(plain().analyze("-dash- 'quote'"), vec!["dash", "quote"]);
}

#[test]
fn drops_tokens_that_become_empty() {
    assert_eq!(plain().analyze("--- '' a"), vec!["a"]);
}

#[test]
fn stopword_removal_shifts_positions() {
    let analyzer = Analyzer::new(AnalyzerOptions {
        use_stopwords: true,
        use_stemming: false,
    });
    let tokens = analyzer.analyze("the cat sat on the mat");
    assert_eq!(tokens, vec!["cat", "sat", "mat"]);

    let positions = analyzer.term_positions("the cat sat on the mat");
    assert_eq!(positions.get("cat"), Some(&vec![0]));
    assert_eq!(positions.get("sat"), Some(&vec![1]));
    assert_eq!(positions.get("mat"), Some(&vec![2]));
}

#[test]
fn stemming_maps_surface_forms_together() {
    let analyzer = Analyzer::new(AnalyzerOptions {
        use_stopwords: false,
        use_stemming: true,
    });
    let running = analyzer.analyze("running");
    let runs = analyzer.analyze("runs");
    assert_eq!(running, runs);
}

#[test]
fn term_frequencies_count_occurrences() {
    let counts = plain().analyze("deep learning and deep networks");
    assert_eq!(counts.iter().filter(|t| *t == "deep").count(), 2);

    let freqs = plain().term_frequencies("deep learning and deep networks");
    assert_eq!(freqs.get("deep"), Some(&2));
    assert_eq!(freqs.get("learning"), Some(&1));
}

#[test]
fn positions_cover_the_full_token_stream() {
    let analyzer = full();
    let text = "Machine learning is a subset of artificial intelligence";
    let tokens = analyzer.analyze(text);
    let positions = analyzer.term_positions(text);

    let mut all: Vec<usize> = positions.values().flatten().copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..tokens.len()).collect::<Vec<_>>());
}

#[test]
fn analyzer_is_deterministic() {
    let analyzer = full();
    let text = "Deep learning is a subset of machine learning! http://x.io a@b.c";
    assert_eq!(analyzer.analyze(text), analyzer.analyze(text));
}

#[test]
fn empty_input_yields_no_tokens() {
    assert!(full().analyze("").is_empty());
    assert!(full().analyze("   \t\n").is_empty());
}
