use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Inverse document frequency, natural log. A term with `df == 0`
/// contributes nothing and scores 0.
pub fn idf(df: usize, doc_count: usize) -> f64 {
    if df == 0 || doc_count == 0 {
        return 0.0;
    }
    (doc_count as f64 / df as f64).ln()
}

/// Length-normalized term frequency.
pub fn normalized_tf(tf: usize, doc_length: usize) -> f64 {
    if doc_length == 0 {
        return 0.0;
    }
    tf as f64 / doc_length as f64
}

/// Per-term score contribution: normalized tf times idf.
pub fn tf_idf(tf: usize, doc_length: usize, idf: f64) -> f64 {
    normalized_tf(tf, doc_length) * idf
}

/// Memoized IDF values, shared across concurrent readers. Every
/// `add_document` clears the cache before it returns, since both `N` and
/// `df` change under it.
#[derive(Debug, Default)]
pub struct IdfCache {
    values: RwLock<HashMap<String, f64>>,
}

impl IdfCache {
    pub fn new() -> Self {
        IdfCache::default()
    }

    /// Look up or compute the idf for `term`. Zero-df terms are not cached,
    /// matching the convention that unknown terms score 0 without creating
    /// index entries as a side effect.
    pub fn idf(&self, term: &str, df: usize, doc_count: usize) -> f64 {
        if df == 0 || doc_count == 0 {
            return 0.0;
        }
        if let Some(value) = self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(term)
        {
            return *value;
        }
        let value = idf(df, doc_count);
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(term.to_string(), value);
        value
    }

    pub fn invalidate(&self) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idf_is_zero_for_unknown_terms() {
        assert_eq!(idf(0, 100), 0.0);
        assert_eq!(idf(5, 0), 0.0);
    }

    #[test]
    fn idf_is_natural_log_of_n_over_df() {
        let value = idf(2, 10);
        assert!((value - (5.0_f64).ln()).abs() < 1e-12);
        // A term in every document carries no signal.
        assert_eq!(idf(10, 10), 0.0);
    }

    #[test]
    fn normalized_tf_handles_empty_documents() {
        assert_eq!(normalized_tf(3, 0), 0.0);
        assert!((normalized_tf(3, 12) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn cache_returns_memoized_values_until_invalidated() {
        let cache = IdfCache::new();
        let first = cache.idf("rust", 2, 8);
        // Deliberately pass a different df; the memoized value must win.
        let second = cache.idf("rust", 4, 8);
        assert_eq!(first, second);

        cache.invalidate();
        let third = cache.idf("rust", 4, 8);
        assert!((third - (2.0_f64).ln()).abs() < 1e-12);
    }
}
