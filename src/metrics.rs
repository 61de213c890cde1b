use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Upper bound on retained per-query samples; the oldest sample is dropped
/// once the buffer is full so hot-path appends never reallocate unboundedly.
const MAX_QUERY_SAMPLES: usize = 16_384;

/// Per-index timing recorder: cumulative ingest wall time plus a bounded
/// sequence of per-query wall times. Appends are a single lock acquisition
/// and a bounded push, safe on the query critical path.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: Mutex<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    indexing_time: Duration,
    query_times: VecDeque<Duration>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        MetricsRecorder::default()
    }

    pub fn record_ingest(&self, elapsed: Duration) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.indexing_time += elapsed;
    }

    pub fn record_query(&self, elapsed: Duration) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.query_times.len() == MAX_QUERY_SAMPLES {
            inner.query_times.pop_front();
        }
        inner.query_times.push_back(elapsed);
    }

    /// Query samples in seconds, oldest first. Used by the snapshot format.
    pub fn query_samples(&self) -> Vec<f64> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.query_times.iter().map(Duration::as_secs_f64).collect()
    }

    pub fn indexing_time_secs(&self) -> f64 {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.indexing_time.as_secs_f64()
    }

    /// Replace the recorder state, used when restoring a snapshot.
    pub fn restore(&self, indexing_time_secs: f64, query_samples: &[f64]) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.indexing_time = Duration::from_secs_f64(indexing_time_secs.max(0.0));
        inner.query_times = query_samples
            .iter()
            .rev()
            .take(MAX_QUERY_SAMPLES)
            .rev()
            .map(|&s| Duration::from_secs_f64(s.max(0.0)))
            .collect();
    }

    /// Derive the on-demand report from the recorded samples.
    pub fn report(&self, doc_count: usize, term_count: usize) -> MetricsReport {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sorted: Vec<f64> = inner.query_times.iter().map(Duration::as_secs_f64).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let query_count = sorted.len();
        let total: f64 = sorted.iter().sum();
        let avg = if query_count > 0 {
            total / query_count as f64
        } else {
            0.0
        };
        let throughput = if total > 0.0 {
            query_count as f64 / total
        } else {
            0.0
        };

        MetricsReport {
            doc_count,
            term_count,
            indexing_time_secs: inner.indexing_time.as_secs_f64(),
            query_count,
            avg_query_time_secs: avg,
            p50_query_time_secs: percentile(&sorted, 0.50),
            p95_query_time_secs: percentile(&sorted, 0.95),
            p99_query_time_secs: percentile(&sorted, 0.99),
            throughput_qps: throughput,
        }
    }
}

/// Percentile at `floor(p * n)` into the sorted sample sequence.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p * sorted.len() as f64) as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Counters and latency summary reported through the public API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub doc_count: usize,
    pub term_count: usize,
    pub indexing_time_secs: f64,
    pub query_count: usize,
    pub avg_query_time_secs: f64,
    pub p50_query_time_secs: f64,
    pub p95_query_time_secs: f64,
    pub p99_query_time_secs: f64,
    pub throughput_qps: f64,
}
