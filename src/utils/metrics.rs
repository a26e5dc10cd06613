use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency samples kept per series
const LATENCY_WINDOW: usize = 1024;

/// Validator metrics.
///
/// Counts transactions, verdicts, failures and deliveries, and keeps a
/// sliding window of latencies. Cheap to clone and shared across handlers.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    transactions_total: AtomicUsize,
    verdicts_match: AtomicUsize,
    verdicts_mismatch: AtomicUsize,

    // Failed transactions keyed by error kind
    failures: DashMap<&'static str, AtomicUsize>,

    deliveries_delivered: AtomicUsize,
    deliveries_failed: AtomicUsize,
    deliveries_skipped: AtomicUsize,
    delivery_retries: AtomicUsize,

    recognition_latency_ms: RwLock<VecDeque<u64>>,
    transaction_latency_ms: RwLock<VecDeque<u64>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                transactions_total: AtomicUsize::new(0),
                verdicts_match: AtomicUsize::new(0),
                verdicts_mismatch: AtomicUsize::new(0),
                failures: DashMap::new(),
                deliveries_delivered: AtomicUsize::new(0),
                deliveries_failed: AtomicUsize::new(0),
                deliveries_skipped: AtomicUsize::new(0),
                delivery_retries: AtomicUsize::new(0),
                recognition_latency_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                transaction_latency_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_transaction_started(&self) {
        self.inner.transactions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verdict(&self, is_match: bool, duration: Duration) {
        if is_match {
            self.inner.verdicts_match.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.verdicts_mismatch.fetch_add(1, Ordering::Relaxed);
        }
        push_sample(&self.inner.transaction_latency_ms, duration);
    }

    pub fn record_failure(&self, kind: &'static str) {
        self.inner
            .failures
            .entry(kind)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recognition(&self, duration: Duration) {
        push_sample(&self.inner.recognition_latency_ms, duration);
    }

    pub fn record_delivery_delivered(&self) {
        self.inner.deliveries_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_failed(&self) {
        self.inner.deliveries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_skipped(&self) {
        self.inner.deliveries_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_retry(&self) {
        self.inner.delivery_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let recognition = self.inner.recognition_latency_ms.read();
        let recognition_avg_ms = avg(recognition.iter());
        let recognition_p50_ms = percentile(recognition.iter(), 0.5);
        let recognition_p95_ms = percentile(recognition.iter(), 0.95);
        drop(recognition);

        let transaction = self.inner.transaction_latency_ms.read();
        let transaction_avg_ms = avg(transaction.iter());
        let transaction_p95_ms = percentile(transaction.iter(), 0.95);
        drop(transaction);

        let mut failures: Vec<(String, usize)> = self
            .inner
            .failures
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect();
        failures.sort();

        MetricsSnapshot {
            transactions_total: self.inner.transactions_total.load(Ordering::Relaxed),
            verdicts_match: self.inner.verdicts_match.load(Ordering::Relaxed),
            verdicts_mismatch: self.inner.verdicts_mismatch.load(Ordering::Relaxed),
            failures,
            deliveries_delivered: self.inner.deliveries_delivered.load(Ordering::Relaxed),
            deliveries_failed: self.inner.deliveries_failed.load(Ordering::Relaxed),
            deliveries_skipped: self.inner.deliveries_skipped.load(Ordering::Relaxed),
            delivery_retries: self.inner.delivery_retries.load(Ordering::Relaxed),
            recognition_avg_ms,
            recognition_p50_ms,
            recognition_p95_ms,
            transaction_avg_ms,
            transaction_p95_ms,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();

        let mut failure_lines = String::new();
        for (kind, count) in &snapshot.failures {
            failure_lines.push_str(&format!(
                "validation_failures_total{{kind=\"{}\"}} {}\n",
                kind, count
            ));
        }

        format!(
            r#"# HELP validation_transactions_total Validation transactions started
# TYPE validation_transactions_total counter
validation_transactions_total {}

# HELP validation_verdicts_total Verdicts produced, by outcome
# TYPE validation_verdicts_total counter
validation_verdicts_total{{match="true"}} {}
validation_verdicts_total{{match="false"}} {}

# HELP validation_failures_total Failed transactions, by error kind
# TYPE validation_failures_total counter
{}
# HELP verdict_deliveries_total Verdict deliveries to the sink, by status
# TYPE verdict_deliveries_total counter
verdict_deliveries_total{{status="delivered"}} {}
verdict_deliveries_total{{status="failed"}} {}
verdict_deliveries_total{{status="skipped"}} {}

# HELP verdict_delivery_retries_total Extra delivery attempts
# TYPE verdict_delivery_retries_total counter
verdict_delivery_retries_total {}

# HELP recognition_latency_ms Recognition latency over the recent window
# TYPE recognition_latency_ms gauge
recognition_latency_ms{{stat="avg"}} {}
recognition_latency_ms{{stat="p50"}} {}
recognition_latency_ms{{stat="p95"}} {}

# HELP transaction_latency_ms End-to-end transaction latency over the recent window
# TYPE transaction_latency_ms gauge
transaction_latency_ms{{stat="avg"}} {}
transaction_latency_ms{{stat="p95"}} {}

# HELP uptime_seconds Service uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {}
"#,
            snapshot.transactions_total,
            snapshot.verdicts_match,
            snapshot.verdicts_mismatch,
            failure_lines,
            snapshot.deliveries_delivered,
            snapshot.deliveries_failed,
            snapshot.deliveries_skipped,
            snapshot.delivery_retries,
            snapshot.recognition_avg_ms,
            snapshot.recognition_p50_ms,
            snapshot.recognition_p95_ms,
            snapshot.transaction_avg_ms,
            snapshot.transaction_p95_ms,
            snapshot.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub transactions_total: usize,
    pub verdicts_match: usize,
    pub verdicts_mismatch: usize,
    pub failures: Vec<(String, usize)>,
    pub deliveries_delivered: usize,
    pub deliveries_failed: usize,
    pub deliveries_skipped: usize,
    pub delivery_retries: usize,
    pub recognition_avg_ms: u64,
    pub recognition_p50_ms: u64,
    pub recognition_p95_ms: u64,
    pub transaction_avg_ms: u64,
    pub transaction_p95_ms: u64,
    pub uptime_seconds: u64,
}

fn push_sample(series: &RwLock<VecDeque<u64>>, duration: Duration) {
    let mut series = series.write();
    if series.len() == LATENCY_WINDOW {
        series.pop_front();
    }
    series.push_back(duration.as_millis() as u64);
}

fn percentile<'a>(values: impl Iterator<Item = &'a u64>, p: f64) -> u64 {
    let mut sorted: Vec<u64> = values.copied().collect();
    if sorted.is_empty() {
        return 0;
    }
    sorted.sort_unstable();
    let idx = ((sorted.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg<'a>(values: impl ExactSizeIterator<Item = &'a u64>) -> u64 {
    let len = values.len() as u64;
    if len == 0 {
        return 0;
    }
    values.sum::<u64>() / len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_transaction_started();
        metrics.record_transaction_started();
        metrics.record_transaction_started();
        metrics.record_verdict(true, Duration::from_millis(40));
        metrics.record_verdict(false, Duration::from_millis(60));
        metrics.record_failure("invalid_encoding");
        metrics.record_delivery_delivered();
        metrics.record_delivery_failed();
        metrics.record_delivery_retry();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transactions_total, 3);
        assert_eq!(snapshot.verdicts_match, 1);
        assert_eq!(snapshot.verdicts_mismatch, 1);
        assert_eq!(snapshot.failures, vec![("invalid_encoding".to_string(), 1)]);
        assert_eq!(snapshot.deliveries_delivered, 1);
        assert_eq!(snapshot.deliveries_failed, 1);
        assert_eq!(snapshot.delivery_retries, 1);
        assert_eq!(snapshot.transaction_avg_ms, 50);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let metrics = Metrics::new();
        for _ in 0..(LATENCY_WINDOW + 10) {
            metrics.record_recognition(Duration::from_millis(5));
        }
        assert_eq!(metrics.inner.recognition_latency_ms.read().len(), LATENCY_WINDOW);
        assert_eq!(metrics.snapshot().recognition_p95_ms, 5);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_transaction_started();
        metrics.record_verdict(true, Duration::from_millis(10));
        metrics.record_failure("unmapped_label");

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("validation_transactions_total 1"));
        assert!(prometheus.contains("validation_verdicts_total{match=\"true\"} 1"));
        assert!(prometheus.contains("validation_failures_total{kind=\"unmapped_label\"} 1"));
    }
}
