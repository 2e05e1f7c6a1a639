//! Prometheus metrics for the financial QA assistant
//!
//! - `finqa_exchanges_total` (counter) - Answered questions by outcome
//! - `finqa_stage_failures_total` (counter) - Stage failures by stage and error kind
//! - `finqa_stage_duration_seconds` (histogram) - Stage duration distribution
//! - `finqa_span_events_{sent,failed,dropped}_total` (counters) - Span delivery
//!
//! # Example
//!
//! ```rust,no_run
//! use financial_qa::telemetry::QaMetricsRegistry;
//!
//! let registry = QaMetricsRegistry::new().unwrap();
//! let metrics = registry.metrics();
//!
//! metrics.record_exchange(true);
//! metrics.record_stage_failure("document_search", "search");
//! metrics.observe_stage("answer_generation", 0.8);
//! ```

use prometheus::{Counter, CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

use super::{Result, TelemetryError};

const NAMESPACE: &str = "finqa";

/// Question answering metrics
pub struct QaMetrics {
    /// Exchanges by outcome (success, failure)
    exchanges_total: CounterVec,

    /// Stage failures by stage and error kind
    stage_failures_total: CounterVec,

    /// Stage duration in seconds
    stage_duration_seconds: HistogramVec,

    span_events_sent_total: Counter,
    span_events_failed_total: Counter,
    span_events_dropped_total: Counter,
}

impl QaMetrics {
    /// Create the metrics and register them with the provided registry
    pub fn new(registry: &Registry) -> Result<Self> {
        let exchanges_total = CounterVec::new(
            Opts::new("exchanges_total", "Total number of answered questions by outcome")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;

        let stage_failures_total = CounterVec::new(
            Opts::new(
                "stage_failures_total",
                "Total number of pipeline stage failures",
            )
            .namespace(NAMESPACE),
            &["stage", "kind"],
        )?;

        let stage_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "stage_duration_seconds",
                "Pipeline stage duration in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["stage"],
        )?;

        let span_events_sent_total = Counter::with_opts(
            Opts::new(
                "span_events_sent_total",
                "Span events delivered to the tracing backend",
            )
            .namespace(NAMESPACE),
        )?;

        let span_events_failed_total = Counter::with_opts(
            Opts::new(
                "span_events_failed_total",
                "Span events the tracing backend did not accept",
            )
            .namespace(NAMESPACE),
        )?;

        let span_events_dropped_total = Counter::with_opts(
            Opts::new(
                "span_events_dropped_total",
                "Span events dropped because the queue was full",
            )
            .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(exchanges_total.clone()))?;
        registry.register(Box::new(stage_failures_total.clone()))?;
        registry.register(Box::new(stage_duration_seconds.clone()))?;
        registry.register(Box::new(span_events_sent_total.clone()))?;
        registry.register(Box::new(span_events_failed_total.clone()))?;
        registry.register(Box::new(span_events_dropped_total.clone()))?;

        Ok(Self {
            exchanges_total,
            stage_failures_total,
            stage_duration_seconds,
            span_events_sent_total,
            span_events_failed_total,
            span_events_dropped_total,
        })
    }

    /// Record an answered (or failed) question
    pub fn record_exchange(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.exchanges_total.with_label_values(&[outcome]).inc();
    }

    pub fn exchanges(&self, success: bool) -> f64 {
        let outcome = if success { "success" } else { "failure" };
        self.exchanges_total.with_label_values(&[outcome]).get()
    }

    /// Record a stage failure
    pub fn record_stage_failure(&self, stage: &str, kind: &str) {
        self.stage_failures_total
            .with_label_values(&[stage, kind])
            .inc();
    }

    pub fn stage_failures(&self, stage: &str, kind: &str) -> f64 {
        self.stage_failures_total
            .with_label_values(&[stage, kind])
            .get()
    }

    /// Observe a stage duration
    pub fn observe_stage(&self, stage: &str, duration_secs: f64) {
        self.stage_duration_seconds
            .with_label_values(&[stage])
            .observe(duration_secs);
    }

    /// Start a stage timer (records the duration on drop)
    pub fn start_stage_timer(&self, stage: &str) -> StageTimer<'_> {
        StageTimer {
            start: Instant::now(),
            stage: stage.to_string(),
            metrics: self,
        }
    }

    pub fn record_span_sent(&self) {
        self.span_events_sent_total.inc();
    }

    pub fn record_span_failed(&self) {
        self.span_events_failed_total.inc();
    }

    pub fn record_span_dropped(&self) {
        self.span_events_dropped_total.inc();
    }

    pub fn span_events_sent(&self) -> f64 {
        self.span_events_sent_total.get()
    }

    pub fn span_events_failed(&self) -> f64 {
        self.span_events_failed_total.get()
    }

    pub fn span_events_dropped(&self) -> f64 {
        self.span_events_dropped_total.get()
    }
}

/// RAII guard for timing a stage
pub struct StageTimer<'a> {
    start: Instant,
    stage: String,
    metrics: &'a QaMetrics,
}

impl<'a> StageTimer<'a> {
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl<'a> Drop for StageTimer<'a> {
    fn drop(&mut self) {
        self.metrics
            .observe_stage(&self.stage, self.start.elapsed().as_secs_f64());
    }
}

/// Registry owning the QA metrics
pub struct QaMetricsRegistry {
    registry: Arc<Registry>,
    metrics: Arc<QaMetrics>,
}

impl QaMetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create with an existing Prometheus registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let metrics = Arc::new(QaMetrics::new(&registry)?);
        Ok(Self { registry, metrics })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> Arc<QaMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Gather all metrics in Prometheus format
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| TelemetryError::MetricsError(prometheus::Error::Msg(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_metrics() -> QaMetrics {
        QaMetrics::new(&Registry::new()).unwrap()
    }

    #[test]
    fn test_record_exchange() {
        let metrics = create_test_metrics();

        metrics.record_exchange(true);
        metrics.record_exchange(true);
        metrics.record_exchange(false);

        assert_eq!(metrics.exchanges(true), 2.0);
        assert_eq!(metrics.exchanges(false), 1.0);
    }

    #[test]
    fn test_stage_failures() {
        let metrics = create_test_metrics();

        metrics.record_stage_failure("document_search", "search");
        assert_eq!(metrics.stage_failures("document_search", "search"), 1.0);
        assert_eq!(metrics.stage_failures("answer_generation", "generation"), 0.0);
    }

    #[test]
    fn test_stage_timer() {
        let metrics = create_test_metrics();
        {
            let timer = metrics.start_stage_timer("company_extraction");
            std::thread::sleep(std::time::Duration::from_millis(5));
            assert!(timer.elapsed_secs() > 0.0);
        }

        let count = metrics
            .stage_duration_seconds
            .with_label_values(&["company_extraction"])
            .get_sample_count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_span_event_counters() {
        let metrics = create_test_metrics();

        metrics.record_span_sent();
        metrics.record_span_sent();
        metrics.record_span_failed();
        metrics.record_span_dropped();

        assert_eq!(metrics.span_events_sent(), 2.0);
        assert_eq!(metrics.span_events_failed(), 1.0);
        assert_eq!(metrics.span_events_dropped(), 1.0);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        QaMetrics::new(&registry).unwrap();
        assert!(QaMetrics::new(&registry).is_err());
    }

    #[test]
    fn test_encode_text() {
        let registry = QaMetricsRegistry::new().unwrap();
        registry.metrics().record_exchange(true);

        let text = registry.encode_text().unwrap();
        assert!(text.contains("finqa_exchanges_total"));
        assert!(text.contains("outcome=\"success\""));
    }
}
