//! Prometheus metric series derived from audit events.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tracing::warn;

/// Namespace prefixed to every exported series.
pub const NAMESPACE: &str = "vaultaudit";

const EVENT_LABELS: &[&str] = &["operation", "path", "error"];

/// Owner of all exported metric state.
///
/// Built once at startup over a private registry. Series are created
/// lazily per label combination and live for the process lifetime;
/// label cardinality is whatever the audit stream produces.
pub struct AuditMetrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub responses_total: IntCounterVec,
    pub response_duration: HistogramVec,
    pub cache_entries: IntGauge,
}

impl AuditMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "requests_total",
                "Number of Vault requests recorded in the audit log. Partitioned by operation, path, and error.",
            )
            .namespace(NAMESPACE)
            .subsystem("events"),
            EVENT_LABELS,
        )?;

        let responses_total = IntCounterVec::new(
            Opts::new(
                "responses_total",
                "Number of Vault responses recorded in the audit log. Partitioned by operation, path, and error.",
            )
            .namespace(NAMESPACE)
            .subsystem("events"),
            EVENT_LABELS,
        )?;

        let response_duration = HistogramVec::new(
            HistogramOpts::new(
                "response_duration_seconds",
                "Latency of a Vault response. Partitioned by operation, path, and error.",
            )
            .namespace(NAMESPACE)
            .subsystem("events"),
            EVENT_LABELS,
        )?;

        let cache_entries = IntGauge::with_opts(
            Opts::new(
                "timestamp_cache_entries_total",
                "Number of request timestamp entries in the cache.",
            )
            .namespace(NAMESPACE)
            .subsystem("cache"),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(responses_total.clone()))?;
        registry.register(Box::new(response_duration.clone()))?;
        registry.register(Box::new(cache_entries.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            responses_total,
            response_duration,
            cache_entries,
        })
    }

    /// Count one request event.
    pub fn inc_requests(&self, labels: &[&str; 3]) {
        self.requests_total.with_label_values(labels).inc();
    }

    /// Count one response event.
    pub fn inc_responses(&self, labels: &[&str; 3]) {
        self.responses_total.with_label_values(labels).inc();
    }

    /// Record one request-to-response latency, in seconds. Negative
    /// values pass through unmodified (log clocks are not ours to fix).
    pub fn observe_latency(&self, labels: &[&str; 3], seconds: f64) {
        self.response_duration.with_label_values(labels).observe(seconds);
    }

    /// Set the timestamp cache size gauge.
    pub fn set_cache_size(&self, n: usize) {
        self.cache_entries.set(n as i64);
    }

    /// Render prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "error encoding metrics for exposition");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
