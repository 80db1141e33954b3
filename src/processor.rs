//! Turns classified audit events into cache updates and metrics.

use crate::audit::types::{AuditEntry, EventKind};
use crate::cache::TimestampCache;
use crate::metrics::AuditMetrics;
use crate::utils::time::parse_timestamp;
use std::sync::Arc;
use tracing::{debug, warn};

/// Processes decoded audit events.
///
/// Requests and responses are handled independently: a response is
/// always counted, whether or not its request was ever seen. Only the
/// latency observation depends on a successful correlation.
#[derive(Clone)]
pub struct EventProcessor {
    cache: TimestampCache,
    metrics: Arc<AuditMetrics>,
}

impl EventProcessor {
    pub fn new(cache: TimestampCache, metrics: Arc<AuditMetrics>) -> Self {
        Self { cache, metrics }
    }

    /// Record metrics for one audit event.
    pub fn process(&self, entry: AuditEntry) {
        match entry.kind() {
            EventKind::Request => {
                if let Some(id) = entry.request_id() {
                    self.cache.put(id, &entry.time);
                } else {
                    debug!("request event without an id, skipping timestamp cache");
                }
                self.metrics.inc_requests(&entry.labels());
            }
            EventKind::Response => {
                self.observe_latency(&entry);
                self.metrics.inc_responses(&entry.labels());
            }
            EventKind::Unknown => {
                warn!(event_type = %entry.entry_type, "unknown audit event type");
            }
        }
    }

    /// Compute and record the latency between a response and its
    /// cached request. Any failure here skips the observation only;
    /// the caller still counts the response.
    fn observe_latency(&self, entry: &AuditEntry) {
        let Some(id) = entry.request_id() else {
            debug!("response event without an id, skipping latency");
            return;
        };
        let Some(request_ts) = self.cache.get(id) else {
            debug!(request_id = id, "prior request not found for response");
            return;
        };

        let request_time = match parse_timestamp(&request_ts) {
            Ok(t) => t,
            Err(e) => {
                warn!(timestamp = %request_ts, error = %e, "error parsing request timestamp");
                return;
            }
        };
        let response_time = match parse_timestamp(&entry.time) {
            Ok(t) => t,
            Err(e) => {
                warn!(timestamp = %entry.time, error = %e, "error parsing response timestamp");
                return;
            }
        };

        let elapsed = response_time.signed_duration_since(request_time);
        let seconds = match elapsed.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => elapsed.num_seconds() as f64,
        };
        self.metrics.observe_latency(&entry.labels(), seconds);
    }
}
