//! # Vault Audit Exporter
//!
//! Streaming Prometheus exporter for `HashiCorp Vault` audit device
//! logs. Vault's socket audit device ships one JSON event per line
//! over TCP; this daemon ingests that stream, correlates responses to
//! requests by request ID, and exposes derived metrics for scraping:
//!
//! - `vaultaudit_events_requests_total{operation,path,error}`
//! - `vaultaudit_events_responses_total{operation,path,error}`
//! - `vaultaudit_events_response_duration_seconds{operation,path,error}`
//! - `vaultaudit_cache_timestamp_cache_entries_total`
//!
//! Request timestamps are held in a TTL-bounded cache so unmatched
//! requests cannot grow memory without bound; responses arriving after
//! the TTL are still counted, just without a latency observation.
//!
//! ## Architecture
//!
//! - [`audit`] - Audit event decoding and classification
//! - [`cache`] - Expiring request timestamp cache
//! - [`metrics`] - Prometheus series and exposition
//! - [`processor`] - Event-to-metric state machine
//! - [`server`] - TCP listener, connection handling, worker queue
//! - [`http`] - `/metrics` and `/healthz` endpoints
//! - [`utils`] - Timestamp parsing helpers
//!
//! ## Example Usage
//!
//! ```bash
//! vault-audit-exporter --audit-addr 0.0.0.0:9090 --http-addr 0.0.0.0:8080
//! ```
//!
//! Point a Vault socket audit device at port 9090 and scrape port
//! 8080.

pub mod audit;
pub mod cache;
pub mod http;
pub mod metrics;
pub mod processor;
pub mod server;
pub mod utils;
