//! HTTP exposition: `/metrics` for Prometheus scrapes, `/healthz` for
//! liveness checks.

use crate::cache::TimestampCache;
use crate::metrics::AuditMetrics;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared state for the HTTP endpoints.
#[derive(Clone)]
pub struct AppState {
    pub cache: TimestampCache,
    pub metrics: Arc<AuditMetrics>,
}

/// Build the router with all HTTP routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serve the HTTP endpoints until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP server on {addr}"))?;
    info!(addr = %addr, "serving /metrics and /healthz");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Prometheus metrics endpoint handler.
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Liveness endpoint reporting the timestamp cache size.
async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "timestamp_cache_size": state.cache.live_count() }))
}
