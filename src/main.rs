use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use vault_audit_exporter::cache::TimestampCache;
use vault_audit_exporter::http::{self, AppState};
use vault_audit_exporter::metrics::AuditMetrics;
use vault_audit_exporter::processor::EventProcessor;
use vault_audit_exporter::server::{self, AuditNetwork, Dispatcher, GAUGE_REFRESH_INTERVAL};

#[derive(Parser, Debug)]
#[command(name = "vault-audit-exporter")]
#[command(about = "Prometheus exporter for Vault audit device logs", long_about = None)]
#[command(version)]
struct Cli {
    /// Network to listen for audit log connections on
    #[arg(long, value_enum, default_value = "tcp")]
    audit_network: AuditNetwork,

    /// Address to listen for audit log connections on (host:port for
    /// tcp, a filesystem path for unix)
    #[arg(long, default_value = "0.0.0.0:9090")]
    audit_addr: String,

    /// Address to bind the HTTP server (/metrics, /healthz) to
    #[arg(long, default_value = "0.0.0.0:8080")]
    http_addr: SocketAddr,

    /// Seconds to cache request timestamps for calculating latency
    #[arg(long, default_value_t = 300)]
    cache_ttl_secs: u64,

    /// Interval in seconds at which expired cache entries are evicted
    #[arg(long, default_value_t = 60)]
    cache_cleanup_secs: u64,

    /// Log level (overridden by RUST_LOG if set)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "vault-audit-exporter starting"
    );

    let cache = TimestampCache::new(Duration::from_secs(cli.cache_ttl_secs));
    let metrics = Arc::new(AuditMetrics::new()?);

    cache.start_sweeper(Duration::from_secs(cli.cache_cleanup_secs));
    server::start_gauge_refresher(cache.clone(), Arc::clone(&metrics), GAUGE_REFRESH_INTERVAL);

    let state = AppState {
        cache: cache.clone(),
        metrics: Arc::clone(&metrics),
    };
    let http_addr = cli.http_addr;
    tokio::spawn(async move {
        if let Err(e) = http::serve(http_addr, state).await {
            error!(error = %e, "HTTP server failed");
            std::process::exit(1);
        }
    });

    let processor = EventProcessor::new(cache, metrics);
    let dispatcher = Dispatcher::start(processor);
    server::run(cli.audit_network, &cli.audit_addr, dispatcher).await
}
