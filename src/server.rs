//! TCP/unix listener for audit device connections.
//!
//! Vault's socket audit device writes one JSON event per line over a
//! stream connection. The listener accepts any number of connections,
//! reads them line by line under an idle deadline, and hands decoded
//! events to a bounded worker queue so a slow correlation lookup can
//! never stall ingestion.

use crate::audit::types::AuditEntry;
use crate::cache::TimestampCache;
use crate::metrics::AuditMetrics;
use crate::processor::EventProcessor;
use anyhow::{Context, Result};
use clap::ValueEnum;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A connection that goes silent for longer than this is closed.
pub const IDLE_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the cache-size gauge is refreshed.
pub const GAUGE_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

const QUEUE_DEPTH: usize = 1024;
const WORKERS: usize = 4;

/// Network family for the audit listener, mirroring the socket audit
/// device's `socket_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuditNetwork {
    /// TCP listener; the address is `host:port`.
    Tcp,
    /// Unix domain socket; the address is a filesystem path.
    Unix,
}

/// Handle to the event worker pool.
///
/// Events are queued rather than spawned one task each, so a burst of
/// events holds at most `QUEUE_DEPTH` entries in flight.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<AuditEntry>,
}

impl Dispatcher {
    /// Spawn the worker pool and return a handle for queueing events.
    pub fn start(processor: EventProcessor) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let rx = Arc::new(Mutex::new(rx));
        for _ in 0..WORKERS {
            let rx = Arc::clone(&rx);
            let processor = processor.clone();
            tokio::spawn(async move {
                loop {
                    let entry = rx.lock().await.recv().await;
                    match entry {
                        Some(entry) => processor.process(entry),
                        None => break,
                    }
                }
            });
        }
        Self { tx }
    }

    /// Queue one decoded event for processing. Waits for queue space
    /// when full, which bounds memory under event bursts.
    pub async fn dispatch(&self, entry: AuditEntry) {
        if self.tx.send(entry).await.is_err() {
            warn!("event queue closed, dropping audit event");
        }
    }
}

/// Bind the audit listener on the configured network and serve it
/// forever.
///
/// A bind failure is fatal and propagated; everything after that is
/// connection-scoped and survivable.
pub async fn run(network: AuditNetwork, addr: &str, dispatcher: Dispatcher) -> Result<()> {
    match network {
        AuditNetwork::Tcp => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind audit listener on {addr}"))?;
            serve(listener, dispatcher, IDLE_READ_TIMEOUT).await
        }
        #[cfg(unix)]
        AuditNetwork::Unix => {
            let listener = UnixListener::bind(addr)
                .with_context(|| format!("failed to bind audit socket at {addr}"))?;
            serve_unix(listener, dispatcher, IDLE_READ_TIMEOUT).await
        }
        #[cfg(not(unix))]
        AuditNetwork::Unix => {
            anyhow::bail!("unix sockets are not supported on this platform")
        }
    }
}

/// Accept audit log connections forever on an already-bound TCP
/// listener.
///
/// Accept errors are logged and the loop continues; a stalled client
/// never blocks new accepts because each connection runs on its own
/// task.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Dispatcher,
    idle_timeout: Duration,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "listening for audit log connections");
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted audit log connection");
                tokio::spawn(handle_connection(
                    stream,
                    peer.to_string(),
                    dispatcher.clone(),
                    idle_timeout,
                ));
            }
            Err(e) => warn!(error = %e, "error accepting connection"),
        }
    }
}

/// Accept audit log connections forever on an already-bound unix
/// socket listener.
#[cfg(unix)]
pub async fn serve_unix(
    listener: UnixListener,
    dispatcher: Dispatcher,
    idle_timeout: Duration,
) -> Result<()> {
    info!("listening for audit log connections on unix socket");
    loop {
        match listener.accept().await {
            Ok((stream, _peer)) => {
                debug!("accepted audit log connection");
                tokio::spawn(handle_connection(
                    stream,
                    String::from("unix"),
                    dispatcher.clone(),
                    idle_timeout,
                ));
            }
            Err(e) => warn!(error = %e, "error accepting connection"),
        }
    }
}

/// Read newline-delimited audit events from one connection.
///
/// Decode failures are line-scoped: logged, skipped, and the loop
/// continues. The connection closes on idle timeout, read error, or
/// EOF, when the stream is dropped.
async fn handle_connection<S>(
    stream: S,
    peer: String,
    dispatcher: Dispatcher,
    idle_timeout: Duration,
) where
    S: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        let line = match timeout(idle_timeout, lines.next_line()).await {
            Err(_) => {
                debug!(peer = %peer, "connection idle, closing");
                break;
            }
            Ok(Err(e)) => {
                warn!(peer = %peer, error = %e, "error reading audit log connection");
                break;
            }
            Ok(Ok(None)) => {
                debug!(peer = %peer, "connection closed by peer");
                break;
            }
            Ok(Ok(Some(line))) => line,
        };

        if line.trim().is_empty() {
            continue;
        }
        match AuditEntry::from_line(&line) {
            Ok(entry) => dispatcher.dispatch(entry).await,
            Err(e) => warn!(peer = %peer, error = %e, "error decoding audit event"),
        }
    }
}

/// Spawn a task that keeps the cache-size gauge current for the life
/// of the process.
pub fn start_gauge_refresher(
    cache: TimestampCache,
    metrics: Arc<AuditMetrics>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            metrics.set_cache_size(cache.live_count());
        }
    })
}
