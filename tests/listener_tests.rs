//! Socket-level tests for the audit log listener: real TCP
//! connections carrying newline-delimited JSON events.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use vault_audit_exporter::cache::TimestampCache;
use vault_audit_exporter::metrics::AuditMetrics;
use vault_audit_exporter::processor::EventProcessor;
use vault_audit_exporter::server::{self, Dispatcher};

struct Harness {
    addr: SocketAddr,
    cache: TimestampCache,
    metrics: Arc<AuditMetrics>,
}

async fn start_listener() -> Harness {
    start_listener_with(server::IDLE_READ_TIMEOUT).await
}

async fn start_listener_with(idle_timeout: Duration) -> Harness {
    let cache = TimestampCache::new(Duration::from_secs(300));
    let metrics = Arc::new(AuditMetrics::new().unwrap());
    let processor = EventProcessor::new(cache.clone(), Arc::clone(&metrics));
    let dispatcher = Dispatcher::start(processor);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server::serve(listener, dispatcher, idle_timeout).await;
    });

    Harness {
        addr,
        cache,
        metrics,
    }
}

/// Poll until `cond` holds; event dispatch is asynchronous so counter
/// updates lag the socket writes.
async fn wait_for(cond: impl Fn() -> bool) {
    for _ in 0..250 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within 5s");
}

#[tokio::test]
async fn events_on_one_connection_update_metrics() {
    let harness = start_listener().await;

    let mut conn = TcpStream::connect(harness.addr).await.unwrap();
    conn.write_all(
        concat!(
            r#"{"type":"request","request":{"id":"abc","operation":"read","path":"secret/x"},"time":"2024-01-01T00:00:00Z"}"#,
            "\n",
            r#"{"type":"response","request":{"id":"abc","operation":"read","path":"secret/x"},"time":"2024-01-01T00:00:02Z","error":""}"#,
            "\n",
        )
        .as_bytes(),
    )
    .await
    .unwrap();

    let metrics = Arc::clone(&harness.metrics);
    let labels = ["read", "secret/x", ""];
    wait_for(move || metrics.responses_total.with_label_values(&labels).get() == 1).await;

    assert_eq!(
        harness
            .metrics
            .requests_total
            .with_label_values(&labels)
            .get(),
        1
    );
    let hist = harness
        .metrics
        .response_duration
        .with_label_values(&labels);
    assert_eq!(hist.get_sample_count(), 1);
    assert!((hist.get_sample_sum() - 2.0).abs() < 1e-9);
    assert_eq!(harness.cache.live_count(), 1);
}

#[tokio::test]
async fn malformed_line_does_not_close_the_connection() {
    let harness = start_listener().await;

    let mut conn = TcpStream::connect(harness.addr).await.unwrap();
    conn.write_all(b"this is not json\n").await.unwrap();
    conn.write_all(b"{\"type\": [broken\n").await.unwrap();
    conn.write_all(
        concat!(
            r#"{"type":"request","request":{"id":"ok-1","operation":"list","path":"secret/metadata/"},"time":"2024-01-01T00:00:00Z"}"#,
            "\n",
        )
        .as_bytes(),
    )
    .await
    .unwrap();

    let metrics = Arc::clone(&harness.metrics);
    let labels = ["list", "secret/metadata/", ""];
    wait_for(move || metrics.requests_total.with_label_values(&labels).get() == 1).await;
}

#[tokio::test]
async fn multiple_connections_are_served_concurrently() {
    let harness = start_listener().await;

    let mut first = TcpStream::connect(harness.addr).await.unwrap();
    let mut second = TcpStream::connect(harness.addr).await.unwrap();

    // The first connection stays open and silent while the second one
    // delivers events; a stalled client must not block others.
    second
        .write_all(
            concat!(
                r#"{"type":"request","request":{"id":"c2","operation":"update","path":"auth/token/create"},"time":"2024-01-01T00:00:00Z"}"#,
                "\n",
            )
            .as_bytes(),
        )
        .await
        .unwrap();

    let metrics = Arc::clone(&harness.metrics);
    let labels = ["update", "auth/token/create", ""];
    wait_for(move || metrics.requests_total.with_label_values(&labels).get() == 1).await;

    first
        .write_all(
            concat!(
                r#"{"type":"request","request":{"id":"c1","operation":"read","path":"secret/data/a"},"time":"2024-01-01T00:00:01Z"}"#,
                "\n",
            )
            .as_bytes(),
        )
        .await
        .unwrap();

    let metrics = Arc::clone(&harness.metrics);
    let labels = ["read", "secret/data/a", ""];
    wait_for(move || metrics.requests_total.with_label_values(&labels).get() == 1).await;
}

#[tokio::test]
async fn peer_close_after_events_still_processes_them() {
    let harness = start_listener().await;

    {
        let mut conn = TcpStream::connect(harness.addr).await.unwrap();
        conn.write_all(
            concat!(
                r#"{"type":"request","request":{"id":"eof","operation":"delete","path":"secret/gone"},"time":"2024-01-01T00:00:00Z"}"#,
                "\n",
            )
            .as_bytes(),
        )
        .await
        .unwrap();
        conn.shutdown().await.unwrap();
    }

    let metrics = Arc::clone(&harness.metrics);
    let labels = ["delete", "secret/gone", ""];
    wait_for(move || metrics.requests_total.with_label_values(&labels).get() == 1).await;
    assert_eq!(harness.cache.get("eof").as_deref(), Some("2024-01-01T00:00:00Z"));
}

#[tokio::test]
async fn silent_connection_is_closed_after_idle_deadline() {
    let harness = start_listener_with(Duration::from_millis(100)).await;

    let mut conn = TcpStream::connect(harness.addr).await.unwrap();
    conn.write_all(
        concat!(
            r#"{"type":"request","request":{"id":"idle","operation":"read","path":"secret/slow"},"time":"2024-01-01T00:00:00Z"}"#,
            "\n",
        )
        .as_bytes(),
    )
    .await
    .unwrap();

    let metrics = Arc::clone(&harness.metrics);
    let labels = ["read", "secret/slow", ""];
    wait_for(move || metrics.requests_total.with_label_values(&labels).get() == 1).await;

    // Go silent. The server drops the connection once the idle
    // deadline passes, which our read observes as EOF.
    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(Duration::from_secs(5), conn.read(&mut buf))
        .await
        .expect("server did not close the idle connection")
        .unwrap();
    assert_eq!(n, 0);

    // The event sent before the silence was still processed.
    assert_eq!(
        harness.cache.get("idle").as_deref(),
        Some("2024-01-01T00:00:00Z")
    );
}

#[cfg(unix)]
#[tokio::test]
async fn unix_socket_listener_receives_events() {
    use tokio::net::{UnixListener, UnixStream};

    let cache = TimestampCache::new(Duration::from_secs(300));
    let metrics = Arc::new(AuditMetrics::new().unwrap());
    let processor = EventProcessor::new(cache.clone(), Arc::clone(&metrics));
    let dispatcher = Dispatcher::start(processor);

    let path = std::env::temp_dir().join(format!(
        "vault-audit-exporter-test-{}.sock",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).unwrap();
    tokio::spawn(async move {
        let _ = server::serve_unix(listener, dispatcher, server::IDLE_READ_TIMEOUT).await;
    });

    let mut conn = UnixStream::connect(&path).await.unwrap();
    conn.write_all(
        concat!(
            r#"{"type":"request","request":{"id":"ux","operation":"read","path":"secret/ux"},"time":"2024-01-01T00:00:00Z"}"#,
            "\n",
        )
        .as_bytes(),
    )
    .await
    .unwrap();

    let metrics = Arc::clone(&metrics);
    let labels = ["read", "secret/ux", ""];
    wait_for(move || metrics.requests_total.with_label_values(&labels).get() == 1).await;
    assert_eq!(cache.get("ux").as_deref(), Some("2024-01-01T00:00:00Z"));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn gauge_refresher_tracks_cache_size() {
    let cache = TimestampCache::new(Duration::from_secs(300));
    let metrics = Arc::new(AuditMetrics::new().unwrap());
    server::start_gauge_refresher(
        cache.clone(),
        Arc::clone(&metrics),
        Duration::from_millis(20),
    );

    cache.put("g1", "2024-01-01T00:00:00Z");
    cache.put("g2", "2024-01-01T00:00:01Z");

    let metrics = Arc::clone(&metrics);
    wait_for(move || metrics.cache_entries.get() == 2).await;
}

#[tokio::test]
async fn empty_lines_are_skipped() {
    let harness = start_listener().await;

    let mut conn = TcpStream::connect(harness.addr).await.unwrap();
    conn.write_all(b"\n\n").await.unwrap();
    conn.write_all(
        concat!(
            r#"{"type":"request","request":{"id":"blank","operation":"read","path":"secret/b"},"time":"2024-01-01T00:00:00Z"}"#,
            "\n",
        )
        .as_bytes(),
    )
    .await
    .unwrap();

    let metrics = Arc::clone(&harness.metrics);
    let labels = ["read", "secret/b", ""];
    wait_for(move || metrics.requests_total.with_label_values(&labels).get() == 1).await;
}
