//! TTL-bounded request timestamp cache.
//!
//! Correlating a response to its request means remembering when every
//! in-flight request was logged. Requests that never get a response
//! would pin that memory forever, so every entry carries its own
//! expiry deadline and a background sweeper evicts stale entries.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Concurrent map from request ID to request timestamp.
///
/// Cloning is cheap and all clones share the same entries. Reads and
/// writes lock only the DashMap shard holding the key, so distinct
/// IDs never contend.
#[derive(Clone)]
pub struct TimestampCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl TimestampCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Insert a request timestamp, silently overwriting any earlier
    /// entry for the same ID (latest request wins).
    pub fn put(&self, id: &str, timestamp: &str) {
        self.entries.insert(
            id.to_string(),
            CacheEntry {
                value: timestamp.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Look up a request timestamp.
    ///
    /// A pure read: it never refreshes the entry's deadline. Entries
    /// past their deadline are treated as absent even if the sweeper
    /// has not removed them yet.
    pub fn get(&self, id: &str) -> Option<String> {
        let entry = self.entries.get(id)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Number of unexpired entries.
    pub fn live_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    /// Remove all expired entries, returning how many were evicted.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    /// Spawn a background task that sweeps expired entries at a fixed
    /// interval for the life of the process.
    pub fn start_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tick.tick().await;
                let evicted = cache.sweep();
                if evicted > 0 {
                    debug!(evicted, "evicted expired timestamp cache entries");
                }
            }
        })
    }
}
