use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// One cached upstream payload. Entries past their TTL are treated as absent
/// and overwritten by the next successful fetch; nothing is ever returned
/// stale.
#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) < self.ttl
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub keys: Vec<String>,
}

/// TTL cache for raw upstream payloads. The key space is a small fixed set of
/// logical endpoints, so there is no eviction beyond overwrite-on-refresh.
#[derive(Default)]
pub struct RawCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl RawCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the payload for `key` if present and within its TTL.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.is_fresh(Instant::now()))
            .map(|e| e.payload.clone())
    }

    pub async fn put(&self, key: &str, payload: Value, ttl_seconds: u64) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                fetched_at: Instant::now(),
                ttl: Duration::from_secs(ttl_seconds),
            },
        );
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys.truncate(20);
        CacheStats {
            entries: entries.len(),
            keys,
        }
    }
}
