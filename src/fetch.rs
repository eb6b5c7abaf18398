use crate::cache::{CacheStats, RawCache};
use crate::error::MarketResult;
use crate::singleflight::FlightGate;
use serde_json::Value;
use std::future::Future;
use tracing::debug;

/// Cache-then-gate fetch pipeline for raw upstream payloads.
///
/// A request first consults the TTL cache; on a miss it goes through the
/// single-flight gate so that an arbitrary inbound fan-in produces at most
/// one outstanding upstream call per key. Successful payloads are written
/// back to the cache; failures are propagated uncached.
#[derive(Default)]
pub struct KeyedFetcher {
    cache: RawCache,
    gate: FlightGate,
}

impl KeyedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch<F, Fut>(&self, key: &str, ttl_seconds: u64, producer: F) -> MarketResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MarketResult<Value>>,
    {
        if let Some(payload) = self.cache.get(key).await {
            debug!(key, "cache hit");
            return Ok(payload);
        }

        let payload = self.gate.join(key, producer).await?;
        self.cache.put(key, payload.clone(), ttl_seconds).await;
        Ok(payload)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
