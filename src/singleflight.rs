use crate::error::{MarketError, MarketResult};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::debug;

type Outcome = MarketResult<Value>;

/// Coalesces concurrent fetches for the same key into a single upstream call.
///
/// The first caller to register for a key becomes the producer; everyone else
/// arriving before it settles attaches to the same outcome, success or
/// failure. Registrations are removed as soon as the flight settles, so a
/// failed key is immediately eligible for a fresh attempt. There is no
/// negative caching here.
#[derive(Default)]
pub struct FlightGate {
    inflight: Mutex<HashMap<String, watch::Receiver<Option<Outcome>>>>,
}

/// Removes the registration when the producing call unwinds, including when
/// the producing task is cancelled mid-flight. Waiters then observe a closed
/// channel instead of hanging on a key nobody is fetching.
struct FlightGuard<'a> {
    gate: &'a FlightGate,
    key: &'a str,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inflight) = self.gate.inflight.lock() {
            inflight.remove(self.key);
        }
    }
}

impl FlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `producer` at most once per key across all concurrent callers.
    pub async fn join<F, Fut>(&self, key: &str, producer: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        // Settle the registration while holding the lock, but keep every
        // await outside the guard's scope so the future stays `Send`.
        let registration = {
            let mut inflight = self
                .inflight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            match inflight.get(key) {
                Some(rx) => Err(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.to_string(), rx);
                    Ok(tx)
                }
            }
        };

        let tx = match registration {
            Err(mut rx) => {
                debug!(key, "attaching to in-flight fetch");
                let cancelled = || {
                    MarketError::UpstreamUnavailable(format!(
                        "in-flight fetch for '{}' was cancelled",
                        key
                    ))
                };
                return match rx.wait_for(|outcome| outcome.is_some()).await {
                    Ok(settled) => settled.clone().unwrap_or_else(|| Err(cancelled())),
                    // Producer task was dropped before settling.
                    Err(_) => Err(cancelled()),
                };
            }
            Ok(tx) => tx,
        };

        let guard = FlightGuard { gate: self, key };
        let outcome = producer().await;

        // Deregister before fan-out so late arrivals start a fresh flight
        // rather than observing a settled one.
        drop(guard);
        let _ = tx.send(Some(outcome.clone()));
        outcome
    }
}
