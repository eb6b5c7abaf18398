use option_clock::{KeyedFetcher, MarketError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_fan_in_produces_exactly_one_upstream_call() {
    let fetcher = Arc::new(KeyedFetcher::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let fetcher = Arc::clone(&fetcher);
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            fetcher
                .fetch("spot:NIFTY", 30, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    Ok(json!({"lp": 24100.0, "prev_close_price": 24050.0}))
                })
                .await
        }));
    }

    for handle in handles {
        let payload = handle.await.unwrap().unwrap();
        assert_eq!(payload["lp"], json!(24100.0));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_boundary_serves_then_refetches_once() {
    let fetcher = KeyedFetcher::new();
    let calls = AtomicUsize::new(0);

    let produce = |calls: &AtomicUsize| -> option_clock::MarketResult<serde_json::Value> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!("indices-payload"))
    };

    // t0: miss, one fetch
    fetcher
        .fetch("nse:indices", 30, || async { produce(&calls) })
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // t0 + 29s: still fresh, no new fetch
    tokio::time::advance(Duration::from_secs(29)).await;
    fetcher
        .fetch("nse:indices", 30, || async { produce(&calls) })
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // t0 + 30s: stale, exactly one refetch
    tokio::time::advance(Duration::from_secs(1)).await;
    fetcher
        .fetch("nse:indices", 30, || async { produce(&calls) })
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shared_failure_reaches_every_waiter() {
    let fetcher = Arc::new(KeyedFetcher::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let fetcher = Arc::clone(&fetcher);
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            fetcher
                .fetch("optquotes:NIFTY:2026-02-12", 30, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    Err(MarketError::UpstreamUnavailable("502 from broker".to_string()))
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(
            handle.await.unwrap(),
            Err(MarketError::UpstreamUnavailable("502 from broker".to_string()))
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_keys_are_independent() {
    let fetcher = Arc::new(KeyedFetcher::new());

    let slow = {
        let fetcher = Arc::clone(&fetcher);
        tokio::spawn(async move {
            fetcher
                .fetch("slow", 30, || async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(json!("slow"))
                })
                .await
        })
    };

    // A different key resolves without waiting on the slow one.
    let fast = fetcher.fetch("fast", 30, || async { Ok(json!("fast")) }).await;
    assert_eq!(fast, Ok(json!("fast")));
    assert_eq!(slow.await.unwrap(), Ok(json!("slow")));
}
