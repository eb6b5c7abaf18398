use crate::config;
use crate::error::{MarketError, MarketResult};
use crate::models::{NseAllIndices, NseIndexRow, NseOptionChain};
use rand::{seq::SliceRandom, thread_rng};
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::debug;

// -----------------------------------------------
// CLIENT WRAPPER WITH SESSION STATE
// -----------------------------------------------
pub struct NseClient {
    client: Client,
    warmed_up: RwLock<bool>,
}

impl NseClient {
    pub fn new() -> MarketResult<Self> {
        Ok(Self {
            client: build_client()?,
            warmed_up: RwLock::new(false),
        })
    }

    /// Warm up the NSE session cookies (only once per client).
    async fn warmup_if_needed(&self) -> MarketResult<()> {
        if *self.warmed_up.read().await {
            return Ok(());
        }

        let mut warmed = self.warmed_up.write().await;
        if !*warmed {
            self.client
                .get(config::NSE_BASE_URL)
                .header(header::ACCEPT, config::HEADER_ACCEPT_HTML)
                .send()
                .await
                .map_err(|e| {
                    MarketError::UpstreamUnavailable(format!("session warmup: {}", e))
                })?;

            tokio::time::sleep(Duration::from_millis(config::WARMUP_DELAY_MS)).await;
            *warmed = true;
        }

        Ok(())
    }

    /// Generic JSON fetch with retry and body validation.
    async fn fetch_json(&self, url: &str) -> MarketResult<String> {
        self.warmup_if_needed().await?;

        let backoff = ExponentialBackoff::from_millis(config::RETRY_BASE_DELAY_MS)
            .factor(config::RETRY_FACTOR)
            .max_delay(Duration::from_secs(config::RETRY_MAX_DELAY_SECS))
            .take(config::RETRY_MAX_ATTEMPTS);

        Retry::spawn(backoff, || async {
            debug!(url, "NSE fetch");
            let res = self
                .client
                .get(url)
                .header("Referer", config::HEADER_REFERER)
                .header("X-Requested-With", config::HEADER_X_REQUESTED_WITH)
                .send()
                .await
                .map_err(MarketError::from)?;

            let status = res.status();

            if status.is_success() {
                let text = res.text().await.map_err(MarketError::from)?;

                // NSE serves an HTML block page when the session is rejected.
                let trimmed = text.trim();
                if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
                    let preview: String = text.chars().take(200).collect();
                    return Err(MarketError::UpstreamUnavailable(format!(
                        "non-JSON response: {}",
                        preview
                    )));
                }

                Ok(text)
            } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Err(MarketError::UpstreamUnavailable(format!(
                    "retryable status {}",
                    status
                )))
            } else {
                let body = res.text().await.unwrap_or_default();
                let preview: String = body.chars().take(200).collect();
                Err(MarketError::UpstreamUnavailable(format!(
                    "status {}: {}",
                    status, preview
                )))
            }
        })
        .await
    }

    /// Full option chain for an underlying from the exchange endpoint.
    pub async fn fetch_option_chain(
        &self,
        symbol: &str,
        is_index: bool,
    ) -> MarketResult<NseOptionChain> {
        let url = config::nse_option_chain_url(symbol, is_index);
        let text = self.fetch_json(&url).await?;

        let chain: NseOptionChain = serde_json::from_str(&text)?;
        if chain.records.data.is_empty() {
            return Err(MarketError::UpstreamEmpty(format!(
                "option chain for {} carried no rows",
                symbol
            )));
        }
        Ok(chain)
    }

    /// All-indices snapshot, filtered to the configured key indices.
    pub async fn fetch_key_indices(&self) -> MarketResult<Vec<NseIndexRow>> {
        let text = self.fetch_json(config::NSE_ALL_INDICES_URL).await?;
        let all: NseAllIndices = serde_json::from_str(&text)?;

        let mut rows: Vec<NseIndexRow> = all
            .data
            .into_iter()
            .filter(|row| config::KEY_INDICES.contains(&row.index.as_str()))
            .collect();
        rows.sort_by_key(|row| {
            config::KEY_INDICES
                .iter()
                .position(|k| *k == row.index)
                .unwrap_or(usize::MAX)
        });

        if rows.is_empty() {
            return Err(MarketError::UpstreamEmpty(
                "allIndices carried no known indices".to_string(),
            ));
        }
        Ok(rows)
    }
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
fn build_client() -> MarketResult<Client> {
    let mut headers = header::HeaderMap::new();

    // Rotating Accept-Language headers (fingerprint avoidance)
    let lang = config::ACCEPT_LANGUAGES
        .choose(&mut thread_rng())
        .copied()
        .unwrap_or("en-US,en;q=0.9");
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_str(lang)
            .map_err(|e| MarketError::UpstreamUnavailable(e.to_string()))?,
    );
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));

    Client::builder()
        .default_headers(headers)
        .cookie_store(true) // crucial for NSE
        .user_agent(config::USER_AGENT)
        .timeout(config::HTTP_TIMEOUT)
        .build()
        .map_err(|e| MarketError::UpstreamUnavailable(format!("client build: {}", e)))
}
