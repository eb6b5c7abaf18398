use crate::config;
use crate::error::{MarketError, MarketResult};
use crate::models::{FyersQuote, FyersQuotesResponse};
use reqwest::Client;
use tracing::warn;

/// Token-authenticated quote client for the Fyers data API.
///
/// The quotes endpoint accepts at most `quote_batch_size` symbols per call;
/// larger identifier lists are chunked here so callers never have to think
/// about the ceiling.
pub struct FyersClient {
    client: Client,
    auth_header: String,
}

impl FyersClient {
    pub fn new(client_id: &str, access_token: &str) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(config::HTTP_TIMEOUT)
            .build()
            .map_err(|e| MarketError::UpstreamUnavailable(format!("client build: {}", e)))?;

        Ok(Self {
            client,
            // Fyers expects "client_id:access_token" as the bearer value.
            auth_header: format!("{}:{}", client_id, access_token),
        })
    }

    /// One network call for one batch of symbols.
    async fn quotes_call(&self, symbols: &[String]) -> MarketResult<Vec<FyersQuote>> {
        let url = format!("{}?symbols={}", config::FYERS_QUOTES_URL, symbols.join(","));

        let res = self
            .client
            .get(&url)
            .header("Authorization", &self.auth_header)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(MarketError::UpstreamUnavailable(format!(
                "quotes returned {}: {}",
                status, preview
            )));
        }

        let parsed: FyersQuotesResponse = res
            .json()
            .await
            .map_err(|e| MarketError::UpstreamUnavailable(format!("quotes body: {}", e)))?;

        if parsed.s != "ok" {
            return Err(MarketError::UpstreamEmpty(format!(
                "quotes status '{}': {}",
                parsed.s,
                parsed.message.unwrap_or_default()
            )));
        }
        if parsed.d.is_empty() {
            return Err(MarketError::UpstreamEmpty("quotes carried no symbols".to_string()));
        }

        Ok(parsed.d)
    }

    /// Fetches quotes for an arbitrary identifier list, chunked at
    /// `batch_size`. Chunks that fail are logged and skipped; the call as a
    /// whole fails only when every chunk does.
    pub async fn fetch_quotes(
        &self,
        symbols: &[String],
        batch_size: usize,
    ) -> MarketResult<Vec<FyersQuote>> {
        if symbols.is_empty() {
            return Err(MarketError::UpstreamEmpty("no symbols requested".to_string()));
        }

        let calls = symbols.chunks(batch_size).map(|chunk| self.quotes_call(chunk));
        let outcomes = futures::future::join_all(calls).await;

        let mut all = Vec::with_capacity(symbols.len());
        let mut last_err = None;
        for outcome in outcomes {
            match outcome {
                Ok(mut quotes) => all.append(&mut quotes),
                Err(e) => {
                    warn!(error = %e, "quote batch failed");
                    last_err = Some(e);
                }
            }
        }

        if all.is_empty() {
            return Err(last_err
                .unwrap_or_else(|| MarketError::UpstreamEmpty("no quotes returned".to_string())));
        }
        Ok(all)
    }
}
