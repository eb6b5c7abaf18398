use std::fmt;

/// Failure taxonomy for upstream market-data fetches.
///
/// `Clone` is required because a single in-flight fetch outcome is fanned out
/// to every waiter attached to it.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketError {
    /// Network error, timeout, non-success status, or a non-JSON body.
    UpstreamUnavailable(String),
    /// A well-formed response carrying no usable data (market closed,
    /// provider omitted fields, empty quote list).
    UpstreamEmpty(String),
    /// Requested underlying is not in the supported-symbols table.
    /// Never retried and never triggers the fallback chain.
    UnsupportedSymbol(String),
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MarketError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
            MarketError::UpstreamEmpty(msg) => write!(f, "Upstream returned no data: {}", msg),
            MarketError::UnsupportedSymbol(sym) => write!(f, "Unsupported symbol: {}", sym),
        }
    }
}

impl std::error::Error for MarketError {}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MarketError::UpstreamUnavailable(format!("timeout: {}", err))
        } else {
            MarketError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::UpstreamUnavailable(format!("malformed body: {}", err))
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
