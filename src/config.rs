use chrono::Weekday;
use std::collections::HashMap;
use std::time::Duration;

// -----------------------------------------------
// UPSTREAM ENDPOINTS
// -----------------------------------------------
pub const NSE_BASE_URL: &str = "https://www.nseindia.com";
pub const NSE_ALL_INDICES_URL: &str = "https://www.nseindia.com/api/allIndices";
pub const FYERS_QUOTES_URL: &str = "https://api-t1.fyers.in/data/quotes";

pub fn nse_option_chain_url(symbol: &str, is_index: bool) -> String {
    let endpoint = if is_index {
        "option-chain-indices"
    } else {
        "option-chain-equities"
    };
    format!(
        "{}/api/{}?symbol={}",
        NSE_BASE_URL,
        endpoint,
        urlencoding::encode(symbol)
    )
}

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                               AppleWebKit/537.36 (KHTML, like Gecko) \
                               Chrome/131.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-IN,en;q=0.9",
];

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

pub const HEADER_REFERER: &str = "https://www.nseindia.com/";
pub const HEADER_X_REQUESTED_WITH: &str = "XMLHttpRequest";
pub const HEADER_ACCEPT_HTML: &str = "text/html";

// -----------------------------------------------
// SESSION WARMUP
// -----------------------------------------------
pub const WARMUP_DELAY_MS: u64 = 200;

// -----------------------------------------------
// RETRY CONFIG (NSE only; Fyers failures fall through to the caller)
// -----------------------------------------------
pub const RETRY_BASE_DELAY_MS: u64 = 200;
pub const RETRY_FACTOR: u64 = 3;
pub const RETRY_MAX_DELAY_SECS: u64 = 5;
pub const RETRY_MAX_ATTEMPTS: usize = 5;

// -----------------------------------------------
// CACHE TTLS (seconds)
// -----------------------------------------------
pub const TTL_SPOT_QUOTE: u64 = 30;
pub const TTL_OPTION_QUOTES: u64 = 30;
pub const TTL_NSE_CHAIN: u64 = 30;
pub const TTL_INDICES: u64 = 30;

// -----------------------------------------------
// INDEX SNAPSHOT FILTER
// -----------------------------------------------
pub const KEY_INDICES: &[&str] = &[
    "NIFTY 50",
    "NIFTY BANK",
    "NIFTY NEXT 50",
    "NIFTY MIDCAP 50",
    "NIFTY IT",
    "NIFTY FINANCIAL SERVICES",
];

// -----------------------------------------------
// STATIC MARKET CONFIGURATION
// -----------------------------------------------

/// Per-deployment market configuration, injected at construction.
/// Owns the supported-underlyings map, the strike-step table, and the
/// expiry/batching constants the assembler consumes.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Underlying -> Fyers spot symbol (indices and F&O equities).
    pub spot_symbols: HashMap<String, String>,
    /// Underlying -> strike ladder step.
    pub strike_steps: HashMap<String, f64>,
    /// Strikes generated on each side of the ATM strike.
    pub strikes_per_side: i64,
    /// Upcoming expiry dates returned per chain.
    pub expiry_count: usize,
    /// Weekly expiry weekday for index/stock options.
    pub expiry_weekday: Weekday,
    /// Hour of day (local) after which today's expiry is no longer offered.
    pub expiry_cutoff_hour: u32,
    /// Broker batch-quote ceiling (symbols per call).
    pub quote_batch_size: usize,
    /// Fall back to the NSE option-chain endpoint when Fyers yields nothing.
    pub nse_fallback_enabled: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        let spot_symbols = [
            ("NIFTY", "NSE:NIFTY50-INDEX"),
            ("BANKNIFTY", "NSE:NIFTYBANK-INDEX"),
            ("FINNIFTY", "NSE:FINNIFTY-INDEX"),
            ("MIDCPNIFTY", "NSE:MIDCPNIFTY-INDEX"),
            ("RELIANCE", "NSE:RELIANCE-EQ"),
            ("HDFCBANK", "NSE:HDFCBANK-EQ"),
            ("INFY", "NSE:INFY-EQ"),
            ("TCS", "NSE:TCS-EQ"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let strike_steps = [
            ("NIFTY", 50.0),
            ("BANKNIFTY", 100.0),
            ("FINNIFTY", 50.0),
            ("MIDCPNIFTY", 25.0),
            ("RELIANCE", 20.0),
            ("HDFCBANK", 20.0),
            ("INFY", 20.0),
            ("TCS", 50.0),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();

        Self {
            spot_symbols,
            strike_steps,
            strikes_per_side: 15,
            expiry_count: 5,
            expiry_weekday: Weekday::Thu,
            expiry_cutoff_hour: 15,
            quote_batch_size: 50,
            nse_fallback_enabled: true,
        }
    }
}

impl MarketConfig {
    pub fn is_index(&self, symbol: &str) -> bool {
        self.spot_symbols
            .get(symbol)
            .map(|s| s.ends_with("-INDEX"))
            .unwrap_or(false)
    }
}

// -----------------------------------------------
// RUNTIME ENVIRONMENT
// -----------------------------------------------

pub fn get_execution_mode() -> String {
    std::env::var("OC_MODE").unwrap_or_else(|_| "server".to_string())
}

pub fn get_server_port() -> u16 {
    std::env::var("OC_PORT")
        .unwrap_or_else(|_| "3001".to_string())
        .parse::<u16>()
        .unwrap_or(3001)
}

pub fn get_single_symbol() -> String {
    std::env::var("OC_SYMBOL").unwrap_or_else(|_| "NIFTY".to_string())
}

pub fn get_single_expiry() -> Option<String> {
    std::env::var("OC_EXPIRY").ok()
}

pub fn get_fyers_client_id() -> Option<String> {
    std::env::var("FYERS_CLIENT_ID").ok()
}

pub fn get_fyers_access_token() -> Option<String> {
    std::env::var("FYERS_ACCESS_TOKEN").ok()
}
