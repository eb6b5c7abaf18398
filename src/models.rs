use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// -----------------------------------------------
// ASSEMBLED OPTION CHAIN (display-ready)
// -----------------------------------------------

/// Which field of the spot quote actually supplied the price.
/// Anything other than `Live` means the market is likely closed and the
/// number may be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpotSource {
    Live,
    PreviousClose,
    ClosePrice,
}

/// Which upstream supplied the per-strike quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuoteSource {
    Broker,
    ExchangeFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteFields {
    pub last_price: f64,
    pub volume: f64,
    pub change: f64,
    pub percent_change: f64,
    pub open_interest: f64,
    pub open_interest_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionStrike {
    pub strike_price: f64,
    pub call_identifier: String,
    pub put_identifier: String,
    pub call: Option<QuoteFields>,
    pub put: Option<QuoteFields>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainResult {
    pub symbol: String,
    pub spot_price: f64,
    pub spot_source: SpotSource,
    pub prev_close: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub expiry: NaiveDate,
    pub upcoming_expiries: Vec<NaiveDate>,
    pub strikes: Vec<OptionStrike>,
    pub quote_source: QuoteSource,
    pub total_call_oi: f64,
    pub total_put_oi: f64,
    pub pcr: f64,
    pub sentiment: String,
    pub max_pain_strike: f64,
    pub highest_call_oi_strike: f64,
    pub highest_put_oi_strike: f64,
}

// -----------------------------------------------
// FYERS QUOTE API WIRE FORMAT
// -----------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FyersQuotesResponse {
    pub s: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub d: Vec<FyersQuote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FyersQuote {
    /// Full symbol, e.g. "NSE:NIFTY50-INDEX".
    pub n: String,
    #[serde(default)]
    pub v: FyersQuoteValues,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FyersQuoteValues {
    /// Last traded price; 0 when the market is closed.
    #[serde(default)]
    pub lp: f64,
    #[serde(default)]
    pub prev_close_price: f64,
    #[serde(default)]
    pub close_price: f64,
    /// Open interest.
    #[serde(default)]
    pub oi: f64,
    /// Previous-day open interest.
    #[serde(default)]
    pub pdoi: f64,
    #[serde(default)]
    pub vol_traded_today: f64,
    /// Absolute change.
    #[serde(default)]
    pub ch: f64,
    /// Percent change.
    #[serde(default)]
    pub chp: f64,
}

// -----------------------------------------------
// NSE OPTION CHAIN WIRE FORMAT (fallback source)
// -----------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NseOptionChain {
    pub records: NseRecords,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NseRecords {
    #[serde(rename = "underlyingValue", default)]
    pub underlying_value: f64,
    #[serde(rename = "expiryDates", default)]
    pub expiry_dates: Vec<String>,
    #[serde(default)]
    pub data: Vec<NseOptionRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NseOptionRow {
    #[serde(rename = "strikePrice")]
    pub strike_price: f64,
    #[serde(rename = "expiryDate", default)]
    pub expiry_date: String,
    #[serde(rename = "CE")]
    pub call: Option<NseOptionDetail>,
    #[serde(rename = "PE")]
    pub put: Option<NseOptionDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NseOptionDetail {
    #[serde(rename = "openInterest", default)]
    pub open_interest: f64,
    #[serde(rename = "changeinOpenInterest", default)]
    pub change_in_oi: f64,
    #[serde(rename = "totalTradedVolume", default)]
    pub volume: f64,
    #[serde(rename = "lastPrice", default)]
    pub last_price: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(rename = "pChange", default)]
    pub p_change: f64,
}

impl NseOptionDetail {
    pub fn to_quote_fields(&self) -> QuoteFields {
        QuoteFields {
            last_price: self.last_price,
            volume: self.volume,
            change: self.change,
            percent_change: self.p_change,
            open_interest: self.open_interest,
            open_interest_change: self.change_in_oi,
        }
    }
}

// -----------------------------------------------
// NSE INDEX SNAPSHOT WIRE FORMAT
// -----------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct NseAllIndices {
    #[serde(default)]
    pub data: Vec<NseIndexRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NseIndexRow {
    pub index: String,
    #[serde(default)]
    pub last: f64,
    #[serde(default)]
    pub variation: f64,
    #[serde(rename = "percentChange", default)]
    pub percent_change: f64,
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    #[serde(rename = "previousClose", default)]
    pub previous_close: f64,
}
