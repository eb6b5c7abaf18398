use crate::config::{self, MarketConfig};
use crate::error::{MarketError, MarketResult};
use crate::expiry;
use crate::fetch::KeyedFetcher;
use crate::fyers_client::FyersClient;
use crate::models::{
    FyersQuote, FyersQuoteValues, NseIndexRow, NseOptionChain, OptionChainResult, OptionStrike,
    QuoteFields, QuoteSource, SpotSource,
};
use crate::nse_client::NseClient;
use crate::symbols::{format_option_symbol, OptionSide};
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

// -----------------------------------------------
// PURE ASSEMBLY HELPERS
// -----------------------------------------------

/// Fallback chain for the spot price: live last-traded price, then previous
/// close, then last close. The chosen source is recorded so consumers can
/// warn that a non-live number may be stale.
pub fn resolve_spot(v: &FyersQuoteValues) -> MarketResult<(f64, SpotSource)> {
    if v.lp != 0.0 {
        Ok((v.lp, SpotSource::Live))
    } else if v.prev_close_price != 0.0 {
        Ok((v.prev_close_price, SpotSource::PreviousClose))
    } else if v.close_price != 0.0 {
        Ok((v.close_price, SpotSource::ClosePrice))
    } else {
        Err(MarketError::UpstreamEmpty(
            "spot quote carried no price in any field".to_string(),
        ))
    }
}

/// Nearest ladder strike to the spot price.
pub fn atm_strike(spot: f64, step: f64) -> f64 {
    (spot / step).round() * step
}

/// Symmetric ladder of `2 * per_side + 1` strikes centred on the ATM strike.
/// Every value is a multiple of `step`; the sequence is strictly increasing.
pub fn build_ladder(atm: f64, step: f64, per_side: i64) -> Vec<f64> {
    (-per_side..=per_side).map(|i| atm + i as f64 * step).collect()
}

/// Skeleton strikes with deterministic call/put identifiers and no quotes.
pub fn build_strikes(underlying: &str, expiry: NaiveDate, ladder: &[f64]) -> Vec<OptionStrike> {
    ladder
        .iter()
        .map(|&strike| OptionStrike {
            strike_price: strike,
            call_identifier: format_option_symbol(underlying, expiry, strike, OptionSide::Call),
            put_identifier: format_option_symbol(underlying, expiry, strike, OptionSide::Put),
            call: None,
            put: None,
        })
        .collect()
}

fn quote_fields(v: &FyersQuoteValues) -> QuoteFields {
    QuoteFields {
        last_price: if v.lp != 0.0 { v.lp } else { v.prev_close_price },
        volume: v.vol_traded_today,
        change: v.ch,
        percent_change: v.chp,
        open_interest: v.oi,
        open_interest_change: v.oi - v.pdoi,
    }
}

/// Merges broker quotes onto the strike skeleton by identifier. Strikes the
/// broker did not quote keep `None`, never a zeroed stand-in.
pub fn merge_broker_quotes(strikes: &mut [OptionStrike], quotes: &[FyersQuote]) {
    let by_symbol: HashMap<&str, &FyersQuoteValues> =
        quotes.iter().map(|q| (q.n.as_str(), &q.v)).collect();

    for strike in strikes.iter_mut() {
        if let Some(v) = by_symbol.get(strike.call_identifier.as_str()) {
            strike.call = Some(quote_fields(v));
        }
        if let Some(v) = by_symbol.get(strike.put_identifier.as_str()) {
            strike.put = Some(quote_fields(v));
        }
    }
}

/// Merges exchange option-chain rows onto the skeleton by strike price,
/// restricted to rows of the requested expiry.
pub fn merge_exchange_rows(strikes: &mut [OptionStrike], chain: &NseOptionChain, expiry: NaiveDate) {
    let expiry_str = expiry.format("%d-%b-%Y").to_string();
    let mut by_strike: HashMap<i64, (Option<QuoteFields>, Option<QuoteFields>)> = HashMap::new();

    for row in &chain.records.data {
        if row.expiry_date != expiry_str {
            continue;
        }
        by_strike.insert(
            row.strike_price as i64,
            (
                row.call.as_ref().map(|d| d.to_quote_fields()),
                row.put.as_ref().map(|d| d.to_quote_fields()),
            ),
        );
    }

    for strike in strikes.iter_mut() {
        if let Some((call, put)) = by_strike.get(&(strike.strike_price as i64)) {
            strike.call = *call;
            strike.put = *put;
        }
    }
}

/// Aggregate open interest across strikes that actually carry it.
pub fn oi_totals(strikes: &[OptionStrike]) -> (f64, f64) {
    let call: f64 = strikes
        .iter()
        .filter_map(|s| s.call.as_ref())
        .map(|q| q.open_interest)
        .sum();
    let put: f64 = strikes
        .iter()
        .filter_map(|s| s.put.as_ref())
        .map(|q| q.open_interest)
        .sum();
    (call, put)
}

pub fn put_call_ratio(total_call_oi: f64, total_put_oi: f64) -> f64 {
    if total_call_oi > 0.0 {
        (total_put_oi / total_call_oi * 1000.0).round() / 1000.0
    } else {
        0.0
    }
}

pub fn pcr_sentiment(pcr: f64) -> &'static str {
    if pcr > 1.2 {
        "Bullish (High PCR)"
    } else if pcr < 0.8 && pcr > 0.0 {
        "Bearish (Low PCR)"
    } else {
        "Neutral"
    }
}

/// Max pain: the ladder strike at which total intrinsic pain across all open
/// contracts is minimal (most options expire worthless there).
pub fn max_pain(strikes: &[OptionStrike]) -> f64 {
    let mut min_pain = f64::INFINITY;
    let mut max_pain_strike = strikes
        .get(strikes.len() / 2)
        .map(|s| s.strike_price)
        .unwrap_or(0.0);

    for candidate in strikes {
        let settle = candidate.strike_price;
        let mut pain = 0.0;

        for s in strikes {
            if let Some(call) = &s.call {
                if settle > s.strike_price {
                    pain += (settle - s.strike_price) * call.open_interest;
                }
            }
            if let Some(put) = &s.put {
                if settle < s.strike_price {
                    pain += (s.strike_price - settle) * put.open_interest;
                }
            }
        }

        if pain < min_pain {
            min_pain = pain;
            max_pain_strike = settle;
        }
    }

    max_pain_strike
}

pub fn highest_oi_strikes(strikes: &[OptionStrike]) -> (f64, f64) {
    let mut call = (0.0, 0.0); // (strike, oi)
    let mut put = (0.0, 0.0);

    for s in strikes {
        if let Some(q) = &s.call {
            if q.open_interest > call.1 {
                call = (s.strike_price, q.open_interest);
            }
        }
        if let Some(q) = &s.put {
            if q.open_interest > put.1 {
                put = (s.strike_price, q.open_interest);
            }
        }
    }

    (call.0, put.0)
}

/// Final assembly. Refuses to emit a chain on which no strike carries a
/// single quote: that is "no data", not a table of legitimate zeros.
#[allow(clippy::too_many_arguments)]
pub fn assemble_result(
    symbol: &str,
    spot_price: f64,
    spot_source: SpotSource,
    prev_close: f64,
    expiry: NaiveDate,
    upcoming_expiries: Vec<NaiveDate>,
    strikes: Vec<OptionStrike>,
    quote_source: QuoteSource,
) -> MarketResult<OptionChainResult> {
    if strikes.iter().all(|s| s.call.is_none() && s.put.is_none()) {
        return Err(MarketError::UpstreamEmpty(format!(
            "no quotes for any strike of {} {}",
            symbol, expiry
        )));
    }

    let (total_call_oi, total_put_oi) = oi_totals(&strikes);
    let pcr = put_call_ratio(total_call_oi, total_put_oi);
    let (highest_call_oi_strike, highest_put_oi_strike) = highest_oi_strikes(&strikes);
    let price_change = spot_price - prev_close;
    let price_change_pct = if prev_close != 0.0 {
        price_change / prev_close * 100.0
    } else {
        0.0
    };

    Ok(OptionChainResult {
        symbol: symbol.to_string(),
        spot_price,
        spot_source,
        prev_close,
        price_change,
        price_change_pct,
        expiry,
        upcoming_expiries,
        max_pain_strike: max_pain(&strikes),
        highest_call_oi_strike,
        highest_put_oi_strike,
        total_call_oi,
        total_put_oi,
        pcr,
        sentiment: pcr_sentiment(pcr).to_string(),
        strikes,
        quote_source,
    })
}

// -----------------------------------------------
// ASSEMBLER SERVICE
// -----------------------------------------------

/// Produces display-ready option chains and index snapshots. All upstream
/// traffic goes through the cache + single-flight pipeline; the Fyers quote
/// API is the primary source with the NSE option-chain endpoint as fallback.
pub struct ChainAssembler {
    config: MarketConfig,
    fetcher: Arc<KeyedFetcher>,
    fyers: Option<FyersClient>,
    nse: NseClient,
}

impl ChainAssembler {
    pub fn new(
        config: MarketConfig,
        fetcher: Arc<KeyedFetcher>,
        fyers: Option<FyersClient>,
        nse: NseClient,
    ) -> Self {
        Self {
            config,
            fetcher,
            fyers,
            nse,
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Upcoming weekly expiries for a supported underlying.
    pub fn expiries(&self, symbol: &str) -> MarketResult<Vec<NaiveDate>> {
        if !self.config.spot_symbols.contains_key(symbol) {
            return Err(MarketError::UnsupportedSymbol(symbol.to_string()));
        }
        Ok(expiry::upcoming_expiries(
            Local::now().naive_local(),
            self.config.expiry_weekday,
            self.config.expiry_cutoff_hour,
            self.config.expiry_count,
        ))
    }

    /// Spot quote for an underlying through the cache + gate.
    async fn fetch_spot(&self, symbol: &str, spot_symbol: &str) -> MarketResult<FyersQuoteValues> {
        let fyers = self.fyers.as_ref().ok_or_else(|| {
            MarketError::UpstreamUnavailable("no broker token configured".to_string())
        })?;

        let key = format!("spot:{}", symbol);
        let spot_symbols = vec![spot_symbol.to_string()];
        let batch_size = self.config.quote_batch_size;

        let payload = self
            .fetcher
            .fetch(&key, config::TTL_SPOT_QUOTE, || async {
                let quotes = fyers.fetch_quotes(&spot_symbols, batch_size).await?;
                let first = quotes.into_iter().next().ok_or_else(|| {
                    MarketError::UpstreamEmpty("spot quote missing from response".to_string())
                })?;
                Ok(serde_json::to_value(first.v)?)
            })
            .await?;

        Ok(serde_json::from_value(payload)?)
    }

    /// Batched option quotes for one underlying/expiry through cache + gate.
    async fn fetch_option_quotes(
        &self,
        symbol: &str,
        expiry: NaiveDate,
        identifiers: Vec<String>,
    ) -> MarketResult<Vec<FyersQuote>> {
        let fyers = self.fyers.as_ref().ok_or_else(|| {
            MarketError::UpstreamUnavailable("no broker token configured".to_string())
        })?;

        let key = format!("optquotes:{}:{}", symbol, expiry);
        let batch_size = self.config.quote_batch_size;

        let payload = self
            .fetcher
            .fetch(&key, config::TTL_OPTION_QUOTES, || async {
                let quotes = fyers.fetch_quotes(&identifiers, batch_size).await?;
                Ok(serde_json::to_value(quotes)?)
            })
            .await?;

        Ok(serde_json::from_value(payload)?)
    }

    /// Full exchange option chain for fallback, through cache + gate.
    async fn fetch_exchange_chain(&self, symbol: &str) -> MarketResult<NseOptionChain> {
        let key = format!("nsechain:{}", symbol);
        let is_index = self.config.is_index(symbol);

        let payload = self
            .fetcher
            .fetch(&key, config::TTL_NSE_CHAIN, || async {
                let chain = self.nse.fetch_option_chain(symbol, is_index).await?;
                Ok(serde_json::to_value(chain)?)
            })
            .await?;

        Ok(serde_json::from_value(payload)?)
    }

    /// Builds the chain for `symbol`, optionally pinned to a specific expiry
    /// from the upcoming set.
    pub async fn build_chain(
        &self,
        symbol: &str,
        expiry_override: Option<NaiveDate>,
    ) -> MarketResult<OptionChainResult> {
        let spot_symbol = self
            .config
            .spot_symbols
            .get(symbol)
            .ok_or_else(|| MarketError::UnsupportedSymbol(symbol.to_string()))?
            .clone();
        let step = *self
            .config
            .strike_steps
            .get(symbol)
            .ok_or_else(|| MarketError::UnsupportedSymbol(symbol.to_string()))?;

        let now = Local::now().naive_local();
        let upcoming = expiry::upcoming_expiries(
            now,
            self.config.expiry_weekday,
            self.config.expiry_cutoff_hour,
            self.config.expiry_count,
        );
        let expiry = expiry_override.unwrap_or(upcoming[0]);

        // Primary path: broker spot + batched option quotes.
        let primary = self.build_from_broker(symbol, &spot_symbol, step, expiry, &upcoming).await;
        let primary_err = match primary {
            Ok(result) => return Ok(result),
            Err(e @ MarketError::UnsupportedSymbol(_)) => return Err(e),
            Err(e) => e,
        };

        if !self.config.nse_fallback_enabled {
            return Err(primary_err);
        }
        warn!(symbol, error = %primary_err, "broker chain failed, falling back to exchange");

        self.build_from_exchange(symbol, step, expiry, upcoming).await
    }

    async fn build_from_broker(
        &self,
        symbol: &str,
        spot_symbol: &str,
        step: f64,
        expiry: NaiveDate,
        upcoming: &[NaiveDate],
    ) -> MarketResult<OptionChainResult> {
        let spot_values = self.fetch_spot(symbol, spot_symbol).await?;
        let (spot_price, spot_source) = resolve_spot(&spot_values)?;
        let prev_close = if spot_values.prev_close_price != 0.0 {
            spot_values.prev_close_price
        } else {
            spot_price
        };

        let ladder = build_ladder(atm_strike(spot_price, step), step, self.config.strikes_per_side);
        let mut strikes = build_strikes(symbol, expiry, &ladder);

        let identifiers: Vec<String> = strikes
            .iter()
            .flat_map(|s| [s.call_identifier.clone(), s.put_identifier.clone()])
            .collect();
        info!(
            symbol,
            %expiry,
            count = identifiers.len(),
            "fetching option quotes from broker"
        );

        let quotes = self.fetch_option_quotes(symbol, expiry, identifiers).await?;
        merge_broker_quotes(&mut strikes, &quotes);

        assemble_result(
            symbol,
            spot_price,
            spot_source,
            prev_close,
            expiry,
            upcoming.to_vec(),
            strikes,
            QuoteSource::Broker,
        )
    }

    async fn build_from_exchange(
        &self,
        symbol: &str,
        step: f64,
        expiry: NaiveDate,
        upcoming: Vec<NaiveDate>,
    ) -> MarketResult<OptionChainResult> {
        let chain = self.fetch_exchange_chain(symbol).await?;

        let spot_price = chain.records.underlying_value;
        if spot_price == 0.0 {
            return Err(MarketError::UpstreamEmpty(format!(
                "exchange chain for {} carried no underlying value",
                symbol
            )));
        }

        let ladder = build_ladder(atm_strike(spot_price, step), step, self.config.strikes_per_side);
        let mut strikes = build_strikes(symbol, expiry, &ladder);
        merge_exchange_rows(&mut strikes, &chain, expiry);

        assemble_result(
            symbol,
            spot_price,
            SpotSource::Live,
            spot_price,
            expiry,
            upcoming,
            strikes,
            QuoteSource::ExchangeFallback,
        )
    }

    /// Key-index snapshot (NSE allIndices, filtered), cached.
    pub async fn key_indices(&self) -> MarketResult<Vec<NseIndexRow>> {
        let payload = self
            .fetcher
            .fetch("nse:indices", config::TTL_INDICES, || async {
                let rows = self.nse.fetch_key_indices().await?;
                Ok(serde_json::to_value(rows)?)
            })
            .await?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Raw batched quote passthrough for arbitrary Fyers symbols.
    pub async fn raw_quotes(&self, symbols: Vec<String>) -> MarketResult<Vec<FyersQuote>> {
        let fyers = self.fyers.as_ref().ok_or_else(|| {
            MarketError::UpstreamUnavailable("no broker token configured".to_string())
        })?;

        let key = format!("quotes:{}", symbols.join(","));
        let batch_size = self.config.quote_batch_size;

        let payload = self
            .fetcher
            .fetch(&key, config::TTL_SPOT_QUOTE, || async {
                let quotes = fyers.fetch_quotes(&symbols, batch_size).await?;
                Ok(serde_json::to_value(quotes)?)
            })
            .await?;

        Ok(serde_json::from_value(payload)?)
    }

    pub async fn cache_stats(&self) -> crate::cache::CacheStats {
        self.fetcher.cache_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(lp: f64, prev: f64, close: f64) -> FyersQuoteValues {
        FyersQuoteValues {
            lp,
            prev_close_price: prev,
            close_price: close,
            ..Default::default()
        }
    }

    #[test]
    fn test_spot_falls_back_to_previous_close() {
        let (price, source) = resolve_spot(&values(0.0, 185.40, 184.0)).unwrap();
        assert_eq!(price, 185.40);
        assert_eq!(source, SpotSource::PreviousClose);
    }

    #[test]
    fn test_spot_prefers_live_price() {
        let (price, source) = resolve_spot(&values(186.1, 185.40, 184.0)).unwrap();
        assert_eq!(price, 186.1);
        assert_eq!(source, SpotSource::Live);
    }

    #[test]
    fn test_spot_last_resort_is_close_price() {
        let (price, source) = resolve_spot(&values(0.0, 0.0, 184.0)).unwrap();
        assert_eq!(price, 184.0);
        assert_eq!(source, SpotSource::ClosePrice);
    }

    #[test]
    fn test_spot_with_no_price_is_empty_not_zero() {
        let err = resolve_spot(&values(0.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, MarketError::UpstreamEmpty(_)));
    }

    #[test]
    fn test_ladder_is_step_aligned_around_spot() {
        let ladder = build_ladder(atm_strike(1187.0, 50.0), 50.0, 15);
        assert_eq!(ladder.len(), 31);
        assert!(ladder.contains(&1150.0));
        assert!(ladder.contains(&1200.0));
        assert!(!ladder.contains(&1187.0));
        for pair in ladder.windows(2) {
            assert_eq!(pair[1] - pair[0], 50.0);
        }
        for strike in &ladder {
            assert_eq!(strike % 50.0, 0.0);
        }
    }

    fn strike(k: f64, call_oi: Option<f64>, put_oi: Option<f64>) -> OptionStrike {
        let quote = |oi: f64| QuoteFields {
            last_price: 10.0,
            volume: 100.0,
            change: 0.5,
            percent_change: 5.0,
            open_interest: oi,
            open_interest_change: 0.0,
        };
        OptionStrike {
            strike_price: k,
            call_identifier: format!("NSE:DEMO26212{}CE", k as i64),
            put_identifier: format!("NSE:DEMO26212{}PE", k as i64),
            call: call_oi.map(quote),
            put: put_oi.map(quote),
        }
    }

    #[test]
    fn test_pcr_over_quoted_strikes() {
        let strikes = vec![
            strike(1100.0, Some(100.0), Some(300.0)),
            strike(1150.0, Some(200.0), None),
            strike(1200.0, None, Some(150.0)),
        ];
        let (call, put) = oi_totals(&strikes);
        assert_eq!(call, 300.0);
        assert_eq!(put, 450.0);
        assert_eq!(put_call_ratio(call, put), 1.5);
    }

    #[test]
    fn test_pcr_with_no_call_oi_is_zero() {
        assert_eq!(put_call_ratio(0.0, 500.0), 0.0);
    }

    #[test]
    fn test_sentiment_bands() {
        assert_eq!(pcr_sentiment(1.5), "Bullish (High PCR)");
        assert_eq!(pcr_sentiment(0.5), "Bearish (Low PCR)");
        assert_eq!(pcr_sentiment(1.0), "Neutral");
    }

    #[test]
    fn test_max_pain_picks_minimal_intrinsic_pain() {
        // Hand-computed totals:
        //   settle 1100: 50*10 + 100*2000            = 200500
        //   settle 1150: 50*1000 + 50*2000           = 150000
        //   settle 1200: 100*1000 + 50*10            = 100500  <- minimum
        // The heavy put OI at 1200 expires worthless there, so pain bottoms
        // out at 1200 despite the call OI below it.
        let strikes = vec![
            strike(1100.0, Some(1000.0), None),
            strike(1150.0, Some(10.0), Some(10.0)),
            strike(1200.0, None, Some(2000.0)),
        ];
        assert_eq!(max_pain(&strikes), 1200.0);
    }

    #[test]
    fn test_highest_oi_strikes() {
        let strikes = vec![
            strike(1100.0, Some(100.0), Some(900.0)),
            strike(1150.0, Some(700.0), Some(50.0)),
            strike(1200.0, Some(300.0), Some(200.0)),
        ];
        assert_eq!(highest_oi_strikes(&strikes), (1150.0, 1100.0));
    }

    #[test]
    fn test_unquoted_chain_is_unavailable_not_zeroed() {
        let expiry = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();
        let strikes = build_strikes("NIFTY", expiry, &[24000.0, 24050.0, 24100.0]);
        let err = assemble_result(
            "NIFTY",
            24100.0,
            SpotSource::Live,
            24050.0,
            expiry,
            vec![expiry],
            strikes,
            QuoteSource::Broker,
        )
        .unwrap_err();
        assert!(matches!(err, MarketError::UpstreamEmpty(_)));
    }

    #[test]
    fn test_merge_broker_quotes_by_identifier() {
        let expiry = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();
        let mut strikes = build_strikes("NIFTY", expiry, &[24000.0, 24050.0]);

        let quotes = vec![FyersQuote {
            n: strikes[0].call_identifier.clone(),
            v: FyersQuoteValues {
                lp: 120.5,
                oi: 5000.0,
                pdoi: 4200.0,
                vol_traded_today: 99.0,
                ..Default::default()
            },
        }];
        merge_broker_quotes(&mut strikes, &quotes);

        let call = strikes[0].call.as_ref().unwrap();
        assert_eq!(call.last_price, 120.5);
        assert_eq!(call.open_interest_change, 800.0);
        assert!(strikes[0].put.is_none());
        assert!(strikes[1].call.is_none());
    }
}
