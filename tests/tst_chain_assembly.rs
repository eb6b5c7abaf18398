use chrono::NaiveDate;
use option_clock::chain::{
    assemble_result, atm_strike, build_ladder, build_strikes, merge_exchange_rows,
};
use option_clock::models::{
    NseOptionChain, NseOptionDetail, NseOptionRow, NseRecords, QuoteSource, SpotSource,
};
use option_clock::symbols::{parse_option_symbol, OptionSide};
use option_clock::MarketError;

const UNDERLYINGS: &[&str] = &["NIFTY", "BANKNIFTY", "FINNIFTY", "MIDCPNIFTY", "DEMO"];

fn weekly_expiry() -> NaiveDate {
    // Non-terminal Thursday
    NaiveDate::from_ymd_opt(2026, 2, 12).unwrap()
}

#[test]
fn test_generated_identifiers_round_trip_through_the_parser() {
    let expiry = weekly_expiry();
    let ladder = build_ladder(atm_strike(1187.0, 50.0), 50.0, 3);
    let strikes = build_strikes("DEMO", expiry, &ladder);

    for s in &strikes {
        let (u, e, k, side) = parse_option_symbol(&s.call_identifier, UNDERLYINGS).unwrap();
        assert_eq!((u.as_str(), e, k, side), ("DEMO", expiry, s.strike_price, OptionSide::Call));

        let (u, e, k, side) = parse_option_symbol(&s.put_identifier, UNDERLYINGS).unwrap();
        assert_eq!((u.as_str(), e, k, side), ("DEMO", expiry, s.strike_price, OptionSide::Put));
    }
}

#[test]
fn test_demo_ladder_brackets_the_spot() {
    let ladder = build_ladder(atm_strike(1187.0, 50.0), 50.0, 15);
    assert!(ladder.contains(&1150.0));
    assert!(ladder.contains(&1200.0));
    assert!(!ladder.contains(&1187.0));
}

fn nse_detail(oi: f64, ltp: f64) -> NseOptionDetail {
    NseOptionDetail {
        open_interest: oi,
        change_in_oi: oi / 10.0,
        volume: 500.0,
        last_price: ltp,
        change: 1.25,
        p_change: 2.5,
    }
}

fn exchange_chain(expiry: NaiveDate, rows: Vec<(f64, Option<f64>, Option<f64>)>) -> NseOptionChain {
    let expiry_str = expiry.format("%d-%b-%Y").to_string();
    NseOptionChain {
        records: NseRecords {
            underlying_value: 24120.0,
            expiry_dates: vec![expiry_str.clone()],
            data: rows
                .into_iter()
                .map(|(strike, call_oi, put_oi)| NseOptionRow {
                    strike_price: strike,
                    expiry_date: expiry_str.clone(),
                    call: call_oi.map(|oi| nse_detail(oi, 150.0)),
                    put: put_oi.map(|oi| nse_detail(oi, 130.0)),
                })
                .collect(),
        },
    }
}

#[test]
fn test_exchange_fallback_assembles_with_provenance() {
    let expiry = weekly_expiry();
    let ladder = build_ladder(24100.0, 50.0, 2);
    let mut strikes = build_strikes("NIFTY", expiry, &ladder);

    let chain = exchange_chain(
        expiry,
        vec![
            (24050.0, Some(1200.0), Some(3000.0)),
            (24100.0, Some(2000.0), Some(2000.0)),
            (24150.0, Some(2800.0), Some(800.0)),
        ],
    );
    merge_exchange_rows(&mut strikes, &chain, expiry);

    let result = assemble_result(
        "NIFTY",
        chain.records.underlying_value,
        SpotSource::Live,
        chain.records.underlying_value,
        expiry,
        vec![expiry],
        strikes,
        QuoteSource::ExchangeFallback,
    )
    .unwrap();

    assert_eq!(result.quote_source, QuoteSource::ExchangeFallback);
    assert_eq!(result.total_call_oi, 6000.0);
    assert_eq!(result.total_put_oi, 5800.0);
    assert_eq!(result.pcr, 0.967);
    assert_eq!(result.highest_call_oi_strike, 24150.0);
    assert_eq!(result.highest_put_oi_strike, 24050.0);

    // Unquoted ladder edges stay absent, not zeroed.
    let edge = result
        .strikes
        .iter()
        .find(|s| s.strike_price == 24000.0)
        .unwrap();
    assert!(edge.call.is_none());
    assert!(edge.put.is_none());
}

#[test]
fn test_rows_of_other_expiries_are_ignored() {
    let expiry = weekly_expiry();
    let other_expiry = NaiveDate::from_ymd_opt(2026, 2, 19).unwrap();
    let mut strikes = build_strikes("NIFTY", expiry, &[24100.0]);

    let chain = exchange_chain(other_expiry, vec![(24100.0, Some(1000.0), Some(1000.0))]);
    merge_exchange_rows(&mut strikes, &chain, expiry);

    assert!(strikes[0].call.is_none());
    assert!(strikes[0].put.is_none());
}

#[test]
fn test_fully_unquoted_chain_reports_unavailable() {
    let expiry = weekly_expiry();
    let strikes = build_strikes("NIFTY", expiry, &[24000.0, 24050.0]);

    let err = assemble_result(
        "NIFTY",
        24120.0,
        SpotSource::PreviousClose,
        24120.0,
        expiry,
        vec![expiry],
        strikes,
        QuoteSource::Broker,
    )
    .unwrap_err();

    assert!(matches!(err, MarketError::UpstreamEmpty(_)));
}
