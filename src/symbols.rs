use crate::error::{MarketError, MarketResult};
use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Fyers option symbol grammar. This is an external, versioned contract; the
/// encoder and parser below must stay inverses of each other (see the
/// round-trip tests) rather than being re-derived independently.
///
/// Monthly expiry (last Thursday of its month):
///   NSE:<UNDERLYING><YY><MMM><STRIKE><CE|PE>   e.g. NSE:NIFTY26FEB25000CE
/// Weekly expiry:
///   NSE:<UNDERLYING><YY><M><DD><STRIKE><CE|PE> e.g. NSE:NIFTY2621225000CE
/// where <M> is 1-9 for Jan-Sep and O/N/D for Oct/Nov/Dec.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSide {
    Call,
    Put,
}

impl OptionSide {
    pub fn suffix(self) -> &'static str {
        match self {
            OptionSide::Call => "CE",
            OptionSide::Put => "PE",
        }
    }
}

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

const WEEKLY_MONTH_CODES: [&str; 12] = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "O", "N", "D"];

/// Last Thursday of the month containing `date`.
fn last_thursday(year: i32, month: u32) -> NaiveDate {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid first-of-month");
    let last_day = first_of_next - Duration::days(1);
    let days_back = (last_day.weekday().num_days_from_monday() + 7
        - Weekday::Thu.num_days_from_monday())
        % 7;
    last_day - Duration::days(days_back as i64)
}

/// Whether `expiry` is the monthly contract date (last Thursday of its month).
pub fn is_monthly_expiry(expiry: NaiveDate) -> bool {
    expiry == last_thursday(expiry.year(), expiry.month())
}

pub fn format_option_symbol(
    underlying: &str,
    expiry: NaiveDate,
    strike: f64,
    side: OptionSide,
) -> String {
    let yy = expiry.year() % 100;
    let strike = strike as i64;

    if is_monthly_expiry(expiry) {
        let month = MONTH_NAMES[expiry.month0() as usize];
        format!("NSE:{}{:02}{}{}{}", underlying, yy, month, strike, side.suffix())
    } else {
        let code = WEEKLY_MONTH_CODES[expiry.month0() as usize];
        format!(
            "NSE:{}{:02}{}{:02}{}{}",
            underlying,
            yy,
            code,
            expiry.day(),
            strike,
            side.suffix()
        )
    }
}

/// Parses a symbol produced by [`format_option_symbol`] back into
/// (underlying, expiry, strike, side). `underlyings` is the supported table;
/// the longest matching name wins so e.g. "NIFTY" never shadows "FINNIFTY".
pub fn parse_option_symbol(
    symbol: &str,
    underlyings: &[&str],
) -> MarketResult<(String, NaiveDate, f64, OptionSide)> {
    let bad = || MarketError::UnsupportedSymbol(symbol.to_string());

    let body = symbol.strip_prefix("NSE:").ok_or_else(bad)?;

    let (body, side) = if let Some(b) = body.strip_suffix("CE") {
        (b, OptionSide::Call)
    } else if let Some(b) = body.strip_suffix("PE") {
        (b, OptionSide::Put)
    } else {
        return Err(bad());
    };

    let mut names: Vec<&str> = underlyings
        .iter()
        .copied()
        .filter(|u| body.starts_with(u))
        .collect();
    names.sort_by_key(|u| std::cmp::Reverse(u.len()));
    let underlying = *names.first().ok_or_else(bad)?;
    let rest = &body[underlying.len()..];

    if rest.len() < 3 {
        return Err(bad());
    }
    let yy: i32 = rest[..2].parse().map_err(|_| bad())?;
    let year = 2000 + yy;
    let rest = &rest[2..];

    // Monthly form carries a three-letter month name; weekly carries a
    // one-char month code followed by a two-digit day.
    if rest.len() >= 3 {
        if let Some(month) = MONTH_NAMES.iter().position(|m| rest.starts_with(m)) {
            let strike: f64 = rest[3..].parse().map_err(|_| bad())?;
            let expiry = last_thursday(year, month as u32 + 1);
            return Ok((underlying.to_string(), expiry, strike, side));
        }
    }

    let code = &rest[..1];
    let month = WEEKLY_MONTH_CODES
        .iter()
        .position(|c| *c == code)
        .ok_or_else(bad)? as u32
        + 1;
    let day: u32 = rest[1..3].parse().map_err(|_| bad())?;
    let strike: f64 = rest[3..].parse().map_err(|_| bad())?;
    let expiry = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad)?;
    Ok((underlying.to_string(), expiry, strike, side))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNDERLYINGS: &[&str] = &["NIFTY", "BANKNIFTY", "FINNIFTY", "MIDCPNIFTY", "RELIANCE"];

    #[test]
    fn test_monthly_symbol_format() {
        // 2026-02-26 is the last Thursday of Feb 2026
        let expiry = NaiveDate::from_ymd_opt(2026, 2, 26).unwrap();
        assert!(is_monthly_expiry(expiry));
        let sym = format_option_symbol("NIFTY", expiry, 25000.0, OptionSide::Call);
        assert_eq!(sym, "NSE:NIFTY26FEB25000CE");
    }

    #[test]
    fn test_weekly_symbol_format() {
        // 2026-02-12 is a non-terminal Thursday
        let expiry = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();
        assert!(!is_monthly_expiry(expiry));
        let sym = format_option_symbol("NIFTY", expiry, 25000.0, OptionSide::Put);
        assert_eq!(sym, "NSE:NIFTY2621225000PE");
    }

    #[test]
    fn test_round_trip_weekly_and_monthly() {
        let cases = [
            // weekly Jan
            NaiveDate::from_ymd_opt(2026, 1, 8).unwrap(),
            // weekly Oct (month code "O")
            NaiveDate::from_ymd_opt(2026, 10, 8).unwrap(),
            // weekly Dec (month code "D")
            NaiveDate::from_ymd_opt(2026, 12, 10).unwrap(),
            // monthly Nov (last Thursday)
            NaiveDate::from_ymd_opt(2026, 11, 26).unwrap(),
        ];

        for expiry in cases {
            for side in [OptionSide::Call, OptionSide::Put] {
                let sym = format_option_symbol("BANKNIFTY", expiry, 52100.0, side);
                let (u, e, k, s) = parse_option_symbol(&sym, UNDERLYINGS).unwrap();
                assert_eq!(u, "BANKNIFTY");
                assert_eq!(e, expiry);
                assert_eq!(k, 52100.0);
                assert_eq!(s, side);
            }
        }
    }

    #[test]
    fn test_longest_underlying_match_wins() {
        let expiry = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();
        let sym = format_option_symbol("FINNIFTY", expiry, 23500.0, OptionSide::Call);
        let (u, ..) = parse_option_symbol(&sym, UNDERLYINGS).unwrap();
        assert_eq!(u, "FINNIFTY");
    }

    #[test]
    fn test_unknown_symbol_is_rejected() {
        assert!(parse_option_symbol("NSE:WIPRO2621225000CE", UNDERLYINGS).is_err());
        assert!(parse_option_symbol("BSE:NIFTY2621225000CE", UNDERLYINGS).is_err());
        assert!(parse_option_symbol("NSE:NIFTY26212", UNDERLYINGS).is_err());
    }

    #[test]
    fn test_last_thursday() {
        assert_eq!(
            last_thursday(2026, 2),
            NaiveDate::from_ymd_opt(2026, 2, 26).unwrap()
        );
        assert_eq!(
            last_thursday(2025, 12),
            NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()
        );
    }
}
