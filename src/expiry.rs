use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Weekday};

/// Next weekly expiry on `weekday` at or after `now`. When `now` is the
/// expiry weekday at or past the intraday cutoff, the contract has already
/// settled for the day and the following week's date is returned instead.
pub fn nearest_expiry(now: NaiveDateTime, weekday: Weekday, cutoff_hour: u32) -> NaiveDate {
    let today = now.date();
    let mut days_until = (weekday.num_days_from_monday() + 7
        - today.weekday().num_days_from_monday())
        % 7;
    if days_until == 0 && now.hour() >= cutoff_hour {
        days_until = 7;
    }
    today + Duration::days(days_until as i64)
}

/// The next `count` weekly expiry dates, first element per [`nearest_expiry`].
pub fn upcoming_expiries(
    now: NaiveDateTime,
    weekday: Weekday,
    cutoff_hour: u32,
    count: usize,
) -> Vec<NaiveDate> {
    let first = nearest_expiry(now, weekday, cutoff_hour);
    (0..count)
        .map(|i| first + Duration::days(7 * i as i64))
        .collect()
}
