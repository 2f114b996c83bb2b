//! Calendar Helpers
//!
//! All cycle boundaries are UTC calendar months.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// Minute past midnight on the 1st at which the monthly draw fires
pub const DRAW_MINUTE: u32 = 5;

fn utc_at(date: NaiveDate, hour: u32, minute: u32) -> CoreResult<DateTime<Utc>> {
    date.and_hms_opt(hour, minute, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CoreError::InvalidDate(format!("{} {:02}:{:02}", date, hour, minute)))
}

fn first_of(year: i32, month: u32) -> CoreResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CoreError::InvalidDate(format!("{}-{:02}", year, month)))
}

/// `YYYY-MM` of the given instant
pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Midnight on the 1st of the instant's month
pub fn start_of_month(at: DateTime<Utc>) -> CoreResult<DateTime<Utc>> {
    utc_at(first_of(at.year(), at.month())?, 0, 0)
}

/// Month key of the cycle that a draw at `now` settles
pub fn previous_month_key(now: DateTime<Utc>) -> CoreResult<String> {
    let (year, month) = if now.month() == 1 {
        (now.year() - 1, 12)
    } else {
        (now.year(), now.month() - 1)
    };
    Ok(first_of(year, month)?.format("%Y-%m").to_string())
}

/// Next monthly draw: the 1st of the following month at 00:05
pub fn next_draw_time(now: DateTime<Utc>) -> CoreResult<DateTime<Utc>> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    utc_at(first_of(year, month)?, 0, DRAW_MINUTE)
}

/// Next occurrence of `hour:minute`, today if still ahead, otherwise tomorrow
pub fn next_time_of_day(now: DateTime<Utc>, hour: u32, minute: u32) -> CoreResult<DateTime<Utc>> {
    let today = utc_at(now.date_naive(), hour, minute)?;
    if now > today {
        Ok(today + ChronoDuration::days(1))
    } else {
        Ok(today)
    }
}

/// Time left until `target`, zero if already passed
pub fn until(now: DateTime<Utc>, target: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}
