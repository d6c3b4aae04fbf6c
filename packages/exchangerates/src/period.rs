//! Period label normalization.
//!
//! Every observation is stamped with the last calendar day of the period it
//! covers, so annual, quarterly and monthly series share one date convention.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::{RatesError, Result};

/// `YYYY-Mn` / `YYYY-Mnn`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static MONTHLY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-M(\d{1,2})$").expect("valid regex"));

/// `YYYY-Qn`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static QUARTERLY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-Q([1-4])$").expect("valid regex"));

/// `YYYY-MM`, used by older agency endpoints.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LEGACY_MONTHLY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("valid regex"));

/// `YYYY`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ANNUAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})$").expect("valid regex"));

/// Parse a period label into the last day of the period.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use imf_exchangerates::period::parse_period;
///
/// assert_eq!(parse_period("2000-Q1").unwrap(), NaiveDate::from_ymd_opt(2000, 3, 31).unwrap());
/// assert!(parse_period("2000-W01").is_err());
/// ```
pub fn parse_period(label: &str) -> Result<NaiveDate> {
    let label = label.trim();
    let invalid = || RatesError::InvalidPeriod(label.to_string());

    let (year, month) = if let Some(caps) = MONTHLY_PATTERN.captures(label) {
        (caps[1].parse::<i32>(), caps[2].parse::<u32>().unwrap_or(0))
    } else if let Some(caps) = QUARTERLY_PATTERN.captures(label) {
        (caps[1].parse::<i32>(), caps[2].parse::<u32>().unwrap_or(0) * 3)
    } else if let Some(caps) = LEGACY_MONTHLY_PATTERN.captures(label) {
        (caps[1].parse::<i32>(), caps[2].parse::<u32>().unwrap_or(0))
    } else if ANNUAL_PATTERN.is_match(label) {
        (label.parse::<i32>(), 12)
    } else {
        return Err(invalid());
    };

    let year = year.map_err(|_| invalid())?;
    last_day_of_month(year, month).ok_or_else(invalid)
}

/// Normalize a period label to an ISO date string (`YYYY-MM-DD`).
///
/// # Examples
/// ```
/// use imf_exchangerates::period::normalize_date;
///
/// assert_eq!(normalize_date("1999-M01").unwrap(), "1999-01-31");
/// assert_eq!(normalize_date("1998").unwrap(), "1998-12-31");
/// ```
pub fn normalize_date(label: &str) -> Result<String> {
    Ok(parse_period(label)?.format("%Y-%m-%d").to_string())
}

/// Last calendar day of `month` in `year`, or `None` for an invalid month.
fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    next_month.pred_opt()
}
