use crate::error::{AnalyticsError, Result};
use chrono::{Datelike, Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .checked_sub_days(Days::new(1))
        .unwrap()
}

/// Month key in the form used by the cost store, e.g. "2025-03".
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn month_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// Ordinal week of the year: `ceil((date - Jan 1) / 7 days)`, clamped to >= 1.
/// This is a simple ordinal scheme, not ISO-8601 week numbering, so weeks do
/// not align with calendar weekdays across year boundaries.
pub fn ordinal_week(date: NaiveDate) -> u32 {
    date.ordinal0() / 7 + 1
}

/// Trend bucket label for the week containing `date`. The year is part of the
/// label so buckets from different years never collide.
pub fn week_label(date: NaiveDate) -> String {
    format!("Week {}, {}", ordinal_week(date), date.year())
}

/// Parses a "YYYY-MM" cost period key into its inclusive date bounds.
pub fn parse_period_key(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let start_str = format!("{}-01", period.trim());
    let start = NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
        AnalyticsError::Validation(format!(
            "Invalid period format: {}. Expected YYYY-MM",
            period
        ))
    })?;

    Ok((start, last_day_of_month(start.year(), start.month())))
}

/// Every "YYYY-MM" key overlapped by the inclusive range [start, end].
pub fn month_keys_in_range(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let mut keys = Vec::new();
    let mut current = NaiveDate::from_ymd_opt(start.year(), start.month(), 1).unwrap();

    while current <= end {
        keys.push(month_key(current));
        current = last_day_of_month(current.year(), current.month())
            .checked_add_days(Days::new(1))
            .unwrap();
    }

    keys
}

/// Inclusive-on-both-ends range check. An absent bound does not constrain.
pub fn in_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    if let Some(start) = start {
        if date < start {
            return false;
        }
    }
    if let Some(end) = end {
        if date > end {
            return false;
        }
    }
    true
}
