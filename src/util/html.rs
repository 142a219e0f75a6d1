//! HTML-style micro-grammars for numbers and dates.
//!
//! Constraint bounds arrive as strings in the compact PropertyValueSpecification
//! form (`min=2024-01-01`, `max=10`). These helpers decide whether such a
//! string is usable as a number bound, a date bound, or neither.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d*)?$").expect("number grammar is valid"));

static DATE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-(0?[1-9]|1[0-2])-{0,3}\d").expect("date grammar is valid"));

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a string using the HTML number grammar.
///
/// Only the integer part is kept; `"3.9"` parses as `3.0`.
pub fn parse_number(text: &str) -> Option<f64> {
    if !NUMBER_RE.is_match(text) {
        return None;
    }
    let integer = text.split('.').next().unwrap_or(text);
    integer.parse::<f64>().ok()
}

/// Parse a non-negative length (`maxlength=`, `minlength=`).
pub fn parse_length(text: &str) -> Option<usize> {
    let value = parse_number(text)?;
    if value < 0.0 {
        return None;
    }
    Some(value as usize)
}

/// Parse a string as an HTML-style date or date-time.
///
/// The text must start with a `year-month-day` component; naive forms are
/// interpreted as UTC.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if !DATE_PREFIX_RE.is_match(text) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_number_grammar() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("-7"), Some(-7.0));
        assert_eq!(parse_number("3.9"), Some(3.0));
        assert_eq!(parse_number("10."), Some(10.0));
        assert_eq!(parse_number(".5"), None);
        assert_eq!(parse_number("1e3"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_length_rejects_negative() {
        assert_eq!(parse_length("100"), Some(100));
        assert_eq!(parse_length("-1"), None);
    }

    #[test]
    fn test_date_only() {
        let dt = parse_date("2024-03-05").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_date_time_forms() {
        let dt = parse_date("2024-03-05T10:30").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (10, 30));

        let dt = parse_date("2024-03-05T10:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_date_rejects_non_dates() {
        assert!(parse_date("42").is_none());
        assert!(parse_date("2024-13-01").is_none());
        assert!(parse_date("2024-02-30").is_none());
        assert!(parse_date("hello").is_none());
    }
}
