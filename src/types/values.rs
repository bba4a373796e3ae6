//! Lenient conversions for upstream JSON values.
//!
//! Both services are loose about types: numbers arrive as JSON numbers, numeric strings, empty
//! strings or not at all, and dates/times arrive as strings or integers.

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

/// A number, or `None` for null, empty or non-numeric values.
pub(crate) fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Ground-truth irradiance: an empty string means "no sunshine recorded" and is stored as `0`,
/// while a missing or null value stays missing.
pub(crate) fn irradiance_or_zero(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        other => number(Some(other)),
    }
}

/// Text form of a string or number value.
pub(crate) fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A `YYYYMMDD` date given as a string or integer; `YYYY-MM-DD` is accepted too.
pub(crate) fn compact_date(value: Option<&Value>) -> Option<NaiveDate> {
    let raw = text(value)?;
    NaiveDate::parse_from_str(&raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(&raw, "%Y-%m-%d"))
        .ok()
}

/// An `HHMM` time given as an integer (`900`) or string (`"0900"`).
pub(crate) fn hhmm(value: Option<&Value>) -> Option<NaiveTime> {
    let raw = text(value)?;
    let padded = format!("{:0>4}", raw);
    NaiveTime::parse_from_str(&padded, "%H%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_accepts_numbers_and_numeric_strings() {
        assert_eq!(number(Some(&json!(1.5))), Some(1.5));
        assert_eq!(number(Some(&json!("2.25"))), Some(2.25));
        assert_eq!(number(Some(&json!(""))), None);
        assert_eq!(number(Some(&json!("n/a"))), None);
        assert_eq!(number(Some(&Value::Null)), None);
        assert_eq!(number(None), None);
    }

    #[test]
    fn test_empty_irradiance_becomes_zero_but_null_stays_missing() {
        assert_eq!(irradiance_or_zero(Some(&json!(""))), Some(0.0));
        assert_eq!(irradiance_or_zero(Some(&json!("  "))), Some(0.0));
        assert_eq!(irradiance_or_zero(Some(&json!("0.87"))), Some(0.87));
        assert_eq!(irradiance_or_zero(Some(&Value::Null)), None);
        assert_eq!(irradiance_or_zero(None), None);
    }

    #[test]
    fn test_dates_and_times_from_strings_or_integers() {
        let expected = NaiveDate::from_ymd_opt(2024, 7, 12);
        assert_eq!(compact_date(Some(&json!("20240712"))), expected);
        assert_eq!(compact_date(Some(&json!(20240712))), expected);
        assert_eq!(compact_date(Some(&json!("2024-07-12"))), expected);
        assert_eq!(hhmm(Some(&json!(900))), NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(hhmm(Some(&json!("1000"))), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(hhmm(Some(&json!(0))), NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(hhmm(Some(&json!("2500"))), None);
    }
}
