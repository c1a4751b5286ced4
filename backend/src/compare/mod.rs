//! Value equivalence between the relational and the document side.
//!
//! Two steps, always in this order and identically for both sides:
//!
//! 1. [`canonicalize`] rewrites any string that parses as a date/time to
//!    `YYYY-MM-DDTHH:MM:SS`.
//! 2. [`equal`] compares numerically when both values are numeric
//!    (numbers, or strings that parse as numbers), and by display string
//!    otherwise.
//!
//! The comparison is loose on purpose: the relational side carries typed
//! columns while the document carries whatever JSON the service emits.
//! Domain recoding (e.g. `M` → `Male`) is not done here; see
//! [`crate::mapping::Operation`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Canonical timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Accepted naive date-time layouts (`%.f` also accepts "no fraction").
const DATETIME_LAYOUTS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Rewrite a date/time string to its canonical form; other values are
/// returned unchanged.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::String(s) => match canonical_timestamp(s) {
            Some(ts) => Value::String(ts),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Parse a timestamp string and format it as `YYYY-MM-DDTHH:MM:SS`.
///
/// Values with an offset are converted to UTC, the same instant a
/// `TIMESTAMPTZ` column decodes to. Fractions are truncated and bare dates
/// placed at midnight.
pub fn canonical_timestamp(raw: &str) -> Option<String> {
    let s = raw.trim();
    // Cheap reject: everything we accept starts with YYYY-
    if s.len() < 10 || s.as_bytes().get(4) != Some(&b'-') {
        return None;
    }

    parse_timestamp(s).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    for layout in DATETIME_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Numeric view of a value: JSON numbers, or strings holding a finite number.
///
/// Booleans are not numeric.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return None;
            }
            t.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

/// String form used for non-numeric comparison and for reports.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Loose equality: numeric if both sides are numeric, exact string otherwise.
pub fn equal(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => display_value(a) == display_value(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_float_equal() {
        assert!(equal(&json!(7), &json!(7.0)));
        assert!(equal(&json!(90.0), &json!(90)));
        assert!(equal(&json!(0), &json!(-0.0)));
        assert!(!equal(&json!(7), &json!(7.5)));
    }

    #[test]
    fn test_numeric_strings_are_numeric() {
        assert!(equal(&json!("2072"), &json!(2072)));
        assert!(equal(&json!(" 7 "), &json!(7.0)));
        assert!(equal(&json!("6698"), &json!("6698.0")));
        assert!(!equal(&json!("6698"), &json!(6699)));
    }

    #[test]
    fn test_non_numeric_falls_back_to_string() {
        assert!(equal(&json!("FW"), &json!("FW")));
        assert!(!equal(&json!("FW"), &json!("fw")));
        assert!(!equal(&json!("M"), &json!("Male")));
        // one numeric side is not enough
        assert!(!equal(&json!("7a"), &json!(7)));
        assert!(equal(&json!(true), &json!(true)));
        assert!(equal(&json!(true), &json!("true")));
        assert!(!equal(&json!(true), &json!(1)));
        assert!(equal(&Value::Null, &json!("null")));
    }

    #[test]
    fn test_non_finite_strings_are_not_numeric() {
        assert_eq!(as_number(&json!("NaN")), None);
        assert_eq!(as_number(&json!("inf")), None);
        assert_eq!(as_number(&json!("")), None);
        assert!(equal(&json!("NaN"), &json!("NaN")));
    }

    #[test]
    fn test_canonical_timestamp_layouts() {
        assert_eq!(canonical_timestamp("2021-06-20 16:00:00.00").as_deref(), Some("2021-06-20T16:00:00"));
        assert_eq!(canonical_timestamp("2021-06-20T16:00:00").as_deref(), Some("2021-06-20T16:00:00"));
        assert_eq!(canonical_timestamp("2021-06-20T16:00:00.123Z").as_deref(), Some("2021-06-20T16:00:00"));
        assert_eq!(canonical_timestamp("2021-06-20T16:00:00+00:00").as_deref(), Some("2021-06-20T16:00:00"));
        assert_eq!(canonical_timestamp("2021-06-20 16:00").as_deref(), Some("2021-06-20T16:00:00"));
        assert_eq!(canonical_timestamp("2020-01-01").as_deref(), Some("2020-01-01T00:00:00"));
    }

    #[test]
    fn test_non_timestamps_untouched() {
        assert_eq!(canonical_timestamp("Premier League"), None);
        assert_eq!(canonical_timestamp("2020"), None);
        assert_eq!(canonical_timestamp("2020-13-45"), None);
        assert_eq!(canonicalize(&json!(2072)), json!(2072));
        assert_eq!(canonicalize(&json!("FW")), json!("FW"));
    }

    #[test]
    fn test_offsets_are_converted_to_utc() {
        assert_eq!(canonical_timestamp("2021-06-20T16:00:00+02:00").as_deref(), Some("2021-06-20T14:00:00"));
        assert_eq!(canonical_timestamp("2021-06-20T01:30:00-03:00").as_deref(), Some("2021-06-20T04:30:00"));
        assert_eq!(
            canonicalize(&json!("2021-06-20T16:00:00+02:00")),
            canonicalize(&json!("2021-06-20T14:00:00Z"))
        );
    }

    #[test]
    fn test_layouts_compare_equal_once_canonical() {
        let same = |a: Value, b: Value| equal(&canonicalize(&a), &canonicalize(&b));
        assert!(same(json!("2021-06-20 16:00:00.00"), json!("2021-06-20T16:00:00")));
        assert!(same(json!("2020-01-01"), json!("2020-01-01T00:00:00")));
        assert!(!same(json!("2021-06-20 16:00:00"), json!("2021-06-20T17:00:00")));
    }
}
