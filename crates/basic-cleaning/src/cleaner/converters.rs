//! Best-effort date-time conversion for text columns.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Type of every coerced date column.
pub fn coerced_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

/// Layouts that carry a time of day. `%.f` also matches no fraction.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

/// Date-only layouts, interpreted as midnight.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Textual spellings of a missing value.
const NULL_MARKERS: &[&str] = &["nan", "nat", "null", "none", "n/a", "na"];

/// Parse a free-form date or date-time string.
///
/// Time-zone aware inputs (RFC 3339) are converted to UTC. Returns `None`
/// for empty strings, missing-value markers and anything unparseable.
pub(crate) fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() || NULL_MARKERS.iter().any(|m| value.eq_ignore_ascii_case(m)) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Convert a series to [`coerced_dtype`].
///
/// - date-time series are returned unchanged, so the conversion is idempotent
/// - `Date` series are widened to midnight
/// - anything else is read as text and parsed with [`parse_datetime`];
///   values that do not parse become null
pub(crate) fn coerce_to_datetime(series: &Series) -> PolarsResult<Series> {
    match series.dtype() {
        DataType::Datetime(_, _) => Ok(series.clone()),
        DataType::Date => series.cast(&coerced_dtype()),
        DataType::Null => Ok(Series::full_null(
            series.name().clone(),
            series.len(),
            &coerced_dtype(),
        )),
        DataType::String => parse_string_series(series),
        _ => parse_string_series(&series.cast(&DataType::String)?),
    }
}

fn parse_string_series(series: &Series) -> PolarsResult<Series> {
    let str_series = series.str()?;
    let millis: Vec<Option<i64>> = str_series
        .into_iter()
        .map(|opt_val| {
            opt_val
                .and_then(parse_datetime)
                .map(|dt| dt.and_utc().timestamp_millis())
        })
        .collect();

    Series::new(series.name().clone(), millis).cast(&coerced_dtype())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn millis_at(series: &Series, idx: usize) -> Option<i64> {
        series.cast(&DataType::Int64).unwrap().i64().unwrap().get(idx)
    }

    // ========================================================================
    // parse_datetime() tests
    // ========================================================================

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(parse_datetime("2019-01-01"), Some(ymd_hms(2019, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_parse_datetime_layouts() {
        let expected = ymd_hms(2019, 7, 5, 13, 45, 10);
        assert_eq!(parse_datetime("2019-07-05 13:45:10"), Some(expected));
        assert_eq!(parse_datetime("2019-07-05T13:45:10"), Some(expected));
        assert_eq!(parse_datetime("2019/07/05 13:45:10"), Some(expected));
        assert_eq!(parse_datetime("07/05/2019 13:45:10"), Some(expected));
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let parsed = parse_datetime("2019-07-05 13:45:10.250").unwrap();
        assert_eq!(parsed.and_utc().timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_rfc3339_converts_to_utc() {
        assert_eq!(
            parse_datetime("2019-07-05T13:45:10+02:00"),
            Some(ymd_hms(2019, 7, 5, 11, 45, 10))
        );
    }

    #[test]
    fn test_parse_month_names_and_us_dates() {
        let expected = ymd_hms(2019, 5, 21, 0, 0, 0);
        assert_eq!(parse_datetime("May 21, 2019"), Some(expected));
        assert_eq!(parse_datetime("21 May 2019"), Some(expected));
        assert_eq!(parse_datetime("05/21/2019"), Some(expected));
        assert_eq!(parse_datetime("21.05.2019"), Some(expected));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse_datetime("  2019-01-01 "), Some(ymd_hms(2019, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for value in ["bad", "", "   ", "NaN", "NaT", "null", "2019-13-01", "2019-02-30", "12345"] {
            assert_eq!(parse_datetime(value), None, "{:?}", value);
        }
    }

    // ========================================================================
    // coerce_to_datetime() tests
    // ========================================================================

    #[test]
    fn test_coerce_string_series() {
        let series = Series::new(
            "last_review".into(),
            &[Some("2019-01-01"), Some("bad"), None],
        );
        let result = coerce_to_datetime(&series).unwrap();

        assert_eq!(result.dtype(), &coerced_dtype());
        assert_eq!(result.name().as_str(), "last_review");
        assert_eq!(
            millis_at(&result, 0),
            Some(ymd_hms(2019, 1, 1, 0, 0, 0).and_utc().timestamp_millis())
        );
        assert_eq!(millis_at(&result, 1), None);
        assert_eq!(millis_at(&result, 2), None);
    }

    #[test]
    fn test_coerce_is_idempotent() {
        let series = Series::new(
            "last_review".into(),
            &[Some("2019-05-21"), None, Some("2018-10-19 08:00:00")],
        );
        let once = coerce_to_datetime(&series).unwrap();
        let twice = coerce_to_datetime(&once).unwrap();

        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_coerce_date_series() {
        // 17897 days after the epoch is 2019-01-01
        let series = Series::new("d".into(), &[17897i32])
            .cast(&DataType::Date)
            .unwrap();
        let result = coerce_to_datetime(&series).unwrap();

        assert_eq!(result.dtype(), &coerced_dtype());
        assert_eq!(
            millis_at(&result, 0),
            Some(ymd_hms(2019, 1, 1, 0, 0, 0).and_utc().timestamp_millis())
        );
    }

    #[test]
    fn test_coerce_all_null_series() {
        let series = Series::new_null("last_review".into(), 3);
        let result = coerce_to_datetime(&series).unwrap();

        assert_eq!(result.dtype(), &coerced_dtype());
        assert_eq!(result.null_count(), 3);
    }

    #[test]
    fn test_coerce_numeric_series_becomes_null() {
        let series = Series::new("last_review".into(), &[1i64, 2, 3]);
        let result = coerce_to_datetime(&series).unwrap();

        assert_eq!(result.dtype(), &coerced_dtype());
        assert_eq!(result.null_count(), 3);
    }
}
