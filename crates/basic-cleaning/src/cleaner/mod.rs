//! Data cleaning for the listings table.
//!
//! Two fixed transformations, applied in order:
//! 1. Price cutoff: keep rows whose price lies in `[min_price, max_price]`
//! 2. Date coercion: turn the review date column into date-times
//!
//! Both work on whole columns and return a new `DataFrame`; the input table
//! is never modified.

mod converters;

pub use converters::coerced_dtype;

use crate::config::{DEFAULT_DATE_COLUMN, DEFAULT_PRICE_COLUMN};
use crate::error::{CleaningError, Result, ResultExt};
use crate::types::CleaningReport;
use converters::coerce_to_datetime;
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Data cleaner applying the price cutoff and the date coercion.
#[derive(Debug, Clone)]
pub struct DataCleaner {
    price_column: String,
    date_column: String,
}

impl Default for DataCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_COLUMN, DEFAULT_DATE_COLUMN)
    }
}

impl DataCleaner {
    pub fn new(price_column: impl Into<String>, date_column: impl Into<String>) -> Self {
        Self {
            price_column: price_column.into(),
            date_column: date_column.into(),
        }
    }

    /// Fail with [`CleaningError::MissingColumn`] unless both the price and
    /// the date column are present.
    pub fn check_schema(&self, df: &DataFrame) -> Result<()> {
        for column in [&self.price_column, &self.date_column] {
            if df.column(column).is_err() {
                return Err(CleaningError::MissingColumn(column.clone()));
            }
        }
        Ok(())
    }

    /// Run both transformations.
    ///
    /// Returns the cleaned table and a report of what changed.
    pub fn clean(
        &self,
        df: &DataFrame,
        min_price: f64,
        max_price: f64,
    ) -> Result<(DataFrame, CleaningReport)> {
        self.check_schema(df)?;

        let mut report = CleaningReport::default();
        let filtered = self.filter_price_range(df, min_price, max_price, &mut report)?;
        let coerced = self.coerce_dates(filtered, &mut report)?;

        Ok((coerced, report))
    }

    /// Keep the rows whose price lies in `[min_price, max_price]`.
    ///
    /// The price is compared as `f64`. Missing, NaN or non-numeric prices
    /// never match. The price column itself keeps its original type and the
    /// order of the kept rows is unchanged.
    pub fn filter_price_range(
        &self,
        df: &DataFrame,
        min_price: f64,
        max_price: f64,
        report: &mut CleaningReport,
    ) -> Result<DataFrame> {
        let column = df
            .column(&self.price_column)
            .map_err(|_| CleaningError::MissingColumn(self.price_column.clone()))?;

        info!(
            "Keeping rows with {} between {} and {}",
            self.price_column, min_price, max_price
        );

        let prices = column
            .as_materialized_series()
            .cast(&DataType::Float64)
            .context(format!("Reading '{}' as a number", self.price_column))?;
        let lower = prices.gt_eq(min_price)?;
        let upper = prices.lt_eq(max_price)?;
        let mask = &lower & &upper;

        let filtered = df.filter(&mask)?;

        report.rows_before = df.height();
        report.rows_after = filtered.height();
        report.rows_removed = report.rows_before - report.rows_after;

        if report.rows_removed > 0 {
            let pct = (report.rows_removed as f64 / report.rows_before as f64) * 100.0;
            debug!(
                "Removed {} rows outside the price range ({:.1}%)",
                report.rows_removed, pct
            );
        } else {
            debug!("All rows inside the price range");
        }

        Ok(filtered)
    }

    /// Convert the date column to date-times.
    ///
    /// Values that cannot be parsed become null and their rows are kept.
    /// Applying the conversion to an already converted table is a no-op.
    pub fn coerce_dates(&self, df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let mut df = df;

        info!("Converting {} to datetime", self.date_column);

        let series = df
            .column(&self.date_column)
            .map_err(|_| CleaningError::MissingColumn(self.date_column.clone()))?
            .as_materialized_series()
            .clone();
        let coerced = coerce_to_datetime(&series)
            .context(format!("Converting '{}' to datetime", self.date_column))?;

        report.dates_missing = series.null_count();
        report.dates_parsed = coerced.len() - coerced.null_count();
        report.dates_nulled = coerced.null_count().saturating_sub(report.dates_missing);

        if report.dates_nulled > 0 {
            warn!(
                "{} values in '{}' could not be parsed as dates and were set to null",
                report.dates_nulled, self.date_column
            );
        }

        df.replace(&self.date_column, coerced)?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn listings() -> DataFrame {
        df!(
            "id" => [1i64, 2, 3, 4, 5],
            "name" => ["loft", "studio", "villa", "room", "suite"],
            "price" => [50.0, 5.0, 500.0, 10.0, 400.0],
            "last_review" => [Some("2019-01-01"), Some("bad"), None, Some("2018-06-30"), None],
            "minimum_nights" => [1i64, 2, 3, 4, 5],
        )
        .unwrap()
    }

    fn ids(df: &DataFrame) -> Vec<i64> {
        df.column("id")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    fn midnight_millis(y: i32, m: u32, d: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn test_filter_keeps_inclusive_bounds_in_order() {
        let df = listings();
        let mut report = CleaningReport::default();
        let out = DataCleaner::default()
            .filter_price_range(&df, 10.0, 400.0, &mut report)
            .unwrap();

        assert_eq!(ids(&out), vec![1, 4, 5]);
        assert_eq!(report.rows_before, 5);
        assert_eq!(report.rows_after, 3);
        assert_eq!(report.rows_removed, 2);
    }

    #[test]
    fn test_filter_zero_width_range() {
        let df = df!("price" => [0i64, 1, 0], "last_review" => ["a", "b", "c"]).unwrap();
        let mut report = CleaningReport::default();
        let out = DataCleaner::default()
            .filter_price_range(&df, 0.0, 0.0, &mut report)
            .unwrap();

        assert_eq!(out.height(), 2);
        // Integer prices stay integers
        assert_eq!(out.column("price").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_filter_drops_missing_and_nan_prices() {
        let df = df!(
            "price" => [Some(20.0), None, Some(f64::NAN), Some(30.0)],
            "last_review" => ["a", "b", "c", "d"],
        )
        .unwrap();
        let mut report = CleaningReport::default();
        let out = DataCleaner::default()
            .filter_price_range(&df, 0.0, 100.0, &mut report)
            .unwrap();

        assert_eq!(out.height(), 2);
        assert_eq!(report.rows_removed, 2);
    }

    #[test]
    fn test_filter_text_prices() {
        let df = df!(
            "price" => ["15", "not a price", "25.5"],
            "last_review" => ["a", "b", "c"],
        )
        .unwrap();
        let mut report = CleaningReport::default();
        let out = DataCleaner::default()
            .filter_price_range(&df, 10.0, 30.0, &mut report)
            .unwrap();

        assert_eq!(out.height(), 2);
        assert_eq!(out.column("price").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_clean_scenario() {
        let df = df!(
            "price" => [50i64, 5, 500],
            "last_review" => [Some("2019-01-01"), Some("bad"), None],
        )
        .unwrap();

        let (out, report) = DataCleaner::default().clean(&df, 10.0, 400.0).unwrap();

        assert_eq!(out.height(), 1);
        assert_eq!(out.column("price").unwrap().i64().unwrap().get(0), Some(50));
        let dates = out
            .column("last_review")
            .unwrap()
            .as_materialized_series()
            .cast(&DataType::Int64)
            .unwrap();
        assert_eq!(dates.i64().unwrap().get(0), Some(midnight_millis(2019, 1, 1)));
        assert_eq!(report.dates_parsed, 1);
        assert_eq!(report.dates_nulled, 0);
    }

    #[test]
    fn test_coercion_keeps_rows_and_nulls() {
        let df = listings();
        let mut report = CleaningReport::default();
        let out = DataCleaner::default().coerce_dates(df.clone(), &mut report).unwrap();

        assert_eq!(out.height(), df.height());
        let dates = out.column("last_review").unwrap();
        assert_eq!(dates.dtype(), &coerced_dtype());
        assert_eq!(dates.null_count(), 3);
        assert_eq!(report.dates_missing, 2);
        assert_eq!(report.dates_nulled, 1);
        assert_eq!(report.dates_parsed, 2);
    }

    #[test]
    fn test_coercion_is_idempotent() {
        let cleaner = DataCleaner::default();
        let mut report = CleaningReport::default();
        let once = cleaner.coerce_dates(listings(), &mut report).unwrap();
        let twice = cleaner.coerce_dates(once.clone(), &mut report).unwrap();

        assert!(once.equals_missing(&twice));
        assert_eq!(report.dates_nulled, 0);
    }

    #[test]
    fn test_other_columns_preserved() {
        let df = listings();
        let (out, _) = DataCleaner::default().clean(&df, 10.0, 400.0).unwrap();

        let names: Vec<&str> = out.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "price", "last_review", "minimum_nights"]);

        let expected_names = Series::new("name".into(), &["loft", "room", "suite"]);
        assert!(out
            .column("name")
            .unwrap()
            .as_materialized_series()
            .equals(&expected_names));
        let nights: Vec<i64> = out
            .column("minimum_nights")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(nights, vec![1, 4, 5]);
    }

    #[test]
    fn test_clean_leaves_input_untouched() {
        let df = listings();
        let before = df.clone();
        let _ = DataCleaner::default().clean(&df, 10.0, 400.0).unwrap();

        assert!(df.equals_missing(&before));
        assert_eq!(df.column("last_review").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_missing_price_column() {
        let df = df!("cost" => [1.0], "last_review" => ["2019-01-01"]).unwrap();
        let err = DataCleaner::default().clean(&df, 0.0, 10.0).unwrap_err();

        assert!(matches!(err, CleaningError::MissingColumn(ref c) if c == "price"));
    }

    #[test]
    fn test_missing_date_column() {
        let df = df!("price" => [1.0]).unwrap();
        let err = DataCleaner::default().clean(&df, 0.0, 10.0).unwrap_err();

        assert!(matches!(err, CleaningError::MissingColumn(ref c) if c == "last_review"));
    }

    #[test]
    fn test_custom_column_names() {
        let df = df!("rate" => [20.0, 90.0], "reviewed" => ["2019-01-01", "2019-01-02"]).unwrap();
        let (out, report) = DataCleaner::new("rate", "reviewed")
            .clean(&df, 0.0, 50.0)
            .unwrap();

        assert_eq!(out.height(), 1);
        assert_eq!(report.dates_parsed, 1);
    }
}
