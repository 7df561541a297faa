//! Result types shared by the cleaner, the pipeline and run tracking.

use crate::store::ArtifactVersion;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What the two transformations did to the table.
///
/// # Example
///
/// ```rust,ignore
/// let (clean, report) = DataCleaner::default().clean(&df, 10.0, 350.0)?;
/// println!("Kept {} of {} rows", report.rows_after, report.rows_before);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Rows in the loaded table.
    pub rows_before: usize,
    /// Rows inside the price range.
    pub rows_after: usize,
    /// Rows outside the price range (or without a usable price).
    pub rows_removed: usize,

    /// Date values that parsed to a date-time.
    pub dates_parsed: usize,
    /// Date values that were already missing before coercion.
    pub dates_missing: usize,
    /// Date values that were present but could not be parsed, now missing.
    pub dates_nulled: usize,
}

/// Summary of a completed cleaning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningSummary {
    /// Reference the input was fetched from.
    pub input_artifact: String,
    /// Local file the input reference resolved to.
    pub input_path: PathBuf,
    /// Local file the cleaned table was written to.
    pub output_file: PathBuf,
    /// Size of the written file in bytes.
    pub output_bytes: u64,
    /// The version assigned by the store.
    pub published: ArtifactVersion,
    /// Row and value counts from the transformations.
    pub report: CleaningReport,
    /// Total execution time in milliseconds.
    pub duration_ms: u64,
}
