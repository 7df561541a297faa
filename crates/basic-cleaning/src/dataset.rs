//! Reading and writing the comma-separated tables.

use crate::error::{CleaningError, Result, ResultExt};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info, warn};

/// Text layout of date-time values in written tables.
///
/// `%.f` prints the fraction only when it is non-zero, so whole seconds stay
/// `2019-01-01T00:00:00` while `13:45:10.250` keeps its milliseconds.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Load a CSV file with a header row.
///
/// The whole file is scanned for schema inference so a column that only
/// turns out to be fractional (or textual) late in the file is typed
/// correctly. Empty fields are read as missing values.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    info!("Reading {} into a dataframe", path.display());

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .context(format!("Opening {}", path.display()))?
        .finish()
        .context(format!("Parsing {}", path.display()))?;

    debug!("Loaded table with shape {:?}", df.shape());
    Ok(df)
}

/// Write a table as CSV: header row, no index column, date-times as
/// [`DATETIME_FORMAT`]. Returns the size of the written file.
///
/// A partially written file is removed when the write fails.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context(format!("Creating {}", parent.display()))?;
    }

    let mut file = File::create(path).context(format!("Creating {}", path.display()))?;

    let written = CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .with_datetime_format(Some(DATETIME_FORMAT.to_string()))
        .finish(df);

    if let Err(e) = written {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path) {
            warn!("Failed to remove partial file {}: {}", path.display(), cleanup);
        }
        return Err(CleaningError::Polars(e).with_context(format!("Writing {}", path.display())));
    }

    let size = fs::metadata(path)?.len();
    info!("Dataset saved: {} ({} rows, {} bytes)", path.display(), df.height(), size);
    Ok(size)
}
