//! CSV ingestion for per-entity usage data.
//!
//! Loads a raw entity CSV (one file per VM or subscriber) into a
//! [`TimeSeries`]. Input files carry a timestamp column (ISO string or
//! epoch), the target metric column and arbitrary other columns; numeric
//! columns are kept as feature candidates, non-numeric columns are dropped.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

use super::series::{SeriesColumn, SeriesError, TimeSeries};

/// Timestamp string formats accepted in input files.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CSV loader for entity usage files.
pub struct DataLoader {
    timestamp_col: String,
}

impl DataLoader {
    /// Create a loader that reads timestamps from the given column.
    pub fn new(timestamp_col: &str) -> Self {
        Self {
            timestamp_col: timestamp_col.to_string(),
        }
    }

    /// The configured timestamp column name.
    pub fn timestamp_col(&self) -> &str {
        &self.timestamp_col
    }

    /// Load a raw CSV file as a DataFrame.
    pub fn load_dataframe(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()?
            .collect()?;
        debug!(rows = df.height(), path = %path.display(), "loaded csv");
        Ok(df)
    }

    /// Load an entity CSV into a time series.
    ///
    /// Fails if the timestamp column is missing or unparsable, or the
    /// target column is missing or non-numeric.
    pub fn load_file(&self, path: &Path, target_col: &str) -> Result<TimeSeries, LoaderError> {
        let df = self.load_dataframe(path)?;
        self.series_from_dataframe(&df, target_col)
    }

    /// Convert a DataFrame into a time series.
    ///
    /// The timestamp column becomes the index; every other column that
    /// casts to f64 becomes a value column.
    pub fn series_from_dataframe(
        &self,
        df: &DataFrame,
        target_col: &str,
    ) -> Result<TimeSeries, LoaderError> {
        let ts_col = df
            .column(&self.timestamp_col)
            .map_err(|_| LoaderError::MissingColumn(self.timestamp_col.clone()))?;
        let index = parse_timestamp_column(ts_col)?;

        let mut columns = Vec::new();
        for column in df.get_columns() {
            if column.name().as_str() == self.timestamp_col {
                continue;
            }
            if !is_numeric_dtype(column.dtype()) {
                // Non-numeric column (e.g. a subscriber name), dropped.
                continue;
            }
            let values: Vec<f64> = column
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            columns.push(SeriesColumn::new(column.name().to_string(), values));
        }

        let series = TimeSeries::from_parts(index, columns)?;
        if series.column(target_col).is_none() {
            return Err(LoaderError::MissingColumn(target_col.to_string()));
        }
        Ok(series)
    }
}

/// List the entity CSV files in a directory, sorted by name.
pub fn list_entity_files(dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    if !dir.exists() {
        return Err(LoaderError::FileNotFound(dir.display().to_string()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse a polars column into timestamps.
///
/// Handles string columns (ISO-style formats), native datetime columns
/// and integer/float epoch columns (seconds or milliseconds).
pub fn parse_timestamp_column(column: &Column) -> Result<Vec<NaiveDateTime>, LoaderError> {
    if let Ok(strings) = column.str() {
        return strings
            .into_iter()
            .map(|s| match s {
                Some(s) => parse_timestamp(s),
                None => Err(LoaderError::InvalidTimestamp("null".to_string())),
            })
            .collect();
    }

    if let Ok(datetimes) = column.datetime() {
        let unit = datetimes.time_unit();
        return datetimes
            .into_iter()
            .map(|v| match v {
                Some(v) => {
                    let millis = match unit {
                        TimeUnit::Milliseconds => v,
                        TimeUnit::Microseconds => v / 1_000,
                        TimeUnit::Nanoseconds => v / 1_000_000,
                    };
                    epoch_millis_to_datetime(millis)
                }
                None => Err(LoaderError::InvalidTimestamp("null".to_string())),
            })
            .collect();
    }

    if let Ok(dates) = column.date() {
        return dates
            .into_iter()
            .map(|v| match v {
                Some(days) => DateTime::from_timestamp(i64::from(days) * 86_400, 0)
                    .map(|dt| dt.naive_utc())
                    .ok_or_else(|| LoaderError::InvalidTimestamp(days.to_string())),
                None => Err(LoaderError::InvalidTimestamp("null".to_string())),
            })
            .collect();
    }

    if let Ok(casted) = column.cast(&DataType::Int64) {
        return casted
            .i64()?
            .into_iter()
            .map(|v| match v {
                Some(v) => epoch_to_datetime(v),
                None => Err(LoaderError::InvalidTimestamp("null".to_string())),
            })
            .collect();
    }

    Err(LoaderError::InvalidTimestamp(format!(
        "unsupported dtype {:?} for timestamp column",
        column.dtype()
    )))
}

/// Parse a single timestamp string.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, LoaderError> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    if let Ok(epoch) = s.parse::<i64>() {
        return epoch_to_datetime(epoch);
    }
    Err(LoaderError::InvalidTimestamp(s.to_string()))
}

/// Convert an epoch value to a timestamp.
///
/// Large magnitudes are treated as milliseconds, which covers
/// epoch-millisecond exports like DATETIMEUTC.
fn epoch_to_datetime(epoch: i64) -> Result<NaiveDateTime, LoaderError> {
    if epoch.abs() >= 20_000_000_000 {
        epoch_millis_to_datetime(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| LoaderError::InvalidTimestamp(epoch.to_string()))
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn epoch_millis_to_datetime(millis: i64) -> Result<NaiveDateTime, LoaderError> {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| LoaderError::InvalidTimestamp(millis.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_iso() {
        let dt = parse_timestamp("2020-03-01 12:30:00").unwrap();
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2020, 3, 1)
                .unwrap()
                .and_hms_opt(12, 30, 0)
                .unwrap()
        );

        let dt = parse_timestamp("2020-03-01T12:30:00.500").unwrap();
        assert_eq!(dt.and_utc().timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_parse_timestamp_date_only() {
        let dt = parse_timestamp("2020-03-01").unwrap();
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2020, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_timestamp_epoch_seconds_and_millis() {
        let secs = parse_timestamp("1583064000").unwrap();
        let millis = parse_timestamp("1583064000000").unwrap();
        assert_eq!(secs, millis);
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        assert!(parse_timestamp("not-a-date").is_err());
    }

    #[test]
    fn test_series_from_dataframe() {
        let df = df!(
            "DATETIMEUTC" => ["2020-03-01 00:15:00", "2020-03-01 00:00:00"],
            "cpu_usage" => [20.0, 10.0],
            "SUBSCRIBER_NAME" => ["a", "b"],
        )
        .unwrap();

        let loader = DataLoader::new("DATETIMEUTC");
        let series = loader.series_from_dataframe(&df, "cpu_usage").unwrap();

        // Loader preserves file order; sorting happens in the transform.
        assert_eq!(series.len(), 2);
        assert_eq!(series.column("cpu_usage").unwrap(), &[20.0, 10.0]);
        // Non-numeric column dropped.
        assert!(series.column("SUBSCRIBER_NAME").is_none());
    }

    #[test]
    fn test_series_from_dataframe_missing_target() {
        let df = df!(
            "DATETIMEUTC" => ["2020-03-01 00:00:00"],
            "cpu_usage" => [10.0],
        )
        .unwrap();

        let loader = DataLoader::new("DATETIMEUTC");
        let err = loader.series_from_dataframe(&df, "mem_usage").unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(_)));
    }

    #[test]
    fn test_series_from_dataframe_missing_timestamp() {
        let df = df!("cpu_usage" => [10.0]).unwrap();
        let loader = DataLoader::new("DATETIMEUTC");
        let err = loader.series_from_dataframe(&df, "cpu_usage").unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(_)));
    }
}
