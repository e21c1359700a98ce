//! In-memory time-series table.
//!
//! A `TimeSeries` is a timestamp index plus named f64 value columns, the
//! working representation for everything downstream of CSV ingestion:
//! feature derivation, window slicing and resampling all operate on it.

use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeriesError {
    #[error("Column '{name}' has {actual} values, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// A single named value column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesColumn {
    pub name: String,
    pub values: Vec<f64>,
}

impl SeriesColumn {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Timestamp-indexed table of f64 columns.
///
/// The index is kept sorted ascending by [`TimeSeries::sort_by_time`];
/// range operations assume a sorted index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    index: Vec<NaiveDateTime>,
    columns: Vec<SeriesColumn>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from a timestamp index and value columns.
    pub fn from_parts(
        index: Vec<NaiveDateTime>,
        columns: Vec<SeriesColumn>,
    ) -> Result<Self, SeriesError> {
        for column in &columns {
            if column.values.len() != index.len() {
                return Err(SeriesError::ColumnLength {
                    name: column.name.clone(),
                    expected: index.len(),
                    actual: column.values.len(),
                });
            }
        }
        Ok(Self { index, columns })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The timestamp index.
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.index
    }

    /// First timestamp, if any rows exist.
    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.first().copied()
    }

    /// Last timestamp, if any rows exist.
    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.last().copied()
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column's values by name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Append a value column, replacing an existing column of the same name.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), SeriesError> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(SeriesError::ColumnLength {
                name,
                expected: self.index.len(),
                actual: values.len(),
            });
        }
        self.columns.retain(|c| c.name != name);
        self.columns.push(SeriesColumn::new(name, values));
        Ok(())
    }

    /// Sort rows ascending by timestamp (stable).
    pub fn sort_by_time(&mut self) {
        let mut order: Vec<usize> = (0..self.index.len()).collect();
        order.sort_by_key(|&i| self.index[i]);

        self.index = order.iter().map(|&i| self.index[i]).collect();
        for column in &mut self.columns {
            column.values = order.iter().map(|&i| column.values[i]).collect();
        }
    }

    /// Row index bounds for the half-open time range `[start, stop)`.
    ///
    /// Assumes a sorted index.
    pub fn range_bounds(&self, start: NaiveDateTime, stop: NaiveDateTime) -> (usize, usize) {
        let lo = self.index.partition_point(|&t| t < start);
        let hi = self.index.partition_point(|&t| t < stop);
        (lo, hi.max(lo))
    }

    /// Number of rows with timestamp in `[start, stop)`.
    pub fn rows_in_range(&self, start: NaiveDateTime, stop: NaiveDateTime) -> usize {
        let (lo, hi) = self.range_bounds(start, stop);
        hi - lo
    }

    /// Materialize the rows with timestamp in `[start, stop)` as a new series.
    pub fn slice_range(&self, start: NaiveDateTime, stop: NaiveDateTime) -> TimeSeries {
        let (lo, hi) = self.range_bounds(start, stop);
        TimeSeries {
            index: self.index[lo..hi].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|c| SeriesColumn::new(c.name.clone(), c.values[lo..hi].to_vec()))
                .collect(),
        }
    }

    /// Resample into fixed-width buckets, taking the mean of each column.
    ///
    /// Bucket boundaries are aligned to the Unix epoch. Buckets with no
    /// source rows are dropped, not back-filled. NaN values are ignored in
    /// the mean; a bucket whose values are all NaN stays NaN. Assumes a
    /// sorted index and a positive period.
    pub fn resample_mean(&self, every: Duration) -> TimeSeries {
        let secs = every.num_seconds();
        debug_assert!(secs > 0, "resample period must be positive");
        if self.is_empty() || secs <= 0 {
            return self.clone();
        }

        let mut out_index = Vec::new();
        let mut out_values: Vec<Vec<f64>> = vec![Vec::new(); self.columns.len()];

        let mut row = 0;
        while row < self.index.len() {
            let bucket = bucket_start(self.index[row], secs);
            let mut end = row;
            while end < self.index.len() && bucket_start(self.index[end], secs) == bucket {
                end += 1;
            }

            out_index.push(bucket);
            for (col_idx, column) in self.columns.iter().enumerate() {
                out_values[col_idx].push(mean_ignoring_nan(&column.values[row..end]));
            }

            row = end;
        }

        TimeSeries {
            index: out_index,
            columns: self
                .columns
                .iter()
                .zip(out_values)
                .map(|(c, values)| SeriesColumn::new(c.name.clone(), values))
                .collect(),
        }
    }
}

/// Truncate a timestamp to the start of its epoch-aligned bucket.
pub(crate) fn bucket_start(ts: NaiveDateTime, period_secs: i64) -> NaiveDateTime {
    let epoch = ts.and_utc().timestamp();
    let start = epoch.div_euclid(period_secs) * period_secs;
    DateTime::from_timestamp(start, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or(ts)
}

fn mean_ignoring_nan(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in values {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
