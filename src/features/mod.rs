//! Calendar feature derivation.
//!
//! Turns a raw entity series into the model input: rows sorted ascending,
//! optionally resampled to a fixed period (mean per bucket), with five
//! calendar columns appended. The calendar columns are pure functions of
//! the row timestamp and are recomputed whenever the series is resampled.

use chrono::{Datelike, Duration, Timelike};
use thiserror::Error;
use tracing::debug;

use crate::data::{SeriesError, TimeSeries};

/// Calendar feature columns, in the order handed to the model.
pub const CALENDAR_FEATURES: &[&str] = &["month", "day", "weekday", "hour", "minute"];

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Invalid resample period: {0}")]
    InvalidPeriod(String),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}

/// Transform a raw series into a feature-augmented one.
///
/// Sorts ascending, resamples by mean if a period is given (buckets with
/// no source rows are dropped), then appends the calendar columns.
/// Returns the transformed series and the ordered feature column names.
pub fn transform(
    series: &TimeSeries,
    period: Option<&str>,
) -> Result<(TimeSeries, Vec<String>), FeatureError> {
    let mut series = series.clone();
    series.sort_by_time();

    if let Some(period) = period {
        let every = parse_period(period)?;
        series = series.resample_mean(every);
        debug!(period, rows = series.len(), "resampled series");
    }

    append_calendar_features(&mut series)?;

    let features = CALENDAR_FEATURES.iter().map(|s| s.to_string()).collect();
    Ok((series, features))
}

/// Append the calendar feature columns derived from each row's timestamp.
///
/// month 1-12, day 1-31, weekday 0-6 (Monday = 0), hour 0-23, minute 0-59.
pub fn append_calendar_features(series: &mut TimeSeries) -> Result<(), SeriesError> {
    let timestamps = series.timestamps().to_vec();

    let months: Vec<f64> = timestamps.iter().map(|t| t.month() as f64).collect();
    let days: Vec<f64> = timestamps.iter().map(|t| t.day() as f64).collect();
    let weekdays: Vec<f64> = timestamps
        .iter()
        .map(|t| t.weekday().num_days_from_monday() as f64)
        .collect();
    let hours: Vec<f64> = timestamps.iter().map(|t| t.hour() as f64).collect();
    let minutes: Vec<f64> = timestamps.iter().map(|t| t.minute() as f64).collect();

    series.push_column("month", months)?;
    series.push_column("day", days)?;
    series.push_column("weekday", weekdays)?;
    series.push_column("hour", hours)?;
    series.push_column("minute", minutes)?;
    Ok(())
}

/// Parse a resample period string, e.g. "15min", "1H", "30s", "1D".
///
/// A missing count means 1 ("H" is one hour). Units are seconds, minutes,
/// hours and days, matching the period aliases the input files use.
pub fn parse_period(s: &str) -> Result<Duration, FeatureError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(FeatureError::InvalidPeriod(s.to_string()));
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (count, unit) = s.split_at(split);
    let count: i64 = if count.is_empty() {
        1
    } else {
        count
            .parse()
            .map_err(|_| FeatureError::InvalidPeriod(s.to_string()))?
    };
    if count <= 0 {
        return Err(FeatureError::InvalidPeriod(s.to_string()));
    }

    let duration = match unit.to_ascii_lowercase().as_str() {
        "s" | "sec" => Duration::seconds(count),
        "m" | "min" => Duration::minutes(count),
        "h" | "hr" => Duration::hours(count),
        "d" | "day" => Duration::days(count),
        _ => return Err(FeatureError::InvalidPeriod(s.to_string())),
    };
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SeriesColumn;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period("15min").unwrap(), Duration::minutes(15));
        assert_eq!(parse_period("1H").unwrap(), Duration::hours(1));
        assert_eq!(parse_period("H").unwrap(), Duration::hours(1));
        assert_eq!(parse_period("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_period("1D").unwrap(), Duration::days(1));
        assert!(parse_period("").is_err());
        assert!(parse_period("1fortnight").is_err());
        assert!(parse_period("0min").is_err());
    }

    #[test]
    fn test_calendar_features_exact() {
        // 2020-03-01 was a Sunday.
        let mut series = TimeSeries::from_parts(
            vec![ts(1, 13, 45)],
            vec![SeriesColumn::new("cpu_usage", vec![1.0])],
        )
        .unwrap();
        append_calendar_features(&mut series).unwrap();

        assert_eq!(series.column("month").unwrap(), &[3.0]);
        assert_eq!(series.column("day").unwrap(), &[1.0]);
        assert_eq!(series.column("weekday").unwrap(), &[6.0]);
        assert_eq!(series.column("hour").unwrap(), &[13.0]);
        assert_eq!(series.column("minute").unwrap(), &[45.0]);
    }

    #[test]
    fn test_transform_resamples_and_recomputes_features() {
        // Rows every 15 minutes across two hours; hourly resample must
        // yield one row per covered hour with that hour's calendar values.
        let index: Vec<NaiveDateTime> = (0..8).map(|i| ts(1, i / 4, (i % 4) * 15)).collect();
        let values: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let series =
            TimeSeries::from_parts(index, vec![SeriesColumn::new("cpu_usage", values)]).unwrap();

        let (transformed, features) = transform(&series, Some("1H")).unwrap();

        assert_eq!(features, CALENDAR_FEATURES);
        assert_eq!(transformed.len(), 2);
        assert_eq!(transformed.timestamps(), &[ts(1, 0, 0), ts(1, 1, 0)]);
        assert_eq!(transformed.column("cpu_usage").unwrap(), &[1.5, 5.5]);
        assert_eq!(transformed.column("hour").unwrap(), &[0.0, 1.0]);
        assert_eq!(transformed.column("minute").unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn test_transform_without_period_sorts_only() {
        let series = TimeSeries::from_parts(
            vec![ts(2, 0, 0), ts(1, 0, 0)],
            vec![SeriesColumn::new("cpu_usage", vec![2.0, 1.0])],
        )
        .unwrap();

        let (transformed, _) = transform(&series, None).unwrap();
        assert_eq!(transformed.timestamps(), &[ts(1, 0, 0), ts(2, 0, 0)]);
        assert_eq!(transformed.column("cpu_usage").unwrap(), &[1.0, 2.0]);
    }
}
