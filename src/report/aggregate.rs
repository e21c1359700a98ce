//! Prediction aggregation and the AAE error metric.
//!
//! Resamples the accumulated out-of-sample predictions to a coarser
//! reporting period (daily by default) with an independent percentile
//! reduction of predicted and actual values, and computes the symmetric
//! relative absolute error used in chart captions.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::data::series::bucket_start;
use crate::walkforward::PredictionRecord;

/// One reporting-period bucket of the aggregated comparison series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    pub timestamp: NaiveDateTime,
    pub predicted: f64,
    pub actual: f64,
}

/// Predicted-vs-actual series at reporting granularity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedSeries {
    pub points: Vec<AggregatedPoint>,
}

impl AggregatedSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Predicted values in timestamp order.
    pub fn predicted_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted).collect()
    }

    /// Actual values in timestamp order.
    pub fn actual_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.actual).collect()
    }

    /// AAE over this series.
    pub fn aae(&self) -> f64 {
        calc_aae(&self.predicted_values(), &self.actual_values())
    }
}

/// Pass predictions through unaggregated.
pub fn passthrough(records: &[PredictionRecord]) -> AggregatedSeries {
    AggregatedSeries {
        points: records
            .iter()
            .map(|r| AggregatedPoint {
                timestamp: r.timestamp,
                predicted: r.predicted,
                actual: r.actual,
            })
            .collect(),
    }
}

/// Resample predictions to `every`-wide buckets, reducing each bucket to
/// the given percentile independently for predicted and actual values.
///
/// Buckets with no records are dropped. Records are bucketed in timestamp
/// order regardless of arrival order.
pub fn aggregate_percentile(
    records: &[PredictionRecord],
    every: Duration,
    pctile: f64,
) -> AggregatedSeries {
    let secs = every.num_seconds();
    if records.is_empty() || secs <= 0 {
        return passthrough(records);
    }

    let mut sorted: Vec<&PredictionRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let mut points = Vec::new();
    let mut row = 0;
    while row < sorted.len() {
        let bucket = bucket_start(sorted[row].timestamp, secs);
        let mut end = row;
        while end < sorted.len() && bucket_start(sorted[end].timestamp, secs) == bucket {
            end += 1;
        }

        let predicted: Vec<f64> = sorted[row..end].iter().map(|r| r.predicted).collect();
        let actual: Vec<f64> = sorted[row..end].iter().map(|r| r.actual).collect();
        points.push(AggregatedPoint {
            timestamp: bucket,
            predicted: percentile(&predicted, pctile),
            actual: percentile(&actual, pctile),
        });

        row = end;
    }

    AggregatedSeries { points }
}

/// Nth percentile with linear interpolation between closest ranks.
///
/// Matches the numpy default method. Returns NaN for an empty slice.
pub fn percentile(values: &[f64], pctile: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (pctile / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Average absolute error: mean of `|predicted - actual| / max(predicted, actual)`.
///
/// Symmetric and bounded in [0, 1] for same-sign non-negative inputs. A
/// point where `max(predicted, actual)` is zero contributes 0, which
/// defines the 0/0 case; non-finite points are skipped. Returns 0 for an
/// empty input. The slices must be the same length.
pub fn calc_aae(predicted: &[f64], actual: &[f64]) -> f64 {
    debug_assert_eq!(
        predicted.len(),
        actual.len(),
        "predicted/actual length mismatch"
    );
    let mut sum = 0.0;
    let mut count = 0usize;

    for (&p, &a) in predicted.iter().zip(actual.iter()) {
        if !p.is_finite() || !a.is_finite() {
            continue;
        }
        let denominator = p.max(a);
        if denominator != 0.0 {
            sum += (p - a).abs() / denominator;
        }
        count += 1;
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
