//! Sliding-window walk-forward evaluation.
//!
//! Produces a continuous out-of-sample prediction series by repeatedly
//! training on a trailing window and predicting the immediately following
//! one, advancing by the predict duration each iteration. Termination on
//! insufficient remaining data is the normal end condition, not an error;
//! callers must check for an empty result before using it.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::data::TimeSeries;
use crate::model::{ModelAdapter, ModelError};

use super::window::{max_windows, Window};

/// Minimum training rows before a window is considered fittable.
pub const DEFAULT_MIN_TRAIN_ROWS: usize = 300;
/// Minimum prediction rows before a window is worth predicting.
pub const DEFAULT_MIN_PREDICT_ROWS: usize = 1;

#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid evaluator config: {0}")]
    InvalidConfig(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Walk-forward evaluation parameters.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Training window length.
    pub train_duration: Duration,
    /// Predict window length, also the advance stride.
    pub predict_duration: Duration,
    /// Terminate when a training slice has fewer rows than this.
    pub min_train_rows: usize,
    /// Terminate when a prediction slice has fewer rows than this.
    pub min_predict_rows: usize,
}

impl EvaluatorConfig {
    /// Config with the default row thresholds.
    pub fn new(train_duration: Duration, predict_duration: Duration) -> Self {
        Self {
            train_duration,
            predict_duration,
            min_train_rows: DEFAULT_MIN_TRAIN_ROWS,
            min_predict_rows: DEFAULT_MIN_PREDICT_ROWS,
        }
    }

    /// Config from window sizes in days.
    pub fn from_days(train_days: i64, predict_days: i64) -> Self {
        Self::new(Duration::days(train_days), Duration::days(predict_days))
    }

    fn validate(&self) -> Result<(), EvaluatorError> {
        if self.train_duration <= Duration::zero() {
            return Err(EvaluatorError::InvalidConfig(
                "train duration must be positive".to_string(),
            ));
        }
        if self.predict_duration <= Duration::zero() {
            return Err(EvaluatorError::InvalidConfig(
                "predict duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// One out-of-sample prediction, paired with the observed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub timestamp: NaiveDateTime,
    pub predicted: f64,
    pub actual: f64,
}

/// Drives the train/predict loop over successive windows.
pub struct SlidingWindowEvaluator {
    config: EvaluatorConfig,
}

impl SlidingWindowEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// The configured window parameters.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Run the walk-forward loop over a feature-augmented, sorted series.
    ///
    /// Returns the accumulated prediction records in window order, empty
    /// when the series never yields a fittable window. Adapter failures
    /// abort the run; there is no partial-window retry.
    pub fn evaluate(
        &self,
        series: &TimeSeries,
        target_col: &str,
        feature_cols: &[String],
        adapter: &dyn ModelAdapter,
    ) -> Result<Vec<PredictionRecord>, EvaluatorError> {
        self.config.validate()?;
        if series.column(target_col).is_none() {
            return Err(EvaluatorError::MissingColumn(target_col.to_string()));
        }

        let (Some(first), Some(last)) = (series.first_timestamp(), series.last_timestamp()) else {
            return Ok(Vec::new());
        };

        // The cursor advances by the predict duration every iteration, so
        // the window count over a finite span is bounded. The extra window
        // covers a predict range starting exactly at the last timestamp.
        let span = last - first + self.config.predict_duration;
        let window_bound = max_windows(span, self.config.predict_duration);

        let mut window = Window::starting_at(
            first,
            self.config.train_duration,
            self.config.predict_duration,
        );
        let mut records = Vec::new();

        for _ in 0..window_bound {
            let train_rows = series.rows_in_range(window.train_start, window.train_stop);
            if train_rows < self.config.min_train_rows {
                break;
            }

            let predict_rows = series.rows_in_range(window.predict_start, window.predict_stop);
            if predict_rows < self.config.min_predict_rows {
                break;
            }

            let train_slice = series.slice_range(window.train_start, window.train_stop);
            let test_slice = series.slice_range(window.predict_start, window.predict_stop);
            debug!(
                train_rows = train_slice.len(),
                predict_rows = test_slice.len(),
                train_start = %window.train_start,
                predict_start = %window.predict_start,
                "evaluating window"
            );

            let predictions = adapter.predict(&train_slice, &test_slice, target_col, feature_cols)?;
            let actuals = test_slice
                .column(target_col)
                .ok_or_else(|| EvaluatorError::MissingColumn(target_col.to_string()))?;

            for ((&timestamp, &predicted), &actual) in test_slice
                .timestamps()
                .iter()
                .zip(predictions.iter())
                .zip(actuals.iter())
            {
                records.push(PredictionRecord {
                    timestamp,
                    predicted,
                    actual,
                });
            }

            window = window.advanced(self.config.train_duration, self.config.predict_duration);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SeriesColumn, TimeSeries};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Adapter that predicts the training-slice mean and counts calls.
    struct MeanAdapter {
        calls: AtomicUsize,
    }

    impl MeanAdapter {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ModelAdapter for MeanAdapter {
        fn predict(
            &self,
            train: &TimeSeries,
            test: &TimeSeries,
            target_col: &str,
            _feature_cols: &[String],
        ) -> Result<Vec<f64>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let values = train
                .column(target_col)
                .ok_or_else(|| ModelError::MissingColumn(target_col.to_string()))?;
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            Ok(vec![mean; test.len()])
        }
    }

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// Series with rows every `step` starting at `base()`.
    fn spaced_series(rows: usize, step: Duration) -> TimeSeries {
        let index: Vec<NaiveDateTime> = (0..rows).map(|i| base() + step * i as i32).collect();
        let values: Vec<f64> = (0..rows).map(|i| i as f64).collect();
        TimeSeries::from_parts(index, vec![SeriesColumn::new("cpu_usage", values)]).unwrap()
    }

    fn hourly_config(train_hours: i64, predict_hours: i64, min_train: usize) -> EvaluatorConfig {
        let mut config =
            EvaluatorConfig::new(Duration::hours(train_hours), Duration::hours(predict_hours));
        config.min_train_rows = min_train;
        config
    }

    #[test]
    fn test_records_align_with_test_slices() {
        // 48 hourly rows, train 24h, predict 6h: windows predict rows
        // 24..30, 30..36, 36..42, 42..48, then training falls short.
        let series = spaced_series(48, Duration::hours(1));
        let evaluator = SlidingWindowEvaluator::new(hourly_config(24, 6, 24));
        let adapter = MeanAdapter::new();

        let records = evaluator
            .evaluate(&series, "cpu_usage", &[], &adapter)
            .unwrap();

        assert_eq!(records.len(), 24);
        assert_eq!(adapter.call_count(), 4);
        // Out-of-sample rows arrive in original order with actuals intact.
        assert_eq!(records[0].timestamp, base() + Duration::hours(24));
        assert_eq!(records[0].actual, 24.0);
        assert_eq!(records[23].actual, 47.0);
        // First window's prediction is the mean of rows 0..24.
        assert!((records[0].predicted - 11.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_series_yields_empty_result() {
        let series = spaced_series(0, Duration::hours(1));
        let evaluator = SlidingWindowEvaluator::new(hourly_config(24, 6, 24));
        let adapter = MeanAdapter::new();

        let records = evaluator
            .evaluate(&series, "cpu_usage", &[], &adapter)
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(adapter.call_count(), 0);
    }

    #[test]
    fn test_short_series_terminates_without_model_calls() {
        let series = spaced_series(10, Duration::hours(1));
        let evaluator = SlidingWindowEvaluator::new(hourly_config(24, 6, 24));
        let adapter = MeanAdapter::new();

        let records = evaluator
            .evaluate(&series, "cpu_usage", &[], &adapter)
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(adapter.call_count(), 0);
    }

    #[test]
    fn test_dense_training_span_with_empty_predict_span() {
        // 300 rows at 2-minute spacing fill the first 10 hours; 5 stray
        // rows sit past hour 20. Train 10h / predict 5h: the first window
        // trains on 300 rows but the predict range [10h, 15h) is empty,
        // so the loop terminates after zero model calls.
        let mut index: Vec<NaiveDateTime> =
            (0..300).map(|i| base() + Duration::minutes(2 * i)).collect();
        index.extend((0..5).map(|i| base() + Duration::hours(20) + Duration::minutes(i)));
        let values: Vec<f64> = (0..305).map(|i| i as f64).collect();
        let series =
            TimeSeries::from_parts(index, vec![SeriesColumn::new("cpu_usage", values)]).unwrap();

        let evaluator = SlidingWindowEvaluator::new(hourly_config(10, 5, 300));
        let adapter = MeanAdapter::new();

        let records = evaluator
            .evaluate(&series, "cpu_usage", &[], &adapter)
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(adapter.call_count(), 0);
    }

    #[test]
    fn test_single_window_when_trailing_rows_exist() {
        // 305 rows at 2-minute spacing span just over 10 hours. The first
        // window trains on the 300 rows of [0, 10h) and predicts the 5
        // rows in [10h, 15h); the advanced window's training slice is
        // short, ending the loop after exactly one model call.
        let series = spaced_series(305, Duration::minutes(2));
        let evaluator = SlidingWindowEvaluator::new(hourly_config(10, 5, 300));
        let adapter = MeanAdapter::new();

        let records = evaluator
            .evaluate(&series, "cpu_usage", &[], &adapter)
            .unwrap();

        assert_eq!(adapter.call_count(), 1);
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].actual, 300.0);
        assert_eq!(records[4].actual, 304.0);
    }

    #[test]
    fn test_iteration_bound_holds() {
        // Degenerate thresholds: every window qualifies. The call count
        // must stay within ceil(span / stride) + 1.
        let series = spaced_series(100, Duration::hours(1));
        let mut config = hourly_config(1, 1, 1);
        config.min_predict_rows = 1;
        let evaluator = SlidingWindowEvaluator::new(config);
        let adapter = MeanAdapter::new();

        evaluator
            .evaluate(&series, "cpu_usage", &[], &adapter)
            .unwrap();
        assert!(adapter.call_count() <= 100);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let series = spaced_series(10, Duration::hours(1));
        let evaluator =
            SlidingWindowEvaluator::new(EvaluatorConfig::new(Duration::zero(), Duration::hours(1)));
        let adapter = MeanAdapter::new();
        assert!(matches!(
            evaluator.evaluate(&series, "cpu_usage", &[], &adapter),
            Err(EvaluatorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_adapter_error_aborts_run() {
        struct FailingAdapter;
        impl ModelAdapter for FailingAdapter {
            fn predict(
                &self,
                _train: &TimeSeries,
                _test: &TimeSeries,
                _target_col: &str,
                _feature_cols: &[String],
            ) -> Result<Vec<f64>, ModelError> {
                Err(ModelError::TrainingFailed("boom".to_string()))
            }
        }

        let series = spaced_series(48, Duration::hours(1));
        let evaluator = SlidingWindowEvaluator::new(hourly_config(24, 6, 24));
        assert!(matches!(
            evaluator.evaluate(&series, "cpu_usage", &[], &FailingAdapter),
            Err(EvaluatorError::Model(_))
        ));
    }
}
