//! Walk-forward window state.
//!
//! A window is a (train, predict) pair of half-open time intervals
//! `[start, stop)`; the predict range immediately follows the train range
//! with no gap, and the whole window advances by the predict duration.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single train/predict window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Training range start (inclusive).
    pub train_start: NaiveDateTime,
    /// Training range stop (exclusive) and predict range start.
    pub train_stop: NaiveDateTime,
    /// Predict range start (inclusive).
    pub predict_start: NaiveDateTime,
    /// Predict range stop (exclusive).
    pub predict_stop: NaiveDateTime,
}

impl Window {
    /// Build the window anchored at `train_start`.
    pub fn starting_at(
        train_start: NaiveDateTime,
        train_duration: Duration,
        predict_duration: Duration,
    ) -> Self {
        let train_stop = train_start + train_duration;
        Self {
            train_start,
            train_stop,
            predict_start: train_stop,
            predict_stop: train_stop + predict_duration,
        }
    }

    /// The next window, advanced by the predict duration.
    pub fn advanced(&self, train_duration: Duration, predict_duration: Duration) -> Self {
        Self::starting_at(
            self.train_start + predict_duration,
            train_duration,
            predict_duration,
        )
    }

    /// Training range length.
    pub fn train_duration(&self) -> Duration {
        self.train_stop - self.train_start
    }

    /// Predict range length.
    pub fn predict_duration(&self) -> Duration {
        self.predict_stop - self.predict_start
    }
}

/// Upper bound on the number of windows a span can produce.
///
/// Each iteration advances the cursor by `stride`, so the loop can run at
/// most ceil(span / stride) times over a finite span. Used as a hard guard
/// against a non-advancing loop.
pub fn max_windows(span: Duration, stride: Duration) -> usize {
    let stride_secs = stride.num_seconds();
    if stride_secs <= 0 {
        return 0;
    }
    let span_secs = span.num_seconds().max(0);
    (span_secs.div_euclid(stride_secs) + i64::from(span_secs % stride_secs != 0)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 3, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_predict_follows_train_with_no_gap() {
        let window = Window::starting_at(ts(1), Duration::days(10), Duration::days(5));
        assert_eq!(window.train_start, ts(1));
        assert_eq!(window.train_stop, ts(11));
        assert_eq!(window.predict_start, ts(11));
        assert_eq!(window.predict_stop, ts(16));
    }

    #[test]
    fn test_advanced_moves_by_predict_duration() {
        let window = Window::starting_at(ts(1), Duration::days(10), Duration::days(5));
        let next = window.advanced(Duration::days(10), Duration::days(5));
        assert_eq!(next.train_start, ts(6));
        assert_eq!(next.predict_stop, ts(21));
        assert_eq!(next.train_duration(), Duration::days(10));
    }

    #[test]
    fn test_max_windows_ceiling() {
        assert_eq!(max_windows(Duration::days(10), Duration::days(5)), 2);
        assert_eq!(max_windows(Duration::days(11), Duration::days(5)), 3);
        assert_eq!(max_windows(Duration::days(0), Duration::days(5)), 0);
        assert_eq!(max_windows(Duration::days(10), Duration::days(0)), 0);
    }
}
