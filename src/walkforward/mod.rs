//! Walk-forward validation.
//!
//! Trains on a trailing window and predicts the immediately following
//! window, sliding forward by the predict duration, to build a continuous
//! out-of-sample prediction series.

pub mod evaluator;
pub mod window;

pub use evaluator::{
    EvaluatorConfig, EvaluatorError, PredictionRecord, SlidingWindowEvaluator,
    DEFAULT_MIN_PREDICT_ROWS, DEFAULT_MIN_TRAIN_ROWS,
};
pub use window::{max_windows, Window};
