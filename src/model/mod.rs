//! Regression model adapter.
//!
//! The walk-forward evaluator delegates fitting and inference through
//! [`ModelAdapter`]; each call is an independent fresh fit on the training
//! slice, with no state carried between windows. Adapters are constructed
//! explicitly and passed in rather than initialized as process globals.

pub mod random_forest;

use thiserror::Error;

use crate::data::TimeSeries;

pub use random_forest::{RandomForestAdapter, RandomForestParams};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Training failed: {0}")]
    TrainingFailed(String),

    #[error("Prediction failed: {0}")]
    PredictionFailed(String),
}

/// Train-and-predict interface used by the evaluator.
pub trait ModelAdapter {
    /// Fit on the training rows and return point predictions aligned
    /// row-for-row with the test rows.
    fn predict(
        &self,
        train: &TimeSeries,
        test: &TimeSeries,
        target_col: &str,
        feature_cols: &[String],
    ) -> Result<Vec<f64>, ModelError>;
}
