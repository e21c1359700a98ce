//! Random-forest model adapter.
//!
//! Wraps smartcore's `RandomForestRegressor`. A fresh ensemble is fit for
//! every window; there are no incremental updates.

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use tracing::debug;

use crate::data::TimeSeries;

use super::{ModelAdapter, ModelError};

/// Random-forest hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestParams {
    /// Number of trees in the ensemble.
    pub n_trees: usize,
    /// Maximum tree depth (unbounded when None).
    pub max_depth: Option<u16>,
    /// RNG seed for reproducible fits.
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 20,
            max_depth: None,
            seed: 42,
        }
    }
}

/// Model adapter backed by a smartcore random forest.
pub struct RandomForestAdapter {
    params: RandomForestParams,
}

impl RandomForestAdapter {
    /// Create an adapter with default hyperparameters.
    pub fn new() -> Self {
        Self::with_params(RandomForestParams::default())
    }

    /// Create an adapter with custom hyperparameters.
    pub fn with_params(params: RandomForestParams) -> Self {
        Self { params }
    }

    /// The configured hyperparameters.
    pub fn params(&self) -> &RandomForestParams {
        &self.params
    }
}

impl Default for RandomForestAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelAdapter for RandomForestAdapter {
    fn predict(
        &self,
        train: &TimeSeries,
        test: &TimeSeries,
        target_col: &str,
        feature_cols: &[String],
    ) -> Result<Vec<f64>, ModelError> {
        if train.is_empty() {
            return Err(ModelError::InvalidData("empty training slice".to_string()));
        }
        if test.is_empty() {
            return Err(ModelError::InvalidData("empty test slice".to_string()));
        }

        let x_train = feature_matrix(train, feature_cols)?;
        let x_test = feature_matrix(test, feature_cols)?;
        let y_train: Vec<f64> = train
            .column(target_col)
            .ok_or_else(|| ModelError::MissingColumn(target_col.to_string()))?
            .to_vec();

        debug!(
            train_rows = train.len(),
            test_rows = test.len(),
            n_trees = self.params.n_trees,
            "fitting random forest"
        );

        let x_train = DenseMatrix::from_2d_vec(&x_train)
            .map_err(|e| ModelError::InvalidData(format!("train matrix: {e:?}")))?;
        let x_test = DenseMatrix::from_2d_vec(&x_test)
            .map_err(|e| ModelError::InvalidData(format!("test matrix: {e:?}")))?;

        let mut parameters = RandomForestRegressorParameters::default()
            .with_n_trees(self.params.n_trees)
            .with_seed(self.params.seed);
        if let Some(depth) = self.params.max_depth {
            parameters = parameters.with_max_depth(depth);
        }

        let model = RandomForestRegressor::fit(&x_train, &y_train, parameters)
            .map_err(|e| ModelError::TrainingFailed(format!("{e:?}")))?;

        let predictions = model
            .predict(&x_test)
            .map_err(|e| ModelError::PredictionFailed(format!("{e:?}")))?;

        if predictions.len() != test.len() {
            return Err(ModelError::PredictionFailed(format!(
                "{} predictions for {} test rows",
                predictions.len(),
                test.len()
            )));
        }

        Ok(predictions)
    }
}

/// Build a row-major feature matrix from the named columns.
fn feature_matrix(series: &TimeSeries, feature_cols: &[String]) -> Result<Vec<Vec<f64>>, ModelError> {
    let mut columns = Vec::with_capacity(feature_cols.len());
    for name in feature_cols {
        let values = series
            .column(name)
            .ok_or_else(|| ModelError::MissingColumn(name.clone()))?;
        columns.push(values);
    }

    let mut rows = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        rows.push(columns.iter().map(|c| c[i]).collect());
    }
    Ok(rows)
}
