//! Per-entity batch driver.
//!
//! Runs the load / transform / evaluate / aggregate / chart pipeline for
//! one entity CSV, and loops it over a directory of entities. An entity
//! whose chart artifact already exists is skipped outright (idempotent
//! re-runs); a failing entity is logged and the batch moves on.

use std::path::{Path, PathBuf};

use chrono::Duration;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::data::{list_entity_files, DataLoader, LoaderError};
use crate::features::{self, FeatureError};
use crate::model::{ModelAdapter, RandomForestParams};
use crate::report::{aggregate_percentile, passthrough, render_comparison, ChartError};
use crate::walkforward::{
    EvaluatorConfig, EvaluatorError, SlidingWindowEvaluator, DEFAULT_MIN_PREDICT_ROWS,
    DEFAULT_MIN_TRAIN_ROWS,
};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    #[error("Invalid input path: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_target_col() -> String {
    "cpu_usage".to_string()
}

fn default_timestamp_col() -> String {
    "DATETIMEUTC".to_string()
}

fn default_train_days() -> i64 {
    31
}

fn default_predict_days() -> i64 {
    7
}

fn default_resample() -> Option<String> {
    Some("1H".to_string())
}

fn default_percentile() -> Option<f64> {
    Some(95.0)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_min_train_rows() -> usize {
    DEFAULT_MIN_TRAIN_ROWS
}

fn default_min_predict_rows() -> usize {
    DEFAULT_MIN_PREDICT_ROWS
}

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target metric column to forecast.
    #[serde(default = "default_target_col")]
    pub target_col: String,

    /// Timestamp column in the input files.
    #[serde(default = "default_timestamp_col")]
    pub timestamp_col: String,

    /// Training window size in days.
    #[serde(default = "default_train_days")]
    pub train_days: i64,

    /// Predict window size in days.
    #[serde(default = "default_predict_days")]
    pub predict_days: i64,

    /// Resampling period for input rows, e.g. "1H" or "15min".
    #[serde(default = "default_resample")]
    pub resample: Option<String>,

    /// Reporting percentile; predictions pass through unaggregated when
    /// unset.
    #[serde(default = "default_percentile")]
    pub percentile: Option<f64>,

    /// Base directory for chart artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Subscriber name prefixed to chart file names.
    #[serde(default)]
    pub subscriber: Option<String>,

    /// Minimum rows for a fittable training window.
    #[serde(default = "default_min_train_rows")]
    pub min_train_rows: usize,

    /// Minimum rows for a predict window.
    #[serde(default = "default_min_predict_rows")]
    pub min_predict_rows: usize,

    /// Model hyperparameters.
    #[serde(default)]
    pub model: RandomForestParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_col: default_target_col(),
            timestamp_col: default_timestamp_col(),
            train_days: default_train_days(),
            predict_days: default_predict_days(),
            resample: default_resample(),
            percentile: default_percentile(),
            output_dir: default_output_dir(),
            subscriber: None,
            min_train_rows: default_min_train_rows(),
            min_predict_rows: default_min_predict_rows(),
            model: RandomForestParams::default(),
        }
    }
}

impl RunConfig {
    fn evaluator_config(&self) -> EvaluatorConfig {
        let mut config = EvaluatorConfig::from_days(self.train_days, self.predict_days);
        config.min_train_rows = self.min_train_rows;
        config.min_predict_rows = self.min_predict_rows;
        config
    }
}

/// Chart artifact path for an entity: `base/model_name/entity.png`, or
/// `base/model_name/subscriber-entity.png` for subscriber runs.
pub fn chart_path(
    base_dir: &Path,
    model_name: &str,
    entity: &str,
    subscriber: Option<&str>,
) -> PathBuf {
    let dir = base_dir.join(model_name);
    match subscriber {
        Some(subscriber) => dir.join(format!("{subscriber}-{entity}.png")),
        None => dir.join(format!("{entity}.png")),
    }
}

/// What happened to one entity.
#[derive(Debug)]
pub enum EntityOutcome {
    /// Chart artifact already existed; nothing was run.
    Skipped { chart: PathBuf },
    /// Walk-forward produced no windows.
    InsufficientData,
    /// Chart written.
    Completed {
        aae: f64,
        chart: PathBuf,
        points: usize,
    },
}

/// Batch tallies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub completed: usize,
    pub skipped: usize,
    pub insufficient: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.insufficient + self.failed
    }

    pub fn summary(&self) -> String {
        format!(
            "Processed {} entities: {} completed, {} skipped, {} insufficient data, {} failed",
            self.total(),
            self.completed,
            self.skipped,
            self.insufficient,
            self.failed
        )
    }
}

/// Drives the per-entity pipeline with a shared model adapter.
pub struct BatchRunner<'a> {
    config: RunConfig,
    adapter: &'a dyn ModelAdapter,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: RunConfig, adapter: &'a dyn ModelAdapter) -> Self {
        Self { config, adapter }
    }

    /// The active configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Process a single entity file.
    ///
    /// Checks for an existing chart artifact before touching the input
    /// file or the model; an existing artifact short-circuits the whole
    /// pipeline.
    pub fn process_file(&self, path: &Path) -> Result<EntityOutcome, BatchError> {
        let entity = entity_name(path);
        let chart_file = chart_path(
            &self.config.output_dir,
            &self.config.target_col,
            &entity,
            self.config.subscriber.as_deref(),
        );

        if chart_file.exists() {
            info!(entity = %entity, chart = %chart_file.display(), "chart exists, skipping");
            return Ok(EntityOutcome::Skipped { chart: chart_file });
        }

        let loader = DataLoader::new(&self.config.timestamp_col);
        let series = loader.load_file(path, &self.config.target_col)?;
        info!(entity = %entity, rows = series.len(), "loaded entity");

        let (series, feature_cols) = features::transform(&series, self.config.resample.as_deref())?;

        let evaluator = SlidingWindowEvaluator::new(self.config.evaluator_config());
        let records = evaluator.evaluate(&series, &self.config.target_col, &feature_cols, self.adapter)?;
        if records.is_empty() {
            info!(entity = %entity, "not enough data for a single window");
            return Ok(EntityOutcome::InsufficientData);
        }

        let aggregated = match self.config.percentile {
            Some(pctile) => aggregate_percentile(&records, Duration::days(1), pctile),
            None => passthrough(&records),
        };
        let aae = aggregated.aae();

        let title = self.chart_title(&entity, aae);
        if let Some(parent) = chart_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        render_comparison(&title, &aggregated, &chart_file)?;

        info!(entity = %entity, aae, points = aggregated.len(), "entity completed");
        Ok(EntityOutcome::Completed {
            aae,
            chart: chart_file,
            points: aggregated.len(),
        })
    }

    /// Process a directory of entity files (or a single file).
    ///
    /// Per-entity failures are logged and counted; they never abort the
    /// batch.
    pub fn run(&self, input: &Path) -> Result<BatchSummary, BatchError> {
        let files = if input.is_dir() {
            list_entity_files(input)?
        } else if input.is_file() {
            vec![input.to_path_buf()]
        } else {
            return Err(BatchError::InvalidInput(input.display().to_string()));
        };

        if files.is_empty() {
            warn!(input = %input.display(), "no entity files found");
        }

        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(ProgressStyle::default_bar());

        let mut summary = BatchSummary::default();
        for file in &files {
            match self.process_file(file) {
                Ok(EntityOutcome::Completed { .. }) => summary.completed += 1,
                Ok(EntityOutcome::Skipped { .. }) => summary.skipped += 1,
                Ok(EntityOutcome::InsufficientData) => summary.insufficient += 1,
                Err(e) => {
                    warn!(entity = %file.display(), error = %e, "entity failed");
                    summary.failed += 1;
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!("{}", summary.summary());
        Ok(summary)
    }

    fn chart_title(&self, entity: &str, aae: f64) -> String {
        let granularity = match &self.config.percentile {
            Some(pctile) => format!("daily {pctile:.0}th pctile"),
            None => "raw".to_string(),
        };
        let unit = self.config.resample.as_deref().unwrap_or("native");
        format!(
            "{} {} {} (AAE={:.4}, unit={}, train={}d, test={}d)",
            self.config.target_col,
            granularity,
            entity,
            aae,
            unit,
            self.config.train_days,
            self.config.predict_days
        )
    }
}

/// Entity identifier derived from the input file name.
fn entity_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
