pub mod batch;
pub mod data;
pub mod features;
pub mod model;
pub mod report;
pub mod walkforward;

// Re-export commonly used types
pub use batch::{chart_path, BatchRunner, BatchSummary, EntityOutcome, RunConfig};
pub use data::{DataLoader, LoaderError, SeriesColumn, TimeSeries};
pub use features::{transform, FeatureError, CALENDAR_FEATURES};
pub use model::{ModelAdapter, ModelError, RandomForestAdapter, RandomForestParams};
pub use report::{calc_aae, AggregatedPoint, AggregatedSeries, ChartError};
pub use walkforward::{EvaluatorConfig, PredictionRecord, SlidingWindowEvaluator, Window};
