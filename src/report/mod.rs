//! Aggregation and chart reporting.

pub mod aggregate;
pub mod chart;

pub use aggregate::{
    aggregate_percentile, calc_aae, passthrough, percentile, AggregatedPoint, AggregatedSeries,
};
pub use chart::{render_comparison, ChartError};
