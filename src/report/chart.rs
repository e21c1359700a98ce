//! Comparison chart rendering.
//!
//! Draws the aggregated predicted-vs-actual series to a PNG artifact:
//! actual in blue, predicted in red, date-formatted x axis.

use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use plotters::coord::types::RangedDateTime;
use plotters::prelude::*;
use thiserror::Error;
use tracing::info;

use super::aggregate::AggregatedSeries;

const CHART_SIZE: (u32, u32) = (1100, 800);

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Nothing to chart: empty series")]
    EmptySeries,

    #[error("Chart rendering failed: {0}")]
    Render(String),
}

fn render_err(e: impl std::fmt::Display) -> ChartError {
    ChartError::Render(e.to_string())
}

/// Render the comparison chart to `path`.
pub fn render_comparison(
    title: &str,
    series: &AggregatedSeries,
    path: &Path,
) -> Result<(), ChartError> {
    if series.is_empty() {
        return Err(ChartError::EmptySeries);
    }

    let (x_min, x_max) = time_bounds(series);
    let (y_min, y_max) = value_bounds(series);

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(RangedDateTime::from(x_min..x_max), y_min..y_max)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_label_formatter(&|dt: &NaiveDateTime| dt.format("%Y-%b-%d").to_string())
        .x_labels(10)
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(
            series.points.iter().map(|p| (p.timestamp, p.actual)),
            &BLUE,
        ))
        .map_err(render_err)?
        .label("Actual")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(LineSeries::new(
            series.points.iter().map(|p| (p.timestamp, p.predicted)),
            &RED,
        ))
        .map_err(render_err)?
        .label("Predicted")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    info!(path = %path.display(), points = series.len(), "wrote chart");
    Ok(())
}

/// X-axis bounds, padded when the series has a single point.
fn time_bounds(series: &AggregatedSeries) -> (NaiveDateTime, NaiveDateTime) {
    let first = series.points.first().map(|p| p.timestamp).unwrap_or_default();
    let last = series.points.last().map(|p| p.timestamp).unwrap_or_default();
    if first == last {
        (first, last + Duration::hours(1))
    } else {
        (first, last)
    }
}

/// Y-axis bounds over both lines, padded by 5%.
fn value_bounds(series: &AggregatedSeries) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for p in &series.points {
        for v in [p.predicted, p.actual] {
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
            }
        }
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((max - min) * 0.05).max(0.5);
    (min - pad, max + pad)
}
